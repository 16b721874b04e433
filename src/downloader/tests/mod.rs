use super::*;
use crate::error::Error;
use crate::types::TaskStatus;
use super::test_helpers::*;

const URL: &str = "https://example.com/watch?id=abc";
