//! Custom test assertions for integration tests

use media_dl::{MediaDownloader, TaskId, TaskRecord, TaskStatus};
use std::time::Duration;

/// Poll until the task is terminal, recording every distinct status seen
///
/// Panics if the task is not terminal within `timeout`.
pub async fn poll_until_terminal(
    downloader: &MediaDownloader,
    id: &TaskId,
    timeout: Duration,
) -> (TaskRecord, Vec<TaskStatus>) {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut seen: Vec<TaskStatus> = Vec::new();
    loop {
        let record = downloader.get_status(id).await.unwrap();
        if seen.last() != Some(&record.status) {
            seen.push(record.status);
        }
        if record.status.is_terminal() {
            return (record, seen);
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} still {} after {timeout:?}",
            record.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Assert `seen` is a prefix-respecting walk of pending, processing, terminal
pub fn assert_legal_sequence(seen: &[TaskStatus]) {
    let order = |status: &TaskStatus| match status {
        TaskStatus::Pending => 0,
        TaskStatus::Processing => 1,
        TaskStatus::Completed | TaskStatus::Failed => 2,
    };
    for pair in seen.windows(2) {
        assert!(
            order(&pair[1]) > order(&pair[0]),
            "illegal status sequence {seen:?}"
        );
    }
    let terminal = seen.iter().filter(|s| s.is_terminal()).count();
    assert!(terminal <= 1, "two terminal states in {seen:?}");
}
