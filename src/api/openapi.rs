//! OpenAPI documentation and schema generation
//!
//! Uses utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// Served at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "Enqueue media URLs, poll task status and stream finished files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    paths(
        crate::api::routes::create_download,
        crate::api::routes::get_download,
        crate::api::routes::cancel_download,
        crate::api::routes::serve_video,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::TaskStatus,
        crate::types::TaskRecord,
        crate::types::MediaMetadata,
        crate::api::routes::CreateDownloadRequest,
        crate::api::routes::CreateDownloadResponse,
        crate::api::routes::DownloadStatus,
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Task lifecycle"),
        (name = "videos", description = "File delivery"),
        (name = "system", description = "Health and documentation")
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_every_route() {
        let spec = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = spec["paths"].as_object().unwrap();

        for path in [
            "/downloads",
            "/downloads/{task_id}",
            "/videos/{task_id}",
            "/health",
            "/openapi.json",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(paths["/downloads/{task_id}"].get("delete").is_some());
    }
}
