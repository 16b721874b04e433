//! Task handlers: enqueue, status and cancellation.

use super::{CreateDownloadRequest, CreateDownloadResponse, DownloadStatus};
use crate::api::AppState;
use crate::error::ApiError;
use crate::types::TaskId;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

/// POST /downloads - Enqueue a URL for acquisition
#[utoipa::path(
    post,
    path = "/downloads",
    tag = "downloads",
    request_body = CreateDownloadRequest,
    responses(
        (status = 202, description = "Task accepted", body = CreateDownloadResponse),
        (status = 400, description = "Missing or invalid URL", body = ApiError),
        (status = 503, description = "Shutting down", body = ApiError)
    )
)]
pub async fn create_download(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    let url = match payload.get("url").and_then(|v| v.as_str()) {
        Some(url) => url,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::validation("Missing required field: url")),
            )
                .into_response();
        }
    };

    match state.downloader.enqueue(url).await {
        Ok(task_id) => (
            StatusCode::ACCEPTED,
            Json(CreateDownloadResponse { task_id }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /downloads/:task_id - Get task status
#[utoipa::path(
    get,
    path = "/downloads/{task_id}",
    tag = "downloads",
    params(
        ("task_id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task status", body = DownloadStatus),
        (status = 404, description = "Unknown or expired task", body = ApiError)
    )
)]
pub async fn get_download(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let id = TaskId::from(task_id);
    match state.downloader.get_status(&id).await {
        Ok(record) => {
            let base_url = public_base_url(&state, &headers);
            Json(DownloadStatus::from_record(record, base_url.as_deref())).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// DELETE /downloads/:task_id - Cancel a pending or running task
#[utoipa::path(
    delete,
    path = "/downloads/{task_id}",
    tag = "downloads",
    params(
        ("task_id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 204, description = "Cancellation accepted"),
        (status = 404, description = "Unknown task", body = ApiError),
        (status = 409, description = "Task already finished", body = ApiError)
    )
)]
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    match state.downloader.cancel(&TaskId::from(task_id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Configured base URL, else `http://<Host>`
fn public_base_url(state: &AppState, headers: &HeaderMap) -> Option<String> {
    if let Some(base) = &state.config.api.base_url {
        return Some(base.clone());
    }
    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{host}"))
}
