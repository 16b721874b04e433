//! File streaming handler.

use crate::api::AppState;
use crate::downloader::ServedMedia;
use crate::error::ApiError;
use crate::types::TaskId;
use crate::utils;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use tokio_util::io::ReaderStream;

/// GET /videos/:task_id - Stream the file of a completed task
///
/// The reader registration taken by `serve` lives inside the body stream and
/// is released when the stream is dropped, whether the client read it all or
/// disconnected.
#[utoipa::path(
    get,
    path = "/videos/{task_id}",
    tag = "videos",
    params(
        ("task_id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Media file", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown task or file no longer available", body = ApiError),
        (status = 409, description = "Task has not completed", body = ApiError)
    )
)]
pub async fn serve_video(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    match state.downloader.serve(&TaskId::from(task_id)).await {
        Ok(served) => media_response(served),
        Err(e) => e.into_response(),
    }
}

fn media_response(served: ServedMedia) -> Response {
    let ServedMedia {
        file,
        content_type,
        size,
        path,
        lease,
        ..
    } = served;

    let disposition = utils::content_disposition(&path);

    let stream = ReaderStream::new(file).map(move |chunk| {
        let _ = &lease;
        chunk
    });

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
    response
}
