use super::*;

#[tokio::test]
async fn test_create_download_returns_202_and_pending_status() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let id = post_download(&app, URL).await;

    let request = Request::builder()
        .uri(format!("/downloads/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["task_id"], id.as_str());
    assert_eq!(body["status"], "pending");
    assert_eq!(body["url"], URL);
    assert!(body.get("download_url").is_none());
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_create_download_missing_url() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let request = Request::builder()
        .method("POST")
        .uri("/downloads")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"link": "https://example.com"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_create_download_invalid_url() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let request = Request::builder()
        .method("POST")
        .uri("/downloads")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"url": "javascript:alert(1)"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_url");
    assert_eq!(downloader.queue_len().await, 0);
}

#[tokio::test]
async fn test_get_unknown_download_is_404() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    let request = Request::builder()
        .uri("/downloads/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_completed_download_links_to_file_via_host() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    downloader.start().await;
    let app = router_for(&downloader);

    let id = post_download(&app, URL).await;
    wait_for_status(&downloader, &id, TaskStatus::Completed).await;

    let request = Request::builder()
        .uri(format!("/downloads/{id}"))
        .header(header::HOST, "media.local:8080")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.oneshot(request).await.unwrap()).await;

    assert_eq!(body["status"], "completed");
    assert_eq!(body["title"], "Test Clip");
    assert_eq!(body["duration"], "1:05");
    assert_eq!(
        body["download_url"],
        format!("http://media.local:8080/videos/{id}")
    );
    assert!(body["file_path"].as_str().unwrap().ends_with(".mp4"));

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_completed_download_prefers_configured_base_url() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    downloader.start().await;

    let mut config = (*downloader.config).clone();
    config.api.base_url = Some("https://cdn.example.com/".to_string());
    let app = create_router(downloader.clone(), Arc::new(config));

    let id = post_download(&app, URL).await;
    wait_for_status(&downloader, &id, TaskStatus::Completed).await;

    let request = Request::builder()
        .uri(format!("/downloads/{id}"))
        .header(header::HOST, "ignored.local")
        .body(Body::empty())
        .unwrap();
    let body = json_body(app.oneshot(request).await.unwrap()).await;

    assert_eq!(
        body["download_url"],
        format!("https://cdn.example.com/videos/{id}")
    );

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_download() {
    let (downloader, _temp_dir) = create_test_downloader().await;
    let app = router_for(&downloader);

    // Not started: the task stays queued until cancelled
    let id = post_download(&app, URL).await;

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/downloads/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        downloader.get_status(&id).await.unwrap().status,
        TaskStatus::Failed
    );

    // A second cancel hits a terminal task
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/downloads/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
