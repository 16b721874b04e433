//! End-to-end scenarios against a fake yt-dlp
//!
//! Each test runs a real downloader (SQLite store, worker pool, sweeper)
//! whose tool is a shell script in a temp dir.

#![cfg(unix)]

mod common;

use common::*;
use media_dl::{Error, Event, TaskStatus, keys};
use std::time::Duration;
use tokio::io::AsyncReadExt;

const URL: &str = "https://example.com/watch?id=abc";
const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn enqueue_completes_with_file_and_metadata() {
    let env = start_env(Some(FAKE_TOOL_SCRIPT), |_| {}).await;
    let downloader = &env.downloader;

    let id = downloader.enqueue(URL).await.unwrap();
    assert_eq!(
        downloader.get_status(&id).await.unwrap().status,
        TaskStatus::Pending
    );

    let (record, seen) = poll_until_terminal(downloader, &id, WAIT).await;
    assert_legal_sequence(&seen);
    assert_eq!(record.status, TaskStatus::Completed);

    let path = record.file_path.unwrap();
    assert!(path.exists());
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        format!("Fake Clip_{}.mp4", media_dl::content_hash::hash_url(URL))
    );
    assert_eq!(record.title.as_deref(), Some("Fake Clip"));
    assert_eq!(record.duration.as_deref(), Some("3:32"));
    assert_eq!(
        record.thumbnail_url.as_deref(),
        Some("https://img.example.com/medium.jpg")
    );

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn events_follow_the_state_machine() {
    let env = start_env(Some(FAKE_TOOL_SCRIPT), |_| {}).await;
    let downloader = &env.downloader;
    let mut events = downloader.subscribe();

    let id = downloader.enqueue(URL).await.unwrap();

    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let event = tokio::time::timeout_at(deadline, events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            Event::Queued { id: event_id, .. } if event_id == id => seen.push("queued"),
            Event::Processing { id: event_id } if event_id == id => seen.push("processing"),
            Event::Completed { id: event_id, .. } if event_id == id => {
                seen.push("completed");
                break;
            }
            Event::Failed { id: event_id, error, .. } if event_id == id => {
                panic!("task failed: {error}")
            }
            _ => {}
        }
    }
    assert_eq!(seen, ["queued", "processing", "completed"]);

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn repeated_requests_hit_the_cache() {
    let env = start_env(Some(FAKE_TOOL_SCRIPT), |_| {}).await;
    let downloader = &env.downloader;

    let first = downloader.enqueue(URL).await.unwrap();
    let (first, _) = poll_until_terminal(downloader, &first, WAIT).await;

    let mut paths = Vec::new();
    for _ in 0..3 {
        let id = downloader.enqueue(URL).await.unwrap();
        let (record, _) = poll_until_terminal(downloader, &id, WAIT).await;
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.title.as_deref(), Some("Fake Clip"));
        paths.push(record.file_path.unwrap());
    }

    assert!(paths.iter().all(|p| Some(p) == first.file_path.as_ref()));
    assert_eq!(download_calls(&env.tool_dir), 1);

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_requests_for_one_url_download_once() {
    let env = start_env(Some(FAKE_TOOL_SCRIPT), |_| {}).await;
    let downloader = &env.downloader;

    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(downloader.enqueue(URL).await.unwrap());
    }

    let mut paths = Vec::new();
    for id in &ids {
        let (record, _) = poll_until_terminal(downloader, id, WAIT).await;
        assert_eq!(record.status, TaskStatus::Completed, "{:?}", record.error);
        paths.push(record.file_path.unwrap());
    }
    paths.dedup();
    assert_eq!(paths.len(), 1);
    assert_eq!(download_calls(&env.tool_dir), 1);

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_tool_fails_with_install_instructions() {
    let env = start_env(None, |_| {}).await;
    let downloader = &env.downloader;

    let id = downloader.enqueue(URL).await.unwrap();
    let (record, seen) = poll_until_terminal(downloader, &id, WAIT).await;

    assert_legal_sequence(&seen);
    assert_eq!(record.status, TaskStatus::Failed);
    let error = record.error.unwrap();
    assert!(error.contains("yt-dlp is not installed"), "{error}");
    assert!(error.contains("brew install yt-dlp"), "{error}");
    assert!(record.file_path.is_none());

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn tool_error_text_is_stored_on_the_task() {
    let env = start_env(Some(FAILING_TOOL_SCRIPT), |_| {}).await;
    let downloader = &env.downloader;

    let id = downloader.enqueue(URL).await.unwrap();
    let (record, _) = poll_until_terminal(downloader, &id, WAIT).await;

    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.error.unwrap().contains("HTTP Error 404"));
    assert!(matches!(
        downloader.serve(&id).await.unwrap_err(),
        Error::NotReady {
            status: TaskStatus::Failed,
            ..
        }
    ));
    // No retry at this layer
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(tool_calls(&env.tool_dir).len(), 1);

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn serve_then_evict_after_retention_then_not_found() {
    // Short marker/task retention; the queue keeps its copy of the task longer
    let env = start_env(Some(FAKE_TOOL_SCRIPT), |config| {
        config.retention.task_retention = Duration::from_secs(1);
    })
    .await;
    let downloader = &env.downloader;

    let id = downloader.enqueue(URL).await.unwrap();
    let (record, _) = poll_until_terminal(downloader, &id, WAIT).await;
    assert_eq!(record.status, TaskStatus::Completed);
    let path = record.file_path.unwrap();

    // First serve: inside the retention window, the file stays cached
    let mut served = downloader.serve(&id).await.unwrap();
    assert_eq!(served.filename, "Fake Clip.mp4");
    let mut body = Vec::new();
    served.file.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"fake media bytes");
    served.lease.release().await.unwrap();
    assert!(path.exists());

    // Second serve after the marker expired: the last reader removes the file
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(
        !downloader
            .lifecycle()
            .store()
            .exists(&keys::last_request(&path))
            .await
            .unwrap()
    );
    let served = downloader.serve(&id).await.unwrap();
    served.lease.release().await.unwrap();
    assert!(!path.exists());

    // Third serve: the task is still known, its file is not
    let err = downloader.serve(&id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err:?}");
    assert_eq!(downloader.lifecycle().ref_count(&path).await.unwrap(), 0);

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_after_eviction_downloads_again() {
    let env = start_env(Some(FAKE_TOOL_SCRIPT), |_| {}).await;
    let downloader = &env.downloader;

    let id = downloader.enqueue(URL).await.unwrap();
    let path = poll_until_terminal(downloader, &id, WAIT)
        .await
        .0
        .file_path
        .unwrap();

    downloader
        .lifecycle()
        .store()
        .del(&keys::last_request(&path))
        .await
        .unwrap();
    let report = downloader.sweeper().sweep().await;
    assert_eq!(report.files_evicted, 1);
    assert!(!path.exists());

    let id = downloader.enqueue(URL).await.unwrap();
    let record = poll_until_terminal(downloader, &id, WAIT).await.0;
    assert_eq!(record.file_path.as_ref(), Some(&path));
    assert!(path.exists());
    assert_eq!(download_calls(&env.tool_dir), 2);

    downloader.shutdown().await.unwrap();
}

#[tokio::test]
async fn tasks_survive_a_restart_on_the_same_store() {
    let env = start_env(Some(FAKE_TOOL_SCRIPT), |_| {}).await;

    let id = env.downloader.enqueue(URL).await.unwrap();
    poll_until_terminal(&env.downloader, &id, WAIT).await;
    let config = (*env.downloader.get_config()).clone();
    env.downloader.shutdown().await.unwrap();
    drop(env.downloader);

    let reopened = media_dl::MediaDownloader::new(config).await.unwrap();
    let record = reopened.get_status(&id).await.unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(reopened.serve(&id).await.is_ok());
    drop(env.temp_dir);
}
