//! REST API server example
//!
//! Runs media-dl with the REST API enabled. After starting, you can:
//! - Enqueue a URL via POST http://localhost:8080/downloads
//! - Poll it via GET http://localhost:8080/downloads/{task_id}
//! - Fetch the file via GET http://localhost:8080/videos/{task_id}
//!
//! Requires yt-dlp on PATH.

use media_dl::config::{ApiConfig, Config, DownloadConfig};
use media_dl::{MediaDownloader, run_with_shutdown};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let config = Config {
        download: DownloadConfig {
            output_dir: "downloads".into(),
            ..Default::default()
        },
        api: ApiConfig {
            bind_address: "127.0.0.1:8080".parse()?,
            ..Default::default()
        },
        ..Default::default()
    };

    let downloader = Arc::new(MediaDownloader::new(config).await?);
    downloader.start().await;
    let api = downloader.spawn_api_server();

    println!("media-dl listening on http://127.0.0.1:8080");
    println!();
    println!("  curl -X POST http://127.0.0.1:8080/downloads \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"url\": \"https://www.youtube.com/watch?v=dQw4w9WgXcQ\"}}'");
    println!();
    println!("  curl http://127.0.0.1:8080/downloads/<task_id>");
    println!("  curl -OJ http://127.0.0.1:8080/videos/<task_id>");

    run_with_shutdown((*downloader).clone()).await?;
    api.abort();
    Ok(())
}
