//! Device poll endpoints: current.json, image.bin, playlist advancement.

mod common;

use chrono::Utc;
use common::app::TestApp;
use inkframe::models::{Playlist, PlaylistMode, Rotation, MIN_PLAYLIST_INTERVAL_US};
use inkframe::pipeline::ProcessedImage;
use inkframe::services::NewImage;
use pretty_assertions::assert_eq;
use serde_json::json;

fn solid_image(title: &str, rotation: Rotation) -> NewImage {
    let (width, height) = rotation.target_dimensions();
    NewImage {
        title: title.into(),
        artist: Some("Test Painter".into()),
        source: Some("test".into()),
        source_url: Some(format!("https://img.example/{title}.jpg")),
        rotation,
        ai_generated: false,
        sleep_duration_us: 3_600_000_000,
        processed: ProcessedImage {
            pixels: vec![255u8; (width * height * 3) as usize],
            width,
            height,
            thumbnail_png: vec![0x89, 0x50, 0x4e, 0x47],
        },
        original_bytes: None,
    }
}

#[tokio::test]
async fn test_current_json_empty_state() {
    let app = TestApp::new().await;
    let response = app.get("/api/current.json").await;
    assert_eq!(response.status, 200);
    let body = response.json();
    assert_eq!(body["hasImage"], json!(false));
    // Default cadence: one hour in microseconds.
    assert_eq!(body["sleepDuration"], json!(3_600_000_000u64));
}

#[tokio::test]
async fn test_current_json_after_publish() {
    let app = TestApp::new().await;
    let published = app
        .state
        .current
        .publish(solid_image("Morning", Rotation::Deg0))
        .await
        .unwrap();

    let response = app.get("/api/current.json").await;
    let body = response.json();
    assert_eq!(body["hasImage"], json!(true));
    assert_eq!(body["imageId"], json!(published.image_id.to_string()));
    assert_eq!(body["title"], json!("Morning"));
    assert_eq!(body["rotation"], json!(0));
    assert_eq!(body["sleepDuration"], json!(3_600_000_000u64));
}

#[tokio::test]
async fn test_image_bin_shape_and_headers() {
    let app = TestApp::new().await;
    app.state
        .current
        .publish(solid_image("Buffer", Rotation::Deg0))
        .await
        .unwrap();

    let response = app.get("/api/image.bin").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body.len(), 1200 * 1600 * 3);
    assert_eq!(
        response.header("content-type"),
        Some("application/octet-stream")
    );
    assert_eq!(response.header("content-length"), Some("5760000"));
    assert_eq!(response.header("cache-control"), Some("no-cache"));
}

#[tokio::test]
async fn test_image_bin_landscape_dimensions() {
    let app = TestApp::new().await;
    app.state
        .current
        .publish(solid_image("Wide", Rotation::Deg90))
        .await
        .unwrap();
    let response = app.get("/api/image.bin").await;
    assert_eq!(response.body.len(), 1600 * 1200 * 3);
}

#[tokio::test]
async fn test_image_bin_404_without_image() {
    let app = TestApp::new().await;
    let response = app.get("/api/image.bin").await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_playlist_advances_on_poll() {
    let app = TestApp::new().await;
    let a = app
        .state
        .current
        .publish(solid_image("A", Rotation::Deg0))
        .await
        .unwrap();
    let b = app
        .state
        .current
        .archive(solid_image("B", Rotation::Deg0))
        .await
        .unwrap();
    let c = app
        .state
        .current
        .archive(solid_image("C", Rotation::Deg0))
        .await
        .unwrap();

    let playlist = Playlist {
        active: true,
        mode: PlaylistMode::Sequential,
        interval_us: 3_600_000_000,
        images: vec![a.image_id, b.image_id, c.image_id],
        current_index: 0,
        last_update: Utc::now() - chrono::Duration::seconds(3700),
    };
    app.state
        .store
        .write("playlist", &playlist)
        .await
        .unwrap();

    // First poll past the boundary swaps to B and resets the clock.
    let first = app.get("/api/current.json").await.json();
    assert_eq!(first["imageId"], json!(b.image_id.to_string()));
    assert_eq!(first["sleepDuration"], json!(3_600_000_000u64));

    // An immediate second poll sees the same image.
    let second = app.get("/api/current.json").await.json();
    assert_eq!(second["imageId"], json!(b.image_id.to_string()));

    let saved: Playlist = app.state.store.read("playlist").await.unwrap().unwrap();
    assert_eq!(saved.current_index, 1);
}

#[tokio::test]
async fn test_playlist_wraps_around() {
    let app = TestApp::new().await;
    let a = app
        .state
        .current
        .publish(solid_image("A", Rotation::Deg0))
        .await
        .unwrap();
    let b = app
        .state
        .current
        .archive(solid_image("B", Rotation::Deg0))
        .await
        .unwrap();

    let playlist = Playlist {
        active: true,
        mode: PlaylistMode::Sequential,
        interval_us: MIN_PLAYLIST_INTERVAL_US,
        images: vec![a.image_id, b.image_id],
        current_index: 1,
        last_update: Utc::now() - chrono::Duration::seconds(301),
    };
    app.state
        .store
        .write("playlist", &playlist)
        .await
        .unwrap();

    let body = app.get("/api/current.json").await.json();
    assert_eq!(body["imageId"], json!(a.image_id.to_string()));
}
