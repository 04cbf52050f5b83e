//! Device-facing poll endpoints: current image metadata and the raw pixel
//! buffer. These are the hot path of every wake cycle; they do no external
//! I/O and must answer even when parts of the store are unhappy, so the
//! device can always go back to sleep on schedule.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Timelike;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{in_hour_window, micros_until_hour, Settings};
use crate::server::AppState;
use crate::services::metrics::METRICS;
use crate::store::entity;

/// Response of `GET /api/current.json`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentJsonResponse {
    pub has_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Milliseconds since epoch of the current image write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Microseconds the device should deep-sleep.
    pub sleep_duration: u64,
    pub rotation: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_server_host: Option<String>,
}

/// Device metadata poll
///
/// Checks the playlist for a due advance, then reports what the panel
/// should be showing and how long to sleep afterwards.
#[utoipa::path(
    get,
    path = "/api/current.json",
    responses(
        (status = 200, description = "Current image metadata", body = CurrentJsonResponse),
    ),
    tag = "Device"
)]
pub async fn handle_current(State(state): State<AppState>) -> Json<CurrentJsonResponse> {
    METRICS.device_polls.inc();

    // A due playlist advances before the snapshot is taken; the first poll
    // after the interval boundary sees the new image.
    if let Err(e) = state.current.maybe_advance_playlist().await {
        tracing::warn!(error = %e, "Playlist advance failed, serving previous image");
    }

    let settings: Settings = match state.store.read_or_default(entity::SETTINGS).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Settings unreadable, using defaults");
            Settings::default()
        }
    };
    let snapshot = match state.current.snapshot().await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Current image unreadable");
            None
        }
    };

    let sleep_duration = effective_sleep_duration(
        &settings,
        snapshot.as_ref().map(|c| c.sleep_duration),
        chrono::Local::now().naive_local(),
    );

    let response = match snapshot {
        Some(current) => CurrentJsonResponse {
            has_image: true,
            image_id: Some(current.image_id),
            title: Some(current.title),
            artist: current.artist,
            source: current.source,
            timestamp: Some(current.timestamp.timestamp_millis()),
            sleep_duration,
            rotation: current.rotation.degrees(),
            dev_server_host: settings.dev_server_host.filter(|_| settings.dev_mode),
        },
        None => CurrentJsonResponse {
            has_image: false,
            image_id: None,
            title: None,
            artist: None,
            source: None,
            timestamp: None,
            sleep_duration,
            rotation: 0,
            dev_server_host: settings.dev_server_host.filter(|_| settings.dev_mode),
        },
    };
    Json(response)
}

/// Sleep priority: night window override, then the current image's own
/// duration (playlists set it to their interval), then the default.
fn effective_sleep_duration(
    settings: &Settings,
    current_sleep: Option<u64>,
    now_local: chrono::NaiveDateTime,
) -> u64 {
    if settings.night_sleep_enabled
        && in_hour_window(
            now_local.hour(),
            settings.night_sleep_start_hour,
            settings.night_sleep_end_hour,
        )
    {
        return micros_until_hour(now_local, settings.night_sleep_end_hour);
    }
    current_sleep
        .filter(|&d| d > 0)
        .unwrap_or(settings.default_sleep_duration_us)
}

/// Raw pixel buffer download
///
/// `width * height * 3` bytes of RGB888, already rotated, every triple one
/// of the six panel colors. Never compressed.
#[utoipa::path(
    get,
    path = "/api/image.bin",
    responses(
        (status = 200, description = "Raw RGB888 buffer", content_type = "application/octet-stream"),
        (status = 404, description = "No image published yet"),
    ),
    tag = "Device"
)]
pub async fn handle_image_bin(State(state): State<AppState>) -> Result<Response, AppError> {
    let pixels = state
        .current
        .pixels()
        .await?
        .ok_or_else(|| AppError::NotFound("no image published".into()))?;
    METRICS.image_downloads.inc();
    tracing::info!(size_bytes = pixels.len(), "Serving device pixel buffer");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, pixels.len().to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Bytes::from(pixels),
    )
        .into_response())
}
