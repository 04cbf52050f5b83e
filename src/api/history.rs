//! Archive history listing, re-load with new parameters, and deletion.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::art::RawProcessParams;
use super::auth::require_api_key;
use crate::error::AppError;
use crate::models::{HistoryEntry, Settings};
use crate::server::AppState;
use crate::services::metrics::METRICS;
use crate::store::entity;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    /// Inline `data:image/png;base64,...` thumbnail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Newest-first history with inline thumbnails.
pub async fn handle_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryItem>>, AppError> {
    let mut entries = state.current.history().await?;
    entries.reverse();

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let thumbnail = state.current.thumbnail(entry.image_id).await?.map(|png| {
            format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(png)
            )
        });
        items.push(HistoryItem { entry, thumbnail });
    }
    Ok(Json(items))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct LoadRequest {
    pub rotation: Option<u16>,
    pub crop_x: Option<f32>,
    pub crop_y: Option<f32>,
    pub zoom_level: Option<f32>,
    pub dither: Option<String>,
    pub enhance_contrast: Option<bool>,
    pub sharpen: Option<bool>,
    pub auto_crop_whitespace: Option<bool>,
}

impl LoadRequest {
    fn into_raw(self) -> RawProcessParams {
        RawProcessParams {
            rotation: self.rotation,
            crop_x: self.crop_x,
            crop_y: self.crop_y,
            zoom_level: self.zoom_level,
            dither: self.dither,
            enhance_contrast: self.enhance_contrast,
            sharpen: self.sharpen,
            auto_crop_whitespace: self.auto_crop_whitespace,
        }
    }
}

/// Bring an archived image back to the panel. Without parameters the
/// stored device buffer is reused as-is; with parameters the retained
/// original is re-run through the pipeline. The image keeps its id either
/// way.
pub async fn handle_history_load(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
    body: Option<Json<LoadRequest>>,
) -> Result<Json<Value>, AppError> {
    let settings: Settings = state.store.read_or_default(entity::SETTINGS).await?;
    let sleep = settings.default_sleep_duration_us;

    let raw = body.map(|Json(b)| b.into_raw()).unwrap_or_default();
    let current = if raw.is_empty() {
        state.current.apply_archived(image_id, sleep).await?
    } else {
        let options = raw.into_options()?;
        let original = state
            .current
            .original_bytes(image_id)
            .await?
            .ok_or_else(|| {
                AppError::BadInput(format!(
                    "original bytes were not retained for {image_id}; re-import to change parameters"
                ))
            })?;
        let processed = state.pipeline.process(original, options).await?;
        METRICS.pipeline_jobs.inc();
        state
            .current
            .republish(image_id, processed, options.rotation, sleep)
            .await?
    };

    Ok(Json(json!({
        "success": true,
        "imageId": current.image_id,
        "title": current.title,
        "rotation": current.rotation.degrees(),
    })))
}

pub async fn handle_history_delete(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    state.current.delete(image_id).await?;
    Ok(Json(json!({ "success": true })))
}
