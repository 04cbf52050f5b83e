//! Content ingestion and federated search endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::auth::require_api_key;
use crate::error::AppError;
use crate::models::{Artwork, Rotation, Settings};
use crate::pipeline::ProcessOptions;
use crate::server::AppState;
use crate::services::metrics::METRICS;
use crate::services::{NewImage, SearchResponse, SourceInfo};
use crate::store::entity;
use spectra_dither::DitherAlgorithm;

/// Deadline for fetching a remote image during import.
const IMPORT_DEADLINE: Duration = Duration::from_secs(15);
/// Largest source image accepted, from upload or import.
const MAX_SOURCE_BYTES: usize = 50 * 1024 * 1024;

/// Pipeline parameters as they arrive over the wire, before validation.
#[derive(Debug, Default)]
pub(crate) struct RawProcessParams {
    pub rotation: Option<u16>,
    pub crop_x: Option<f32>,
    pub crop_y: Option<f32>,
    pub zoom_level: Option<f32>,
    pub dither: Option<String>,
    pub enhance_contrast: Option<bool>,
    pub sharpen: Option<bool>,
    pub auto_crop_whitespace: Option<bool>,
}

impl RawProcessParams {
    pub fn is_empty(&self) -> bool {
        self.rotation.is_none()
            && self.crop_x.is_none()
            && self.crop_y.is_none()
            && self.zoom_level.is_none()
            && self.dither.is_none()
            && self.enhance_contrast.is_none()
            && self.sharpen.is_none()
            && self.auto_crop_whitespace.is_none()
    }

    pub fn into_options(self) -> Result<ProcessOptions, AppError> {
        let mut options = ProcessOptions::default();
        if let Some(degrees) = self.rotation {
            options.rotation = Rotation::try_from(degrees).map_err(AppError::BadInput)?;
        }
        if let Some(x) = self.crop_x {
            options.crop_x = x;
        }
        if let Some(y) = self.crop_y {
            options.crop_y = y;
        }
        if let Some(zoom) = self.zoom_level {
            options.zoom_level = zoom;
        }
        if let Some(name) = &self.dither {
            options.dither = DitherAlgorithm::parse(name)
                .ok_or_else(|| AppError::BadInput(format!("unknown dither algorithm '{name}'")))?;
        }
        if let Some(v) = self.enhance_contrast {
            options.enhance_contrast = v;
        }
        if let Some(v) = self.sharpen {
            options.sharpen = v;
        }
        if let Some(v) = self.auto_crop_whitespace {
            options.auto_crop_whitespace = v;
        }
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::BadInput("query parameter 'q' is required".into()));
    }
    if params.limit == 0 || params.limit > 100 {
        return Err(AppError::BadInput("limit must be between 1 and 100".into()));
    }
    let response = state
        .federator
        .search(&params.q, params.limit, params.offset)
        .await?;
    Ok(Json(response))
}

pub async fn handle_random(State(state): State<AppState>) -> Result<Json<Artwork>, AppError> {
    Ok(Json(state.federator.random().await?))
}

pub async fn handle_sources(State(state): State<AppState>) -> Json<Vec<SourceInfo>> {
    Json(state.federator.inventory())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImportRequest {
    pub image_url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub rotation: Option<u16>,
    #[serde(default)]
    pub crop_x: Option<f32>,
    #[serde(default)]
    pub crop_y: Option<f32>,
    #[serde(default)]
    pub zoom_level: Option<f32>,
    #[serde(default)]
    pub dither: Option<String>,
    #[serde(default)]
    pub enhance_contrast: Option<bool>,
    #[serde(default)]
    pub sharpen: Option<bool>,
    #[serde(default)]
    pub auto_crop_whitespace: Option<bool>,
}

/// Fetch a remote image, run the pipeline, and make it the current image.
pub async fn handle_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ImportRequest>,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    if !request.image_url.starts_with("http://") && !request.image_url.starts_with("https://") {
        return Err(AppError::BadInput("imageUrl must be an absolute URL".into()));
    }

    let options = RawProcessParams {
        rotation: request.rotation,
        crop_x: request.crop_x,
        crop_y: request.crop_y,
        zoom_level: request.zoom_level,
        dither: request.dither.clone(),
        enhance_contrast: request.enhance_contrast,
        sharpen: request.sharpen,
        auto_crop_whitespace: request.auto_crop_whitespace,
    }
    .into_options()?;

    let bytes = download_image(&state, &request.image_url).await?;
    tracing::info!(
        url = %request.image_url,
        size_bytes = bytes.len(),
        "Imported source image"
    );

    let processed = state.pipeline.process(bytes.clone(), options).await.map_err(|e| {
        tracing::error!(url = %request.image_url, error = %e, "Pipeline failed for import");
        e
    })?;
    METRICS.pipeline_jobs.inc();

    let settings: Settings = state.store.read_or_default(entity::SETTINGS).await?;
    let current = state
        .current
        .publish(NewImage {
            title: request
                .title
                .unwrap_or_else(|| "Imported artwork".to_string()),
            artist: request.artist,
            source: request.source,
            source_url: Some(request.image_url),
            rotation: options.rotation,
            ai_generated: false,
            sleep_duration_us: settings.default_sleep_duration_us,
            processed,
            original_bytes: Some(bytes),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "imageId": current.image_id,
        "title": current.title,
        "rotation": current.rotation.degrees(),
    })))
}

async fn download_image(state: &AppState, url: &str) -> Result<Vec<u8>, AppError> {
    let response = state
        .http
        .get(url)
        .timeout(IMPORT_DEADLINE)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(format!("image download from {url}"))
            } else {
                AppError::Upstream(format!("image download failed: {e}"))
            }
        })?;
    if !response.status().is_success() {
        return Err(AppError::Upstream(format!(
            "image host returned HTTP {}",
            response.status().as_u16()
        )));
    }
    if let Some(length) = response.content_length() {
        if length as usize > MAX_SOURCE_BYTES {
            return Err(AppError::BadInput(format!(
                "source image is {length} bytes, larger than the {MAX_SOURCE_BYTES} byte limit"
            )));
        }
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::Upstream(format!("image download interrupted: {e}")))?;
    if bytes.len() > MAX_SOURCE_BYTES {
        return Err(AppError::BadInput("source image too large".into()));
    }
    Ok(bytes.to_vec())
}

/// Direct multipart upload. The image lands in the archive only; it shows
/// on the panel after an explicit apply.
pub async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;

    let mut image: Option<Vec<u8>> = None;
    let mut title: Option<String> = None;
    let mut artist: Option<String> = None;
    let mut params = RawProcessParams::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadInput(format!("multipart: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" | "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadInput(format!("multipart: {e}")))?;
                if bytes.len() > MAX_SOURCE_BYTES {
                    return Err(AppError::BadInput("source image too large".into()));
                }
                image = Some(bytes.to_vec());
            }
            other => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadInput(format!("multipart: {e}")))?;
                apply_text_field(other, &text, &mut title, &mut artist, &mut params)?;
            }
        }
    }

    let bytes = image.ok_or_else(|| AppError::BadInput("missing 'image' field".into()))?;
    let options = params.into_options()?;
    let processed = state.pipeline.process(bytes.clone(), options).await?;
    METRICS.pipeline_jobs.inc();

    let settings: Settings = state.store.read_or_default(entity::SETTINGS).await?;
    let entry = state
        .current
        .archive(NewImage {
            title: title.unwrap_or_else(|| "Uploaded image".to_string()),
            artist,
            source: Some("upload".to_string()),
            source_url: None,
            rotation: options.rotation,
            ai_generated: false,
            sleep_duration_us: settings.default_sleep_duration_us,
            processed,
            original_bytes: Some(bytes),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "imageId": entry.image_id,
        "title": entry.title,
        "applied": false,
    })))
}

fn apply_text_field(
    name: &str,
    text: &str,
    title: &mut Option<String>,
    artist: &mut Option<String>,
    params: &mut RawProcessParams,
) -> Result<(), AppError> {
    let parse_err = |field: &str| AppError::BadInput(format!("invalid value for '{field}'"));
    match name {
        "title" => *title = Some(text.to_string()),
        "artist" => *artist = Some(text.to_string()),
        "rotation" => params.rotation = Some(text.parse().map_err(|_| parse_err("rotation"))?),
        "cropX" => params.crop_x = Some(text.parse().map_err(|_| parse_err("cropX"))?),
        "cropY" => params.crop_y = Some(text.parse().map_err(|_| parse_err("cropY"))?),
        "zoomLevel" => {
            params.zoom_level = Some(text.parse().map_err(|_| parse_err("zoomLevel"))?)
        }
        "dither" => params.dither = Some(text.to_string()),
        "enhanceContrast" => params.enhance_contrast = Some(parse_bool(text)?),
        "sharpen" => params.sharpen = Some(parse_bool(text)?),
        "autoCropWhitespace" => params.auto_crop_whitespace = Some(parse_bool(text)?),
        other => {
            return Err(AppError::BadInput(format!(
                "unknown upload field '{other}'"
            )))
        }
    }
    Ok(())
}

fn parse_bool(text: &str) -> Result<bool, AppError> {
    match text {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(AppError::BadInput(format!("invalid boolean '{other}'"))),
    }
}

/// Promote an archived image to the display.
pub async fn handle_apply(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    let settings: Settings = state.store.read_or_default(entity::SETTINGS).await?;
    let current = state
        .current
        .apply_archived(image_id, settings.default_sleep_duration_us)
        .await?;
    Ok(Json(json!({
        "success": true,
        "imageId": current.image_id,
        "title": current.title,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_params_defaults() {
        let options = RawProcessParams::default().into_options().unwrap();
        assert_eq!(options.rotation, Rotation::Deg0);
        assert_eq!(options.zoom_level, 1.0);
        assert_eq!(options.dither, DitherAlgorithm::FloydSteinberg);
    }

    #[test]
    fn test_raw_params_rejects_bad_rotation() {
        let params = RawProcessParams {
            rotation: Some(45),
            ..Default::default()
        };
        assert!(matches!(
            params.into_options(),
            Err(AppError::BadInput(_))
        ));
    }

    #[test]
    fn test_raw_params_rejects_bad_dither() {
        let params = RawProcessParams {
            dither: Some("ordered".into()),
            ..Default::default()
        };
        assert!(matches!(params.into_options(), Err(AppError::BadInput(_))));
    }

    #[test]
    fn test_raw_params_rejects_small_zoom() {
        let params = RawProcessParams {
            zoom_level: Some(0.5),
            ..Default::default()
        };
        assert!(params.into_options().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(parse_bool("yes").is_err());
    }

    #[test]
    fn test_import_request_rejects_unknown_fields() {
        let body = r#"{"imageUrl":"https://x/y.jpg","zoom":2}"#;
        assert!(serde_json::from_str::<ImportRequest>(body).is_err());
    }
}
