//! OTA endpoints: manifest, binary download, force flag.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::auth::require_api_key;
use crate::error::AppError;
use crate::server::AppState;
use crate::services::metrics::METRICS;
use crate::services::FirmwareManifest;

/// OTA manifest
///
/// The device compares `version` by string equality and decides for
/// itself using `minBattery`, `size`, `sha256` and `forceUpdate`.
#[utoipa::path(
    get,
    path = "/firmware/version",
    responses(
        (status = 200, description = "Firmware manifest", body = FirmwareManifest),
        (status = 404, description = "No firmware binary deployed"),
    ),
    tag = "OTA"
)]
pub async fn handle_firmware_version(
    State(state): State<AppState>,
) -> Result<Json<FirmwareManifest>, AppError> {
    Ok(Json(state.firmware.manifest().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    #[serde(default)]
    pub device_id: Option<String>,
}

pub async fn handle_firmware_download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let binary = state.firmware.binary().await?;
    METRICS.ota_downloads.inc();
    tracing::info!(
        device_id = %query.device_id.as_deref().unwrap_or("unknown"),
        size_bytes = binary.len(),
        "Serving firmware binary"
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, binary.len().to_string()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Bytes::from(binary),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForceRequest {
    pub enabled: bool,
}

pub async fn handle_firmware_force(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ForceRequest>,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    state.firmware.set_force_update(request.enabled).await?;
    Ok(Json(json!({ "success": true, "forceUpdate": request.enabled })))
}
