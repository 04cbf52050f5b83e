//! Device telemetry, command, and serial-stream endpoints.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::auth::require_api_key;
use crate::error::AppError;
use crate::models::{CommandRequest, DeviceRecord, QueuedCommand, StatusReport};
use crate::server::AppState;
use crate::services::{analytics, metrics::METRICS};
use crate::store::entity;

/// Retained serial lines per device.
const MAX_SERIAL_LINES: usize = 500;

/// Telemetry ingestion
///
/// Never returns a 5xx: a device that cannot deliver telemetry must still
/// be told to go back to sleep.
#[utoipa::path(
    post,
    path = "/api/device-status",
    request_body = StatusReport,
    responses(
        (status = 200, description = "Telemetry accepted"),
        (status = 400, description = "Malformed body"),
    ),
    tag = "Device"
)]
pub async fn handle_device_status(
    State(state): State<AppState>,
    Json(report): Json<StatusReport>,
) -> Json<Value> {
    METRICS.status_reports.inc();
    let device_id = report.device_id.clone();
    if let Some(profiling) = &report.profiling {
        tracing::debug!(device_id = %device_id, profiling = %profiling, "Device profiling payload");
    }
    match state.devices.ingest(report).await {
        Ok(record) => Json(json!({
            "success": true,
            "isCharging": record.is_charging,
            "batteryPercent": record.percent,
        })),
        Err(e) => {
            tracing::error!(device_id = %device_id, error = %e, "Telemetry ingestion failed");
            Json(json!({ "success": false }))
        }
    }
}

/// Command drain
///
/// Returns and clears every pending command in insertion order.
#[utoipa::path(
    get,
    path = "/api/commands/{deviceId}",
    params(("deviceId" = String, Path, description = "Device identifier")),
    responses(
        (status = 200, description = "Pending commands", body = [QueuedCommand]),
    ),
    tag = "Device"
)]
pub async fn handle_drain_commands(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Json<Value> {
    match state.commands.drain(&device_id).await {
        Ok(commands) => Json(json!({ "commands": commands })),
        Err(e) => {
            // Commands re-deliver on the next poll; an empty response lets
            // the device sleep now.
            tracing::error!(device_id = %device_id, error = %e, "Command drain failed");
            Json(json!({ "commands": [] }))
        }
    }
}

pub async fn handle_enqueue_command(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    let depth = state.commands.enqueue(&device_id, request).await?;
    tracing::info!(device_id = %device_id, depth = depth, "Command queued");
    Ok(Json(json!({ "success": true, "queued": depth })))
}

pub async fn handle_clear_commands(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    state.commands.clear(&device_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn handle_list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceRecord>>, AppError> {
    Ok(Json(state.devices.list().await?))
}

pub async fn handle_get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let record = state
        .devices
        .get(&device_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("unknown device {device_id}")))?;
    let stats = analytics(&record, Utc::now());
    Ok(Json(json!({ "device": record, "analytics": stats })))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialChunk {
    pub lines: Vec<String>,
}

type SerialStreams = HashMap<String, Vec<String>>;

/// Devices with streaming enabled post log lines here in batches.
pub async fn handle_serial_append(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(chunk): Json<SerialChunk>,
) -> Result<Json<Value>, AppError> {
    let count = chunk.lines.len();
    state
        .store
        .update(entity::SERIAL_STREAMS, move |streams: &mut SerialStreams| {
            let lines = streams.entry(device_id).or_default();
            lines.extend(chunk.lines);
            let excess = lines.len().saturating_sub(MAX_SERIAL_LINES);
            if excess > 0 {
                lines.drain(..excess);
            }
        })
        .await?;
    Ok(Json(json!({ "success": true, "received": count })))
}

pub async fn handle_serial_read(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let streams: SerialStreams = state.store.read_or_default(entity::SERIAL_STREAMS).await?;
    let lines = streams.get(&device_id).cloned().unwrap_or_default();
    Ok(Json(json!({ "deviceId": device_id, "lines": lines })))
}

pub async fn handle_serial_clear(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    state
        .store
        .update(entity::SERIAL_STREAMS, move |streams: &mut SerialStreams| {
            streams.remove(&device_id);
        })
        .await?;
    Ok(Json(json!({ "success": true })))
}
