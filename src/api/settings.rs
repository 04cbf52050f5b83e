//! Operator settings endpoints.

use axum::{extract::State, http::HeaderMap, response::Json};
use chrono::Timelike;
use serde_json::{json, Value};

use super::auth::require_api_key;
use crate::error::AppError;
use crate::models::{in_hour_window, Settings};
use crate::server::AppState;
use crate::store::entity;

/// Settings plus the sleep duration the next device poll would receive,
/// so the dashboard can show the effect of the night window directly.
pub async fn handle_get(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let settings: Settings = state.store.read_or_default(entity::SETTINGS).await?;
    let now_local = chrono::Local::now().naive_local();
    let next_sleep = settings.sleep_duration_at(now_local);
    let in_night_window = settings.night_sleep_enabled
        && in_hour_window(
            now_local.hour(),
            settings.night_sleep_start_hour,
            settings.night_sleep_end_hour,
        );

    let mut body = serde_json::to_value(&settings)
        .map_err(|e| AppError::Internal(format!("settings serialization: {e}")))?;
    if let Some(map) = body.as_object_mut() {
        map.insert("nextSleepDurationUs".into(), json!(next_sleep));
        map.insert("inNightWindow".into(), json!(in_night_window));
    }
    Ok(Json(body))
}

pub async fn handle_put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, AppError> {
    require_api_key(&headers, &state.config)?;
    settings.validate()?;
    state.store.write(entity::SETTINGS, &settings).await?;
    tracing::info!(
        sleep_us = settings.default_sleep_duration_us,
        night_sleep = settings.night_sleep_enabled,
        "Settings updated"
    );
    Ok(Json(settings))
}
