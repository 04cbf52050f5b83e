//! Playlist CRUD. The playlist itself never advances here; advancement is
//! read-triggered on the device poll path.

use axum::{extract::State, http::HeaderMap, response::Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

use super::auth::require_api_key;
use crate::error::AppError;
use crate::models::{ArchiveEntry, Playlist, PlaylistMode, MIN_PLAYLIST_INTERVAL_US};
use crate::server::AppState;
use crate::store::entity;

pub async fn handle_get(State(state): State<AppState>) -> Result<Json<Playlist>, AppError> {
    Ok(Json(state.store.read_or_default(entity::PLAYLIST).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlaylistRequest {
    pub active: bool,
    pub mode: PlaylistMode,
    pub interval_us: u64,
    pub images: Vec<Uuid>,
}

/// Replace the playlist wholesale.
pub async fn handle_put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PlaylistRequest>,
) -> Result<Json<Playlist>, AppError> {
    require_api_key(&headers, &state.config)?;
    validate_interval(request.interval_us)?;
    let images = resolve_images(&state, request.images).await?;

    let playlist = Playlist {
        active: request.active,
        mode: request.mode,
        interval_us: request.interval_us,
        images,
        current_index: 0,
        last_update: Utc::now(),
    };
    state.store.write(entity::PLAYLIST, &playlist).await?;
    tracing::info!(
        active = playlist.active,
        images = playlist.images.len(),
        interval_us = playlist.interval_us,
        "Playlist replaced"
    );
    Ok(Json(playlist))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlaylistPatch {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub mode: Option<PlaylistMode>,
    #[serde(default)]
    pub interval_us: Option<u64>,
    #[serde(default)]
    pub images: Option<Vec<Uuid>>,
}

/// Partial update; untouched fields keep their values.
pub async fn handle_patch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<PlaylistPatch>,
) -> Result<Json<Playlist>, AppError> {
    require_api_key(&headers, &state.config)?;
    if let Some(interval) = patch.interval_us {
        validate_interval(interval)?;
    }
    let images = match patch.images {
        Some(ids) => Some(resolve_images(&state, ids).await?),
        None => None,
    };

    let mut playlist: Playlist = state.store.read_or_default(entity::PLAYLIST).await?;
    if let Some(active) = patch.active {
        playlist.active = active;
    }
    if let Some(mode) = patch.mode {
        playlist.mode = mode;
    }
    if let Some(interval) = patch.interval_us {
        playlist.interval_us = interval;
    }
    if let Some(images) = images {
        playlist.images = images;
        playlist.current_index = 0;
    }
    if playlist.current_index >= playlist.images.len() && !playlist.images.is_empty() {
        playlist.current_index = 0;
    }
    state.store.write(entity::PLAYLIST, &playlist).await?;
    Ok(Json(playlist))
}

/// Reset to the inactive default.
pub async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_api_key(&headers, &state.config)?;
    state
        .store
        .write(entity::PLAYLIST, &Playlist::default())
        .await?;
    Ok(Json(json!({ "success": true })))
}

fn validate_interval(interval_us: u64) -> Result<(), AppError> {
    if interval_us < MIN_PLAYLIST_INTERVAL_US {
        return Err(AppError::BadInput(format!(
            "interval must be at least {MIN_PLAYLIST_INTERVAL_US} microseconds (5 minutes)"
        )));
    }
    Ok(())
}

/// Check every id against the archive and collapse duplicates of the same
/// underlying artwork (same source URL, or same title and artist).
async fn resolve_images(state: &AppState, ids: Vec<Uuid>) -> Result<Vec<Uuid>, AppError> {
    let entries: Vec<ArchiveEntry> = state.current.archive_entries().await?;
    let mut seen_fingerprints = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut resolved = Vec::with_capacity(ids.len());
    for id in ids {
        let entry = entries
            .iter()
            .find(|e| e.image_id == id)
            .ok_or_else(|| AppError::NotFound(format!("unknown image {id}")))?;
        if seen_ids.insert(id) && seen_fingerprints.insert(entry.fingerprint()) {
            resolved.push(id);
        }
    }
    Ok(resolved)
}
