//! HTTP server assembly: shared state and the router used by both the
//! production binary and integration tests.

use axum::{
    extract::DefaultBodyLimit,
    http::header::CONNECTION,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::api;
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::pipeline::ImagePipeline;
use crate::services::{
    CommandQueue, CurrentImageService, DeviceRegistry, FirmwareService, Notifier, SearchFederator,
};
use crate::sources;
use crate::store::JsonStore;

/// Largest request body accepted (uploads).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<JsonStore>,
    pub current: Arc<CurrentImageService>,
    pub devices: Arc<DeviceRegistry>,
    pub commands: Arc<CommandQueue>,
    pub federator: Arc<SearchFederator>,
    pub pipeline: Arc<ImagePipeline>,
    pub firmware: Arc<FirmwareService>,
    pub http: reqwest::Client,
}

/// Build the full application state from configuration.
pub async fn create_app_state(config: ServerConfig) -> Result<AppState, AppError> {
    let config = Arc::new(config);
    let store = Arc::new(JsonStore::open(&config.data_dir)?);
    let http = reqwest::Client::builder()
        .user_agent(concat!("inkframe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("http client: {e}")))?;

    let current = Arc::new(CurrentImageService::new(store.clone()));
    let notifier = Arc::new(Notifier::new(http.clone(), config.webhook_url.clone()));
    let devices = Arc::new(DeviceRegistry::new(store.clone(), notifier));
    let commands = Arc::new(CommandQueue::new(store.clone()));
    let federator = Arc::new(SearchFederator::new(
        sources::build_sources(http.clone(), &config),
        config.search_cache_entries,
    ));
    let pipeline = Arc::new(ImagePipeline::new(config.pipeline_jobs));
    let firmware = Arc::new(
        FirmwareService::new(
            store.clone(),
            config.firmware_path.clone(),
            config.firmware_version.clone(),
            config.build_date.clone(),
        )
        .await?,
    );

    Ok(AppState {
        config,
        store,
        current,
        devices,
        commands,
        federator,
        pipeline,
        firmware,
        http,
    })
}

/// Build the API router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Device wake-cycle endpoints
        .route("/api/current.json", get(api::handle_current))
        .route("/api/image.bin", get(api::handle_image_bin))
        .route("/api/device-status", post(api::device::handle_device_status))
        .route(
            "/api/device-status/:device_id",
            get(api::device::handle_get_device),
        )
        .route("/api/devices", get(api::device::handle_list_devices))
        .route(
            "/api/commands/:device_id",
            get(api::device::handle_drain_commands),
        )
        .route(
            "/api/device-command/:device_id",
            post(api::device::handle_enqueue_command)
                .delete(api::device::handle_clear_commands),
        )
        .route(
            "/api/serial-stream/:device_id",
            post(api::device::handle_serial_append)
                .get(api::device::handle_serial_read)
                .delete(api::device::handle_serial_clear),
        )
        // Content ingestion & search
        .route("/api/art/search", get(api::art::handle_search))
        .route("/api/art/random", get(api::art::handle_random))
        .route("/api/art/sources", get(api::art::handle_sources))
        .route("/api/art/import", post(api::art::handle_import))
        .route("/api/upload", post(api::art::handle_upload))
        .route("/api/current/apply/:image_id", post(api::art::handle_apply))
        // History
        .route("/api/history", get(api::history::handle_history))
        .route(
            "/api/history/:image_id/load",
            post(api::history::handle_history_load),
        )
        .route(
            "/api/history/:image_id",
            delete(api::history::handle_history_delete),
        )
        // Playlist & settings
        .route(
            "/api/playlist",
            get(api::playlist::handle_get)
                .post(api::playlist::handle_put)
                .patch(api::playlist::handle_patch)
                .delete(api::playlist::handle_delete),
        )
        .route(
            "/api/settings",
            get(api::settings::handle_get).put(api::settings::handle_put),
        )
        // Observability
        .route("/api/metrics", get(api::metrics::handle_metrics))
        .route("/health", get(|| async { "OK" }))
        // OTA
        .route("/firmware/version", get(api::firmware::handle_firmware_version))
        .route(
            "/firmware/download",
            get(api::firmware::handle_firmware_download),
        )
        .route("/firmware/force", post(api::firmware::handle_firmware_force))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        // Disable keep-alive: the panel's HTTP client holds connections
        // open across deep sleep and never reuses them.
        .layer(SetResponseHeaderLayer::overriding(
            CONNECTION,
            axum::http::HeaderValue::from_static("close"),
        ))
}
