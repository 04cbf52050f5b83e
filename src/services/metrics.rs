//! Prometheus metrics for the orchestrator.
//!
//! Counters live in a process-global registry and are rendered in text
//! exposition format by the `/api/metrics` handler.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_with_registry, Encoder, IntCounter, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref METRICS: AppMetrics = AppMetrics::with_registry(&REGISTRY);
}

pub struct AppMetrics {
    /// `GET /api/current.json` polls served.
    pub device_polls: IntCounter,
    /// Raw pixel buffers streamed to devices.
    pub image_downloads: IntCounter,
    /// Telemetry posts ingested.
    pub status_reports: IntCounter,
    /// Federated searches started (cache hits included).
    pub searches: IntCounter,
    pub search_cache_hits: IntCounter,
    /// Pipeline runs completed.
    pub pipeline_jobs: IntCounter,
    /// Playlist advances performed.
    pub playlist_advances: IntCounter,
    pub commands_enqueued: IntCounter,
    pub commands_drained: IntCounter,
    /// Firmware binaries served.
    pub ota_downloads: IntCounter,
}

impl AppMetrics {
    pub fn with_registry(registry: &Registry) -> Self {
        let counter = |name: &str, help: &str| {
            register_int_counter_with_registry!(name, help, registry)
                .expect("metric registration")
        };
        Self {
            device_polls: counter(
                "inkframe_device_polls_total",
                "Device current.json polls served",
            ),
            image_downloads: counter(
                "inkframe_image_downloads_total",
                "Raw pixel buffers streamed to devices",
            ),
            status_reports: counter(
                "inkframe_status_reports_total",
                "Device telemetry posts ingested",
            ),
            searches: counter("inkframe_searches_total", "Federated searches started"),
            search_cache_hits: counter(
                "inkframe_search_cache_hits_total",
                "Searches answered from cache",
            ),
            pipeline_jobs: counter(
                "inkframe_pipeline_jobs_total",
                "Image pipeline runs completed",
            ),
            playlist_advances: counter(
                "inkframe_playlist_advances_total",
                "Playlist advances performed",
            ),
            commands_enqueued: counter(
                "inkframe_commands_enqueued_total",
                "Device commands enqueued",
            ),
            commands_drained: counter(
                "inkframe_commands_drained_total",
                "Device commands drained by polls",
            ),
            ota_downloads: counter(
                "inkframe_ota_downloads_total",
                "Firmware binaries served to devices",
            ),
        }
    }
}

/// Render the registry in Prometheus text exposition format.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
