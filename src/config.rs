//! Server configuration from environment variables.

use std::path::PathBuf;

/// Runtime configuration assembled at startup.
///
/// Everything has a usable default so `inkframe serve` works out of the box;
/// production deployments set `API_KEY` at minimum.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PORT` - listen port (bound on 0.0.0.0).
    pub port: u16,
    /// `API_KEY` - static key required on mutating endpoints. When unset,
    /// mutating endpoints are open (development mode).
    pub api_key: Option<String>,
    /// `DATA_DIR` - root of the persisted store.
    pub data_dir: PathBuf,
    /// `DEVICE_ID` - shortcut id used when a device omits its own.
    pub default_device_id: String,
    /// `FIRMWARE_PATH` - firmware binary served to devices.
    pub firmware_path: PathBuf,
    /// `FIRMWARE_VERSION` - overrides the sidecar firmware-info entity.
    pub firmware_version: Option<String>,
    /// `BUILD_DATE` - overrides the sidecar firmware-info entity.
    pub build_date: Option<String>,
    /// `WEBHOOK_URL` - low-battery notification target; disabled when unset.
    pub webhook_url: Option<String>,
    /// `PIPELINE_JOBS` - concurrent image-pipeline workers.
    pub pipeline_jobs: usize,
    /// `SEARCH_CACHE_ENTRIES` - federated search cache capacity.
    pub search_cache_entries: usize,
    /// Museum API keys; adapters that need one are disabled without it.
    pub rijks_api_key: Option<String>,
    pub harvard_api_key: Option<String>,
    pub smithsonian_api_key: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", 3000),
            api_key: non_empty(std::env::var("API_KEY").ok()),
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            default_device_id: std::env::var("DEVICE_ID").unwrap_or_else(|_| "frame-1".into()),
            firmware_path: std::env::var("FIRMWARE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./firmware/firmware.bin")),
            firmware_version: non_empty(std::env::var("FIRMWARE_VERSION").ok()),
            build_date: non_empty(std::env::var("BUILD_DATE").ok()),
            webhook_url: non_empty(std::env::var("WEBHOOK_URL").ok()),
            pipeline_jobs: env_parse("PIPELINE_JOBS", 2),
            search_cache_entries: env_parse("SEARCH_CACHE_ENTRIES", 500),
            rijks_api_key: non_empty(std::env::var("RIJKS_API_KEY").ok()),
            harvard_api_key: non_empty(std::env::var("HARVARD_API_KEY").ok()),
            smithsonian_api_key: non_empty(std::env::var("SMITHSONIAN_API_KEY").ok()),
        }
    }

    /// Default configuration rooted at the given data directory; used by
    /// tests and the `convert` CLI path.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            api_key: None,
            data_dir: data_dir.into(),
            default_device_id: "frame-1".into(),
            firmware_path: PathBuf::from("./firmware/firmware.bin"),
            firmware_version: None,
            build_date: None,
            webhook_url: None,
            pipeline_jobs: 2,
            search_cache_entries: 500,
            rijks_api_key: None,
            harvard_api_key: None,
            smithsonian_api_key: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Map the `LOG_LEVEL` env var onto a default tracing filter directive.
///
/// `RUST_LOG` still wins when set; this only shapes the fallback.
pub fn default_log_filter() -> String {
    let level = std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "INFO".into())
        .to_lowercase();
    let level = match level.as_str() {
        "debug" | "info" | "warn" | "error" => level,
        _ => "info".into(),
    };
    format!("inkframe={level},tower_http={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = ServerConfig::for_data_dir("/tmp/x");
        assert_eq!(config.pipeline_jobs, 2);
        assert_eq!(config.search_cache_entries, 500);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_non_empty_filters_blank() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(Some("key".into())), Some("key".to_string()));
        assert_eq!(non_empty(None), None);
    }
}
