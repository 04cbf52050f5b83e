//! Static API-key check for mutating endpoints.

use axum::http::{header, HeaderMap};

use crate::config::ServerConfig;
use crate::error::AppError;

/// Accepts the key as `X-API-Key: <key>` or `Authorization: Bearer <key>`.
/// With no key configured the server runs open (development mode).
pub fn require_api_key(headers: &HeaderMap, config: &ServerConfig) -> Result<(), AppError> {
    let Some(expected) = &config.api_key else {
        return Ok(());
    };

    let provided = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        });

    match provided {
        Some(key) if key == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with_key(key: Option<&str>) -> ServerConfig {
        let mut config = ServerConfig::for_data_dir("/tmp/x");
        config.api_key = key.map(String::from);
        config
    }

    #[test]
    fn test_open_without_configured_key() {
        let headers = HeaderMap::new();
        assert!(require_api_key(&headers, &config_with_key(None)).is_ok());
    }

    #[test]
    fn test_x_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("secret"));
        assert!(require_api_key(&headers, &config_with_key(Some("secret"))).is_ok());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer secret"),
        );
        assert!(require_api_key(&headers, &config_with_key(Some("secret"))).is_ok());
    }

    #[test]
    fn test_wrong_or_missing_key_rejected() {
        let config = config_with_key(Some("secret"));
        let empty = HeaderMap::new();
        assert!(matches!(
            require_api_key(&empty, &config),
            Err(AppError::Unauthorized)
        ));

        let mut wrong = HeaderMap::new();
        wrong.insert("x-api-key", HeaderValue::from_static("nope"));
        assert!(matches!(
            require_api_key(&wrong, &config),
            Err(AppError::Unauthorized)
        ));
    }
}
