//! Museum API adapters.
//!
//! One adapter per upstream source. Adapters normalize wildly different
//! response shapes into [`Artwork`] and are responsible for their own
//! filtering: only publicly retrievable images, only paintings where the
//! upstream schema exposes a classification, ids mapped to
//! `<prefix>-<upstreamId>`.
//!
//! Deadlines are enforced by the federator wrapping each call; adapters
//! are plain futures and cancel cleanly when dropped.

mod artic;
mod cleveland;
mod curated;
mod harvard;
mod met;
mod rijks;
mod smithsonian;
mod vam;
mod wikimedia;

pub use artic::ArticSource;
pub use cleveland::ClevelandSource;
pub use curated::CuratedSource;
pub use harvard::HarvardSource;
pub use met::MetSource;
pub use rijks::RijksSource;
pub use smithsonian::SmithsonianSource;
pub use vam::VamSource;
pub use wikimedia::WikimediaSource;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::models::{ArtSourceId, Artwork};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited")]
    RateLimited,

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("source does not support this operation")]
    Unsupported,
}

/// A searchable artwork source.
#[async_trait]
pub trait ArtSource: Send + Sync {
    fn id(&self) -> ArtSourceId;

    /// Sources needing an API key report `false` without one and are
    /// skipped by the federator.
    fn enabled(&self) -> bool {
        true
    }

    /// Whether [`ArtSource::random`] is implemented; sources without it
    /// are skipped in the random fan-out.
    fn supports_random(&self) -> bool {
        false
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Artwork>, SourceError>;

    async fn random(&self) -> Result<Artwork, SourceError> {
        Err(SourceError::Unsupported)
    }
}

/// Map an upstream HTTP status to a source error; 429 is kept distinct so
/// the federator can report `rate_limited`.
pub(crate) fn ensure_success(status: reqwest::StatusCode) -> Result<(), SourceError> {
    if status.as_u16() == 429 {
        return Err(SourceError::RateLimited);
    }
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    Ok(())
}

/// Case-insensitive "is this a painting" check for classification fields.
pub(crate) fn is_painting(classification: Option<&str>) -> bool {
    match classification {
        // No classification exposed: keep the item.
        None => true,
        Some(c) => c.to_lowercase().contains("paint"),
    }
}

/// Build the full adapter set in fan-out order.
pub fn build_sources(client: reqwest::Client, config: &ServerConfig) -> Vec<Arc<dyn ArtSource>> {
    vec![
        Arc::new(MetSource::new(client.clone())),
        Arc::new(ArticSource::new(client.clone())),
        Arc::new(ClevelandSource::new(client.clone())),
        Arc::new(RijksSource::new(client.clone(), config.rijks_api_key.clone())),
        Arc::new(WikimediaSource::new(client.clone())),
        Arc::new(VamSource::new(client.clone())),
        Arc::new(HarvardSource::new(
            client.clone(),
            config.harvard_api_key.clone(),
        )),
        Arc::new(SmithsonianSource::new(
            client,
            config.smithsonian_api_key.clone(),
        )),
        Arc::new(CuratedSource::new()),
    ]
}
