//! Federated art search: fan out across every enabled adapter, merge,
//! dedupe, rank, cache.

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::metrics::METRICS;
use super::search_cache::SearchCache;
use crate::error::AppError;
use crate::models::{ArtSourceId, Artwork};
use crate::sources::{ArtSource, SourceError};

/// Per-adapter deadline during a search fan-out.
const ADAPTER_DEADLINE: Duration = Duration::from_secs(5);
/// Deadline for the whole fan-out.
const SEARCH_DEADLINE: Duration = Duration::from_secs(7);
/// Per-adapter deadline when hunting for a random artwork.
const RANDOM_DEADLINE: Duration = Duration::from_secs(3);

/// Outcome of one adapter's contribution to a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok,
    RateLimited,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SourceStatus {
    pub status: SourceOutcome,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Artwork>,
    /// Per-adapter outcome, keyed by source name. Failed adapters appear
    /// here instead of failing the request.
    pub sources: BTreeMap<String, SourceStatus>,
    pub has_more: bool,
}

/// Adapter inventory entry for the sources listing endpoint.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub source: ArtSourceId,
    pub enabled: bool,
    pub supports_random: bool,
}

pub struct SearchFederator {
    sources: Vec<Arc<dyn ArtSource>>,
    cache: SearchCache,
    fanout: Arc<Semaphore>,
}

impl SearchFederator {
    pub fn new(sources: Vec<Arc<dyn ArtSource>>, cache_entries: usize) -> Self {
        // Full fan-out: the semaphore bounds concurrency at the adapter
        // count, so it only throttles overlapping searches.
        let cap = sources.len().max(1);
        Self {
            sources,
            cache: SearchCache::new(cache_entries),
            fanout: Arc::new(Semaphore::new(cap)),
        }
    }

    pub fn inventory(&self) -> Vec<SourceInfo> {
        self.sources
            .iter()
            .map(|s| SourceInfo {
                source: s.id(),
                enabled: s.enabled(),
                supports_random: s.supports_random(),
            })
            .collect()
    }

    /// Federated search. Individual adapter failures are reported in the
    /// `sources` map; only a total failure becomes an error.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<SearchResponse, AppError> {
        if limit == 0 {
            return Err(AppError::BadInput("limit must be at least 1".into()));
        }
        METRICS.searches.inc();

        let key = fingerprint(query, limit, offset);
        if let Some(hit) = self.cache.get(&key) {
            METRICS.search_cache_hits.inc();
            tracing::debug!(query = %query, "Search cache hit");
            return Ok(hit);
        }

        let enabled: Vec<Arc<dyn ArtSource>> = self
            .sources
            .iter()
            .filter(|s| s.enabled())
            .cloned()
            .collect();
        if enabled.is_empty() {
            return Err(AppError::Upstream("no art sources configured".into()));
        }

        // Each adapter fetches enough rows to cover the requested window;
        // the merged ranking is sliced once at the end.
        let fetch = limit + offset;
        let tasks = enabled.iter().map(|source| {
            let source = source.clone();
            let semaphore = self.fanout.clone();
            let query = query.to_string();
            async move {
                let _permit = semaphore.acquire().await;
                let outcome =
                    tokio::time::timeout(ADAPTER_DEADLINE, source.search(&query, fetch, 0)).await;
                (source.id(), outcome)
            }
        });
        let outcomes = tokio::time::timeout(SEARCH_DEADLINE, join_all(tasks))
            .await
            .map_err(|_| AppError::Timeout("federated search deadline exceeded".into()))?;

        let mut sources_map = BTreeMap::new();
        let mut merged: Vec<Artwork> = Vec::new();
        let mut any_ok = false;
        for (id, outcome) in outcomes {
            let status = match outcome {
                Ok(Ok(items)) => {
                    any_ok = true;
                    let count = items.len();
                    merged.extend(items);
                    SourceStatus {
                        status: SourceOutcome::Ok,
                        count,
                    }
                }
                Ok(Err(SourceError::RateLimited)) => {
                    tracing::warn!(source = %id, "Adapter rate limited");
                    SourceStatus {
                        status: SourceOutcome::RateLimited,
                        count: 0,
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(source = %id, error = %e, "Adapter failed");
                    SourceStatus {
                        status: SourceOutcome::Error,
                        count: 0,
                    }
                }
                Err(_) => {
                    tracing::warn!(source = %id, "Adapter deadline exceeded");
                    SourceStatus {
                        status: SourceOutcome::Error,
                        count: 0,
                    }
                }
            };
            sources_map.insert(id.to_string(), status);
        }

        if !any_ok {
            return Err(AppError::Upstream("all art sources failed".into()));
        }

        let ranked = dedupe_and_rank(merged, query);
        let has_more = ranked.len() > offset + limit;
        let results: Vec<Artwork> = ranked.into_iter().skip(offset).take(limit).collect();

        let response = SearchResponse {
            results,
            sources: sources_map,
            has_more,
        };
        self.cache.store(key, response.clone());
        Ok(response)
    }

    /// A random artwork from a random source. Sources are shuffled and
    /// tried in turn; the first success wins.
    pub async fn random(&self) -> Result<Artwork, AppError> {
        let mut candidates: Vec<Arc<dyn ArtSource>> = self
            .sources
            .iter()
            .filter(|s| s.enabled() && s.supports_random())
            .cloned()
            .collect();
        candidates.shuffle(&mut rand::thread_rng());

        for source in candidates {
            match tokio::time::timeout(RANDOM_DEADLINE, source.random()).await {
                Ok(Ok(art)) => return Ok(art),
                Ok(Err(e)) => {
                    tracing::warn!(source = %source.id(), error = %e, "Random fetch failed");
                }
                Err(_) => {
                    tracing::warn!(source = %source.id(), "Random fetch timed out");
                }
            }
        }
        Err(AppError::Upstream(
            "no art source produced a random artwork".into(),
        ))
    }
}

/// Cache key: normalized query plus the paging window.
fn fingerprint(query: &str, limit: usize, offset: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(limit.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(offset.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Collapse duplicates (first occurrence wins, preserving source order),
/// then stable-sort by descending score.
fn dedupe_and_rank(merged: Vec<Artwork>, query: &str) -> Vec<Artwork> {
    let mut seen = HashSet::new();
    let mut deduped: Vec<Artwork> = Vec::with_capacity(merged.len());
    for art in merged {
        if seen.insert(art.fingerprint()) {
            deduped.push(art);
        }
    }
    for art in &mut deduped {
        art.score = Some(rank_score(art, query));
    }
    // Stable sort: equal scores keep adapter fan-out order.
    deduped.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    deduped
}

fn rank_score(art: &Artwork, query: &str) -> f64 {
    let q = query.trim().to_lowercase();
    let mut score = 0.0;
    if !q.is_empty() {
        if art.artist.to_lowercase() == q {
            score += 10.0;
        }
        if art.title.to_lowercase().contains(&q) {
            score += 5.0;
        }
    }
    if art
        .department
        .as_deref()
        .map(|d| d.to_lowercase().contains("paint"))
        .unwrap_or(false)
    {
        score += 5.0;
    }
    if let Some(year) = extract_year(&art.date) {
        if year < 1900 {
            score += 3.0;
        }
    }
    if is_high_res_thumbnail(&art.thumbnail_url) {
        score += 2.0;
    }
    score
}

fn extract_year(date: &str) -> Option<i32> {
    lazy_static::lazy_static! {
        static ref YEAR: regex::Regex = regex::Regex::new(r"\b(1[0-9]{3}|20[0-9]{2})\b").unwrap();
    }
    YEAR.find(date)?.as_str().parse().ok()
}

/// Thumbnails whose URL advertises a width of 600px or more.
fn is_high_res_thumbnail(url: &str) -> bool {
    lazy_static::lazy_static! {
        static ref DIGITS: regex::Regex = regex::Regex::new(r"\d{3,4}").unwrap();
    }
    DIGITS
        .find_iter(url)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .any(|n| (600..=4000).contains(&n))
}
