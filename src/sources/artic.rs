//! Art Institute of Chicago API. Images come from their IIIF server,
//! addressed by the `image_id` field of each record.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://api.artic.edu";
const DEFAULT_IIIF: &str = "https://www.artic.edu/iiif/2";

pub struct ArticSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ArticWork>,
    config: Option<ArticConfig>,
}

#[derive(Debug, Deserialize)]
struct ArticConfig {
    iiif_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticWork {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist_display: String,
    #[serde(default)]
    date_display: String,
    image_id: Option<String>,
    #[serde(default)]
    department_title: String,
    #[serde(default)]
    is_public_domain: bool,
}

impl ArticSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn normalize(work: ArticWork, iiif: &str) -> Option<Artwork> {
        let image_id = work.image_id?;
        if !work.is_public_domain || image_id.is_empty() {
            return None;
        }
        if !super::is_painting(Some(&work.department_title)) {
            return None;
        }
        Some(Artwork {
            id: ArtSourceId::Artic.artwork_id(work.id),
            title: work.title,
            artist: work.artist_display,
            date: work.date_display,
            image_url: format!("{iiif}/{image_id}/full/843,/0/default.jpg"),
            thumbnail_url: format!("{iiif}/{image_id}/full/400,/0/default.jpg"),
            source: ArtSourceId::Artic,
            score: None,
            department: Some(work.department_title),
        })
    }
}

#[async_trait]
impl ArtSource for ArticSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Artic
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Artwork>, SourceError> {
        let response = self
            .client
            .get(format!("{}/api/v1/artworks/search", self.base_url))
            .query(&[
                ("q", query),
                ("limit", &limit.to_string()),
                ("from", &offset.to_string()),
                (
                    "fields",
                    "id,title,artist_display,date_display,image_id,department_title,is_public_domain",
                ),
            ])
            .send()
            .await?;
        ensure_success(response.status())?;
        let page: SearchResponse = response.json().await?;
        let iiif = page
            .config
            .and_then(|c| c.iiif_url)
            .unwrap_or_else(|| DEFAULT_IIIF.to_string());
        Ok(page
            .data
            .into_iter()
            .filter_map(|w| Self::normalize(w, &iiif))
            .collect())
    }
}
