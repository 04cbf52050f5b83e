//! Rijksmuseum API. Requires an API key; the adapter is disabled without
//! one and skipped during fan-out.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://www.rijksmuseum.nl";

pub struct RijksSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "artObjects", default)]
    art_objects: Vec<RijksWork>,
}

#[derive(Debug, Deserialize)]
struct RijksWork {
    #[serde(rename = "objectNumber")]
    object_number: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "principalOrFirstMaker", default)]
    maker: String,
    #[serde(rename = "longTitle", default)]
    long_title: String,
    #[serde(rename = "webImage")]
    web_image: Option<WebImage>,
}

#[derive(Debug, Deserialize)]
struct WebImage {
    url: Option<String>,
}

impl RijksSource {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self::with_base_url(client, DEFAULT_BASE, api_key)
    }

    pub fn with_base_url(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    fn normalize(work: RijksWork) -> Option<Artwork> {
        let image_url = work.web_image.and_then(|i| i.url)?;
        // The long title ends with the date: "Title, Maker, 1642".
        let date = work
            .long_title
            .rsplit(", ")
            .next()
            .filter(|tail| tail.chars().any(|c| c.is_ascii_digit()))
            .unwrap_or("")
            .to_string();
        Some(Artwork {
            id: ArtSourceId::Rijks.artwork_id(&work.object_number),
            title: work.title,
            artist: work.maker,
            date,
            thumbnail_url: image_url.clone(),
            image_url,
            source: ArtSourceId::Rijks,
            score: None,
            department: None,
        })
    }
}

#[async_trait]
impl ArtSource for RijksSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Rijks
    }

    fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Artwork>, SourceError> {
        let Some(key) = &self.api_key else {
            return Err(SourceError::Unsupported);
        };
        // The API pages rather than offsets; round down to the page the
        // offset falls in.
        let page = offset / limit.max(1);
        let response = self
            .client
            .get(format!("{}/api/en/collection", self.base_url))
            .query(&[
                ("key", key.as_str()),
                ("q", query),
                ("ps", &limit.to_string()),
                ("p", &page.to_string()),
                ("imgonly", "True"),
                ("type", "painting"),
            ])
            .send()
            .await?;
        ensure_success(response.status())?;
        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .art_objects
            .into_iter()
            .filter_map(Self::normalize)
            .collect())
    }
}
