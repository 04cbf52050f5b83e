//! Smithsonian Open Access API. Requires an api.data.gov key.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://api.si.edu";

pub struct SmithsonianSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: Option<SearchBody>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    rows: Vec<SmithsonianRow>,
}

#[derive(Debug, Deserialize)]
struct SmithsonianRow {
    id: String,
    #[serde(default)]
    title: String,
    content: Option<RowContent>,
}

#[derive(Debug, Deserialize)]
struct RowContent {
    freetext: Option<Freetext>,
    #[serde(rename = "descriptiveNonRepeating")]
    descriptive: Option<Descriptive>,
}

#[derive(Debug, Deserialize)]
struct Freetext {
    name: Option<Vec<LabeledText>>,
    date: Option<Vec<LabeledText>>,
}

#[derive(Debug, Deserialize)]
struct LabeledText {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Descriptive {
    online_media: Option<OnlineMedia>,
}

#[derive(Debug, Deserialize)]
struct OnlineMedia {
    media: Option<Vec<Media>>,
}

#[derive(Debug, Deserialize)]
struct Media {
    content: Option<String>,
    thumbnail: Option<String>,
}

impl SmithsonianSource {
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

    fn normalize(row: SmithsonianRow) -> Option<Artwork> {
        let content = row.content?;
        let media = content
            .descriptive
            .and_then(|d| d.online_media)
            .and_then(|m| m.media)
            .and_then(|m| m.into_iter().find(|item| item.content.is_some()))?;
        let image_url = media.content.filter(|u| !u.is_empty())?;
        let first_text = |items: Option<Vec<LabeledText>>| {
            items
                .and_then(|v| v.into_iter().next())
                .map(|t| t.content)
                .unwrap_or_default()
        };
        let (artist, date) = match content.freetext {
            Some(ft) => (first_text(ft.name), first_text(ft.date)),
            None => (String::new(), String::new()),
        };
        Some(Artwork {
            id: ArtSourceId::Smithsonian.artwork_id(&row.id),
            title: row.title,
            artist,
            date,
            thumbnail_url: media.thumbnail.unwrap_or_else(|| image_url.clone()),
            image_url,
            source: ArtSourceId::Smithsonian,
            score: None,
            department: None,
        })
    }
}

#[async_trait]
impl ArtSource for SmithsonianSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Smithsonian
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
        // Restrict to CC0 records with media attached.
        let q = format!("{query} AND online_media_type:\"Images\" AND media_usage:\"CC0\"");
        let response = self
            .client
            .get(format!("{}/openaccess/api/v1.0/search", self.base_url))
            .query(&[
                ("api_key", key.as_str()),
                ("q", &q),
                ("rows", &limit.to_string()),
                ("start", &offset.to_string()),
            ])
            .send()
            .await?;
        ensure_success(response.status())?;
        let envelope: SearchEnvelope = response.json().await?;
        Ok(envelope
            .response
            .map(|body| {
                body.rows
                    .into_iter()
                    .filter_map(Self::normalize)
                    .collect()
            })
            .unwrap_or_default())
    }
}
