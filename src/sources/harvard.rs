//! Harvard Art Museums API. Requires an API key.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://api.harvardartmuseums.org";

pub struct HarvardSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    records: Vec<HarvardRecord>,
}

#[derive(Debug, Deserialize)]
struct HarvardRecord {
    id: u64,
    #[serde(default)]
    title: String,
    people: Option<Vec<Person>>,
    dated: Option<String>,
    primaryimageurl: Option<String>,
    division: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(default)]
    name: String,
}

impl HarvardSource {
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

    fn normalize(record: HarvardRecord) -> Option<Artwork> {
        let image_url = record.primaryimageurl.filter(|u| !u.is_empty())?;
        Some(Artwork {
            id: ArtSourceId::Harvard.artwork_id(record.id),
            title: record.title,
            artist: record
                .people
                .as_ref()
                .and_then(|p| p.first())
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            date: record.dated.unwrap_or_default(),
            // IDS serves resized derivatives via a width parameter.
            thumbnail_url: format!("{image_url}?width=400"),
            image_url,
            source: ArtSourceId::Harvard,
            score: None,
            department: record.division,
        })
    }
}

#[async_trait]
impl ArtSource for HarvardSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Harvard
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
        let page = offset / limit.max(1) + 1;
        let response = self
            .client
            .get(format!("{}/object", self.base_url))
            .query(&[
                ("apikey", key.as_str()),
                ("q", query),
                ("size", &limit.to_string()),
                ("page", &page.to_string()),
                ("classification", "Paintings"),
                ("hasimage", "1"),
            ])
            .send()
            .await?;
        ensure_success(response.status())?;
        let parsed: SearchResponse = response.json().await?;
        Ok(parsed
            .records
            .into_iter()
            .filter_map(Self::normalize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let art = HarvardSource::normalize(HarvardRecord {
            id: 299843,
            title: "Self-Portrait".into(),
            people: Some(vec![Person {
                name: "Vincent van Gogh".into(),
            }]),
            dated: Some("1887".into()),
            primaryimageurl: Some("https://ids.lib.harvard.edu/ids/view/47174896".into()),
            division: Some("European and American Art".into()),
        })
        .unwrap();
        assert_eq!(art.id, "harvard-299843");
        assert_eq!(art.artist, "Vincent van Gogh");
        assert!(art.thumbnail_url.ends_with("?width=400"));
    }

    #[test]
    fn test_normalize_requires_image() {
        assert!(HarvardSource::normalize(HarvardRecord {
            id: 1,
            title: "T".into(),
            people: None,
            dated: None,
            primaryimageurl: Some(String::new()),
            division: None,
        })
        .is_none());
    }

    #[test]
    fn test_disabled_without_key() {
        assert!(!HarvardSource::new(reqwest::Client::new(), None).enabled());
    }
}
