//! Metropolitan Museum of Art open access API.
//!
//! Search is two-phase: a search call returns bare object ids, each object
//! is then fetched individually. Object fetches for one page run
//! concurrently.

use async_trait::async_trait;
use futures_util::future::join_all;
use rand::seq::SliceRandom;
use serde::Deserialize;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://collectionapi.metmuseum.org";

pub struct MetSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(rename = "objectIDs")]
    object_ids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct MetObject {
    #[serde(rename = "objectID")]
    object_id: u64,
    #[serde(default)]
    title: String,
    #[serde(rename = "artistDisplayName", default)]
    artist_display_name: String,
    #[serde(rename = "objectDate", default)]
    object_date: String,
    #[serde(rename = "primaryImage", default)]
    primary_image: String,
    #[serde(rename = "primaryImageSmall", default)]
    primary_image_small: String,
    #[serde(default)]
    department: String,
    #[serde(default)]
    classification: String,
    #[serde(rename = "isPublicDomain", default)]
    is_public_domain: bool,
}

impl MetSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn search_ids(&self, query: &str) -> Result<Vec<u64>, SourceError> {
        let response = self
            .client
            .get(format!("{}/public/collection/v1/search", self.base_url))
            .query(&[("hasImages", "true"), ("q", query)])
            .send()
            .await?;
        ensure_success(response.status())?;
        let page: SearchPage = response.json().await?;
        Ok(page.object_ids.unwrap_or_default())
    }

    async fn fetch_object(&self, id: u64) -> Option<Artwork> {
        let url = format!("{}/public/collection/v1/objects/{id}", self.base_url);
        let response = self.client.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let object: MetObject = response.json().await.ok()?;
        self.normalize(object)
    }

    fn normalize(&self, object: MetObject) -> Option<Artwork> {
        if !object.is_public_domain || object.primary_image.is_empty() {
            return None;
        }
        let class = if object.classification.is_empty() {
            &object.department
        } else {
            &object.classification
        };
        if !super::is_painting(Some(class)) {
            return None;
        }
        let thumbnail = if object.primary_image_small.is_empty() {
            object.primary_image.clone()
        } else {
            object.primary_image_small
        };
        Some(Artwork {
            id: ArtSourceId::Met.artwork_id(object.object_id),
            title: object.title,
            artist: object.artist_display_name,
            date: object.object_date,
            image_url: object.primary_image,
            thumbnail_url: thumbnail,
            source: ArtSourceId::Met,
            score: None,
            department: Some(object.department),
        })
    }
}

#[async_trait]
impl ArtSource for MetSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Met
    }

    fn supports_random(&self) -> bool {
        true
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Artwork>, SourceError> {
        let ids = self.search_ids(query).await?;
        // Over-fetch: filtering drops non-paintings and rights-restricted
        // objects after the detail call.
        let window: Vec<u64> = ids.into_iter().skip(offset).take(limit * 2).collect();
        let objects = join_all(window.iter().map(|&id| self.fetch_object(id))).await;
        Ok(objects.into_iter().flatten().take(limit).collect())
    }

    async fn random(&self) -> Result<Artwork, SourceError> {
        let ids = self.search_ids("painting").await?;
        let picks: Vec<u64> = {
            let mut rng = rand::thread_rng();
            ids.choose_multiple(&mut rng, 10).copied().collect()
        };
        for id in picks {
            if let Some(art) = self.fetch_object(id).await {
                return Ok(art);
            }
        }
        Err(SourceError::Shape("no usable random object".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(classification: &str, public: bool, image: &str) -> MetObject {
        MetObject {
            object_id: 1,
            title: "T".into(),
            artist_display_name: "A".into(),
            object_date: "1890".into(),
            primary_image: image.into(),
            primary_image_small: String::new(),
            department: "European Paintings".into(),
            classification: classification.into(),
            is_public_domain: public,
        }
    }

    #[test]
    fn test_normalize_keeps_public_paintings() {
        let source = MetSource::new(reqwest::Client::new());
        let art = source
            .normalize(object("Paintings", true, "https://img/x.jpg"))
            .unwrap();
        assert_eq!(art.id, "met-1");
        assert_eq!(art.thumbnail_url, "https://img/x.jpg");
    }

    #[test]
    fn test_normalize_drops_non_public() {
        let source = MetSource::new(reqwest::Client::new());
        assert!(source
            .normalize(object("Paintings", false, "https://img/x.jpg"))
            .is_none());
    }

    #[test]
    fn test_normalize_drops_missing_image() {
        let source = MetSource::new(reqwest::Client::new());
        assert!(source.normalize(object("Paintings", true, "")).is_none());
    }

    #[test]
    fn test_normalize_drops_non_paintings() {
        let source = MetSource::new(reqwest::Client::new());
        assert!(source
            .normalize(object("Photographs", true, "https://img/x.jpg"))
            .is_none());
    }
}
