//! Victoria and Albert Museum API.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://api.vam.ac.uk";

pub struct VamSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    records: Vec<VamRecord>,
}

#[derive(Debug, Deserialize)]
struct VamRecord {
    #[serde(rename = "systemNumber")]
    system_number: String,
    #[serde(rename = "_primaryTitle", default)]
    title: String,
    #[serde(rename = "_primaryMaker")]
    maker: Option<VamMaker>,
    #[serde(rename = "_primaryDate", default)]
    date: String,
    #[serde(rename = "objectType")]
    object_type: Option<String>,
    #[serde(rename = "_images")]
    images: Option<VamImages>,
}

#[derive(Debug, Deserialize)]
struct VamMaker {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct VamImages {
    #[serde(rename = "_primary_thumbnail")]
    primary_thumbnail: Option<String>,
    #[serde(rename = "_iiif_image_base_url")]
    iiif_base: Option<String>,
}

impl VamSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn normalize(record: VamRecord) -> Option<Artwork> {
        if !super::is_painting(record.object_type.as_deref()) {
            return None;
        }
        let images = record.images?;
        let iiif = images.iiif_base?;
        let image_url = format!("{}full/768,/0/default.jpg", iiif);
        Some(Artwork {
            id: ArtSourceId::Vam.artwork_id(&record.system_number),
            title: record.title,
            artist: record.maker.map(|m| m.name).unwrap_or_default(),
            date: record.date,
            thumbnail_url: images.primary_thumbnail.unwrap_or_else(|| image_url.clone()),
            image_url,
            source: ArtSourceId::Vam,
            score: None,
            department: record.object_type,
        })
    }
}

#[async_trait]
impl ArtSource for VamSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Vam
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Artwork>, SourceError> {
        let page = offset / limit.max(1) + 1;
        let response = self
            .client
            .get(format!("{}/v2/objects/search", self.base_url))
            .query(&[
                ("q", query),
                ("page_size", &limit.to_string()),
                ("page", &page.to_string()),
                ("images_exist", "true"),
                ("kw_object_type", "painting"),
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

    fn record(object_type: &str, iiif: Option<&str>) -> VamRecord {
        VamRecord {
            system_number: "O18949".into(),
            title: "The Day Dream".into(),
            maker: Some(VamMaker {
                name: "Dante Gabriel Rossetti".into(),
            }),
            date: "1880".into(),
            object_type: Some(object_type.into()),
            images: Some(VamImages {
                primary_thumbnail: Some("https://img/thumb.jpg".into()),
                iiif_base: iiif.map(String::from),
            }),
        }
    }

    #[test]
    fn test_normalize_builds_iiif_url() {
        let art =
            VamSource::normalize(record("Painting", Some("https://framemark.vam.ac.uk/x/")))
                .unwrap();
        assert_eq!(art.id, "vam-O18949");
        assert_eq!(
            art.image_url,
            "https://framemark.vam.ac.uk/x/full/768,/0/default.jpg"
        );
        assert_eq!(art.thumbnail_url, "https://img/thumb.jpg");
    }

    #[test]
    fn test_normalize_requires_iiif_base() {
        assert!(VamSource::normalize(record("Painting", None)).is_none());
    }

    #[test]
    fn test_normalize_filters_object_type() {
        assert!(VamSource::normalize(record("Sculpture", Some("https://x/"))).is_none());
    }
}
