//! Cleveland Museum of Art open access API.

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://openaccess-api.clevelandart.org";

pub struct ClevelandSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ClevelandWork>,
}

#[derive(Debug, Deserialize)]
struct ClevelandWork {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    creators: Vec<Creator>,
    creation_date: Option<String>,
    #[serde(rename = "type")]
    work_type: Option<String>,
    department: Option<String>,
    images: Option<Images>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Images {
    web: Option<ImageRef>,
    print: Option<ImageRef>,
}

#[derive(Debug, Deserialize)]
struct ImageRef {
    url: Option<String>,
}

impl ClevelandSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch(
        &self,
        query: &str,
        limit: usize,
        skip: usize,
    ) -> Result<Vec<Artwork>, SourceError> {
        let response = self
            .client
            .get(format!("{}/api/artworks/", self.base_url))
            .query(&[
                ("q", query),
                ("limit", &limit.to_string()),
                ("skip", &skip.to_string()),
                ("has_image", "1"),
                ("cc0", "1"),
            ])
            .send()
            .await?;
        ensure_success(response.status())?;
        let page: SearchResponse = response.json().await?;
        Ok(page.data.into_iter().filter_map(Self::normalize).collect())
    }

    fn normalize(work: ClevelandWork) -> Option<Artwork> {
        if !super::is_painting(work.work_type.as_deref()) {
            return None;
        }
        let images = work.images?;
        let web = images.web.and_then(|i| i.url)?;
        let print = images.print.and_then(|i| i.url);
        Some(Artwork {
            id: ArtSourceId::Cleveland.artwork_id(work.id),
            title: work.title,
            artist: work
                .creators
                .first()
                .map(|c| c.description.clone())
                .unwrap_or_default(),
            date: work.creation_date.unwrap_or_default(),
            image_url: print.unwrap_or_else(|| web.clone()),
            thumbnail_url: web,
            source: ArtSourceId::Cleveland,
            score: None,
            department: work.department,
        })
    }
}

#[async_trait]
impl ArtSource for ClevelandSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Cleveland
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
        self.fetch(query, limit, offset).await
    }

    async fn random(&self) -> Result<Artwork, SourceError> {
        let skip = rand::thread_rng().gen_range(0..500);
        let mut works = self.fetch("painting", 20, skip).await?;
        if works.is_empty() {
            works = self.fetch("painting", 20, 0).await?;
        }
        if works.is_empty() {
            return Err(SourceError::Shape("no random candidates".into()));
        }
        let pick = rand::thread_rng().gen_range(0..works.len());
        Ok(works.swap_remove(pick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(work_type: &str, web: Option<&str>, print: Option<&str>) -> ClevelandWork {
        ClevelandWork {
            id: 94979,
            title: "Twilight in the Wilderness".into(),
            creators: vec![Creator {
                description: "Frederic Edwin Church (American, 1826-1900)".into(),
            }],
            creation_date: Some("1860".into()),
            work_type: Some(work_type.into()),
            department: Some("American Painting and Sculpture".into()),
            images: Some(Images {
                web: web.map(|u| ImageRef {
                    url: Some(u.into()),
                }),
                print: print.map(|u| ImageRef {
                    url: Some(u.into()),
                }),
            }),
        }
    }

    #[test]
    fn test_normalize_prefers_print_resolution() {
        let art = ClevelandSource::normalize(work(
            "Painting",
            Some("https://img/web.jpg"),
            Some("https://img/print.jpg"),
        ))
        .unwrap();
        assert_eq!(art.id, "cleveland-94979");
        assert_eq!(art.image_url, "https://img/print.jpg");
        assert_eq!(art.thumbnail_url, "https://img/web.jpg");
    }

    #[test]
    fn test_normalize_falls_back_to_web() {
        let art =
            ClevelandSource::normalize(work("Painting", Some("https://img/web.jpg"), None))
                .unwrap();
        assert_eq!(art.image_url, "https://img/web.jpg");
    }

    #[test]
    fn test_normalize_requires_image() {
        assert!(ClevelandSource::normalize(work("Painting", None, None)).is_none());
    }

    #[test]
    fn test_normalize_filters_type() {
        assert!(
            ClevelandSource::normalize(work("Drawing", Some("https://img/web.jpg"), None))
                .is_none()
        );
    }
}
