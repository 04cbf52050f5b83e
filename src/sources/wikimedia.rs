//! Wikimedia Commons file search via the MediaWiki API.
//!
//! Results come back as an unordered page map; entries are sorted by page
//! id so the same query always yields the same sequence.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::{ensure_success, ArtSource, SourceError};
use crate::models::{ArtSourceId, Artwork};

const DEFAULT_BASE: &str = "https://commons.wikimedia.org";

pub struct WikimediaSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    query: Option<QueryBody>,
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    pageid: u64,
    #[serde(default)]
    title: String,
    imageinfo: Option<Vec<ImageInfo>>,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    url: Option<String>,
    thumburl: Option<String>,
    extmetadata: Option<HashMap<String, MetaValue>>,
}

#[derive(Debug, Deserialize)]
struct MetaValue {
    value: Option<serde_json::Value>,
}

impl WikimediaSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn meta_text(meta: Option<&HashMap<String, MetaValue>>, key: &str) -> String {
        let raw = meta
            .and_then(|m| m.get(key))
            .and_then(|v| v.value.as_ref())
            .and_then(|v| v.as_str())
            .unwrap_or("");
        strip_html(raw)
    }

    fn normalize(page: Page) -> Option<Artwork> {
        let info = page.imageinfo?.into_iter().next()?;
        let image_url = info.url.filter(|u| !u.is_empty())?;
        let meta = info.extmetadata.as_ref();
        let artist = Self::meta_text(meta, "Artist");
        let date = Self::meta_text(meta, "DateTimeOriginal");

        // "File:The Great Wave off Kanagawa.jpg" -> "The Great Wave off Kanagawa"
        let title = page
            .title
            .trim_start_matches("File:")
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or(page.title.clone());

        Some(Artwork {
            id: ArtSourceId::Wikimedia.artwork_id(page.pageid),
            title,
            artist,
            date,
            thumbnail_url: info.thumburl.unwrap_or_else(|| image_url.clone()),
            image_url,
            source: ArtSourceId::Wikimedia,
            score: None,
            department: None,
        })
    }
}

/// Commons metadata values embed markup; reduce to plain text.
fn strip_html(value: &str) -> String {
    lazy_static::lazy_static! {
        static ref TAGS: regex::Regex = regex::Regex::new(r"<[^>]*>").unwrap();
    }
    TAGS.replace_all(value, "").trim().to_string()
}

#[async_trait]
impl ArtSource for WikimediaSource {
    fn id(&self) -> ArtSourceId {
        ArtSourceId::Wikimedia
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Artwork>, SourceError> {
        let search = format!("{query} painting");
        let response = self
            .client
            .get(format!("{}/w/api.php", self.base_url))
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("generator", "search"),
                ("gsrsearch", &search),
                ("gsrnamespace", "6"),
                ("gsrlimit", &limit.to_string()),
                ("gsroffset", &offset.to_string()),
                ("prop", "imageinfo"),
                ("iiprop", "url|extmetadata"),
                ("iiurlwidth", "800"),
            ])
            .send()
            .await?;
        ensure_success(response.status())?;
        let parsed: ApiResponse = response.json().await?;

        let mut pages: Vec<Page> = parsed
            .query
            .map(|q| q.pages.into_values().collect())
            .unwrap_or_default();
        pages.sort_by_key(|p| p.pageid);
        Ok(pages.into_iter().filter_map(Self::normalize).collect())
    }
}
