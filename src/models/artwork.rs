use serde::{Deserialize, Serialize};
use std::fmt;

/// The museum sources the federated search knows about (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtSourceId {
    Met,
    Artic,
    Cleveland,
    Rijks,
    Wikimedia,
    Vam,
    Harvard,
    Smithsonian,
    Curated,
}

impl ArtSourceId {
    /// All sources, in the fixed fan-out/rank order.
    pub const ALL: [ArtSourceId; 9] = [
        ArtSourceId::Met,
        ArtSourceId::Artic,
        ArtSourceId::Cleveland,
        ArtSourceId::Rijks,
        ArtSourceId::Wikimedia,
        ArtSourceId::Vam,
        ArtSourceId::Harvard,
        ArtSourceId::Smithsonian,
        ArtSourceId::Curated,
    ];

    /// Stable id prefix (`met-123`, `artic-456`, ...).
    pub fn prefix(&self) -> &'static str {
        match self {
            ArtSourceId::Met => "met",
            ArtSourceId::Artic => "artic",
            ArtSourceId::Cleveland => "cleveland",
            ArtSourceId::Rijks => "rijks",
            ArtSourceId::Wikimedia => "wikimedia",
            ArtSourceId::Vam => "vam",
            ArtSourceId::Harvard => "harvard",
            ArtSourceId::Smithsonian => "smithsonian",
            ArtSourceId::Curated => "curated",
        }
    }

    /// Build the external artwork id from an upstream id.
    pub fn artwork_id(&self, upstream: impl fmt::Display) -> String {
        format!("{}-{}", self.prefix(), upstream)
    }
}

impl fmt::Display for ArtSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One artwork, normalized across sources.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    /// Source-prefixed stable id, e.g. `met-436535`.
    pub id: String,
    pub title: String,
    pub artist: String,
    pub date: String,
    pub image_url: String,
    pub thumbnail_url: String,
    pub source: ArtSourceId,
    /// Ranking score, set by the federator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Upstream department/classification, used for ranking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl Artwork {
    /// Dedup key: normalized image URL when present, else title|artist.
    pub fn fingerprint(&self) -> String {
        if !self.image_url.is_empty() {
            self.image_url.to_lowercase()
        } else {
            format!(
                "{}|{}",
                self.title.to_lowercase(),
                self.artist.to_lowercase()
            )
        }
    }
}
