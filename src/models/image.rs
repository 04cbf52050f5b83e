use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Native panel resolution in portrait orientation.
pub const PANEL_WIDTH: u32 = 1200;
pub const PANEL_HEIGHT: u32 = 1600;

/// Archive and history are evicted together past this many entries.
pub const MAX_ARCHIVE_ENTRIES: usize = 100;

/// Panel rotation. The pixel buffer is stored already rotated; this is
/// advisory metadata echoed back to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Target buffer dimensions for this rotation: portrait for 0/180,
    /// landscape for 90/270.
    pub fn target_dimensions(&self) -> (u32, u32) {
        match self {
            Rotation::Deg0 | Rotation::Deg180 => (PANEL_WIDTH, PANEL_HEIGHT),
            Rotation::Deg90 | Rotation::Deg270 => (PANEL_HEIGHT, PANEL_WIDTH),
        }
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::Deg0
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {other}")),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

/// The singleton "now showing" record. The raw pixel buffer lives beside it
/// as the `current.bin` blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentImage {
    pub image_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub rotation: Rotation,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
    /// Microseconds the device should deep-sleep after this cycle.
    pub sleep_duration: u64,
    #[serde(default)]
    pub ai_generated: bool,
}

/// One archived image. Pixel buffer, original source bytes and thumbnail
/// are blobs keyed by `image_id`; this row is the index entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub image_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// URL the image was imported from, when known. Part of the playlist
    /// dedup fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub rotation: Rotation,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ai_generated: bool,
    /// Whether the original (pre-pipeline) bytes were retained for
    /// re-quantization with different parameters.
    #[serde(default)]
    pub has_original: bool,
}

impl ArchiveEntry {
    /// Dedup key for playlist membership: source URL when present, else
    /// title|artist.
    pub fn fingerprint(&self) -> String {
        match &self.source_url {
            Some(url) if !url.is_empty() => url.to_lowercase(),
            _ => format!(
                "{}|{}",
                self.title.to_lowercase(),
                self.artist.as_deref().unwrap_or("").to_lowercase()
            ),
        }
    }
}

/// History row mirroring an archive entry. The thumbnail PNG is a blob;
/// the listing endpoint inlines it as a data URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub image_id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ai_generated: bool,
}
