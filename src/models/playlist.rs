use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playlists may not rotate faster than every 5 minutes.
pub const MIN_PLAYLIST_INTERVAL_US: u64 = 300_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistMode {
    Sequential,
    Random,
}

/// The singleton playlist entity. Advancement is lazy: the device's next
/// `current.json` poll after the interval elapses performs the swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub active: bool,
    pub mode: PlaylistMode,
    /// Rotation interval in microseconds.
    pub interval_us: u64,
    pub images: Vec<Uuid>,
    pub current_index: usize,
    pub last_update: DateTime<Utc>,
}

impl Default for Playlist {
    fn default() -> Self {
        Self {
            active: false,
            mode: PlaylistMode::Sequential,
            interval_us: 3_600_000_000, // 1 hour
            images: Vec::new(),
            current_index: 0,
            last_update: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

impl Playlist {
    /// Whether an advance is due. The comparison is milliseconds elapsed
    /// against `interval_us / 1000`, matching what deployed firmware
    /// expects; keep it that way.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        if !self.active || self.images.is_empty() {
            return false;
        }
        let elapsed_ms = now.signed_duration_since(self.last_update).num_milliseconds();
        elapsed_ms >= 0 && elapsed_ms as u64 >= self.interval_us / 1000
    }
}
