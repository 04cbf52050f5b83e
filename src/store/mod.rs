//! Persistence layer: per-entity atomic JSON documents plus binary blobs.

mod json_store;

pub use json_store::{JsonStore, StoreError};

/// Logical entity names. Each maps to one JSON document under the data
/// directory.
pub mod entity {
    pub const CURRENT: &str = "current";
    pub const IMAGES: &str = "images";
    pub const HISTORY: &str = "history";
    pub const DEVICES: &str = "devices";
    pub const COMMANDS: &str = "commands";
    pub const PLAYLIST: &str = "playlist";
    pub const SETTINGS: &str = "settings";
    pub const FORCE_OTA: &str = "force-ota";
    pub const FIRMWARE_INFO: &str = "firmware-info";
    pub const SERIAL_STREAMS: &str = "serial-streams";
}
