pub mod command_queue;
pub mod current_image;
pub mod device_registry;
pub mod firmware;
pub mod metrics;
pub mod notify;
pub mod search;
pub mod search_cache;

pub use command_queue::CommandQueue;
pub use current_image::{CurrentImageService, NewImage};
pub use device_registry::{analytics, DeviceAnalytics, DeviceRegistry};
pub use firmware::{FirmwareManifest, FirmwareService};
pub use notify::Notifier;
pub use search::{SearchFederator, SearchResponse, SourceInfo, SourceOutcome, SourceStatus};
pub use search_cache::SearchCache;
