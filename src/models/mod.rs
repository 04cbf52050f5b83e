mod artwork;
mod command;
mod device;
mod image;
mod playlist;
mod settings;

pub use artwork::{ArtSourceId, Artwork};
pub use command::{CommandKind, CommandRequest, QueuedCommand, MAX_QUEUED_COMMANDS};
pub use device::{
    voltage_to_percent, BatterySample, BatterySession, BrownoutEvent, ChargingSource,
    DeviceRecord, DeviceStatus, OperationKind, OperationSample, OtaEvent, SignalSample,
    StatusReport, UsageStats, MAX_BATTERY_HISTORY, MAX_BATTERY_SESSIONS, MAX_BROWNOUT_HISTORY,
    MAX_OPERATION_SAMPLES, MAX_OTA_HISTORY, MAX_SIGNAL_HISTORY,
};
pub use image::{
    ArchiveEntry, CurrentImage, HistoryEntry, Rotation, MAX_ARCHIVE_ENTRIES, PANEL_HEIGHT,
    PANEL_WIDTH,
};
pub use playlist::{Playlist, PlaylistMode, MIN_PLAYLIST_INTERVAL_US};
pub use settings::{in_hour_window, micros_until_hour, Orientation, Settings};
