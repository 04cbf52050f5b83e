use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// History caps. All device histories are bounded rings: the oldest entry
/// is evicted when a cap is reached.
pub const MAX_BATTERY_HISTORY: usize = 100;
pub const MAX_SIGNAL_HISTORY: usize = 100;
pub const MAX_OPERATION_SAMPLES: usize = 200;
pub const MAX_BROWNOUT_HISTORY: usize = 50;
pub const MAX_OTA_HISTORY: usize = 10;
pub const MAX_BATTERY_SESSIONS: usize = 20;

/// How the server decided a device is (or is not) charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChargingSource {
    /// The device reported its charge-IC state directly.
    Esp32,
    /// Inferred from a voltage rise above the prior report.
    VoltageRise,
    /// Device claimed charging but the voltage trend is flat; overridden.
    TrendOverride,
    None,
}

/// What kind of operation a voltage drop is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Wake,
    Display,
    Ota,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterySample {
    pub timestamp: DateTime<Utc>,
    pub voltage: f32,
    pub charging: bool,
    pub is_display_update: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSample {
    pub timestamp: DateTime<Utc>,
    pub rssi: i32,
}

/// One measured voltage drop attributed to a wake, display refresh or OTA.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSample {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub voltage_before: f32,
    pub voltage_after: f32,
    pub drop: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
}

/// A discharge interval: opened when the device comes off the charger,
/// closed when it next starts charging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatterySession {
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub start_voltage: f32,
    pub start_percent: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_voltage: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_percent: Option<f32>,
    #[serde(default)]
    pub wakes: u32,
    #[serde(default)]
    pub display_updates: u32,
    #[serde(default)]
    pub ota_updates: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrownoutEvent {
    pub timestamp: DateTime<Utc>,
    pub count: u32,
    pub display_updates_in_session: u32,
    pub wakes_in_session: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtaEvent {
    pub timestamp: DateTime<Utc>,
    pub from_version: String,
    pub to_version: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Cumulative counters since first contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStats {
    pub total_wakes: u64,
    pub total_display_updates: u64,
    pub total_ota_updates: u64,
    /// Summed voltage drop per operation class, for average-cost analytics.
    pub voltage_drop_wake: f64,
    pub voltage_drop_display: f64,
    pub voltage_drop_ota: f64,
}

/// Everything the server knows about one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    pub last_seen: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f32>,
    pub is_charging: bool,
    pub charging_source: ChargingSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_charge_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub battery_history: Vec<BatterySample>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_session: Option<BatterySession>,
    #[serde(default)]
    pub battery_sessions: Vec<BatterySession>,

    #[serde(default)]
    pub operation_samples: Vec<OperationSample>,

    #[serde(default)]
    pub brownout_count: u32,
    #[serde(default)]
    pub brownout_history: Vec<BrownoutEvent>,
    #[serde(default)]
    pub ota_history: Vec<OtaEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<i32>,
    #[serde(default)]
    pub signal_history: Vec<SignalSample>,

    #[serde(default)]
    pub usage_stats: UsageStats,
}

impl DeviceRecord {
    pub fn new(device_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.into(),
            firmware_version: None,
            last_seen: now,
            last_status: None,
            voltage: None,
            percent: None,
            is_charging: false,
            charging_source: ChargingSource::None,
            last_charge_timestamp: None,
            battery_history: Vec::new(),
            current_session: None,
            battery_sessions: Vec::new(),
            operation_samples: Vec::new(),
            brownout_count: 0,
            brownout_history: Vec::new(),
            ota_history: Vec::new(),
            signal_strength: None,
            signal_history: Vec::new(),
            usage_stats: UsageStats::default(),
        }
    }
}

/// Body of `POST /api/device-status`.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatusReport {
    pub device_id: String,
    pub status: DeviceStatus,
    /// Opaque firmware profiling payload, logged but not interpreted.
    #[serde(default)]
    pub profiling: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeviceStatus {
    #[serde(default)]
    pub battery_voltage: Option<f32>,
    #[serde(default)]
    pub battery_percent: Option<f32>,
    #[serde(default)]
    pub is_charging: Option<bool>,
    #[serde(default)]
    pub signal_strength: Option<i32>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    /// Free-form phase string (`display_updating`, `ota_started`, ...);
    /// classifies operation samples.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub brownout_count: Option<u32>,
}

/// Map battery voltage to percent along the LiPo discharge curve.
pub fn voltage_to_percent(voltage: f32) -> f32 {
    // Piecewise-linear (voltage, percent) anchors.
    const CURVE: [(f32, f32); 6] = [
        (3.0, 0.0),
        (3.3, 10.0),
        (3.5, 30.0),
        (3.7, 50.0),
        (4.0, 80.0),
        (4.2, 100.0),
    ];
    if voltage <= CURVE[0].0 {
        return 0.0;
    }
    if voltage >= CURVE[CURVE.len() - 1].0 {
        return 100.0;
    }
    for window in CURVE.windows(2) {
        let (v0, p0) = window[0];
        let (v1, p1) = window[1];
        if voltage <= v1 {
            return p0 + (voltage - v0) / (v1 - v0) * (p1 - p0);
        }
    }
    100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage_curve_anchors() {
        assert_eq!(voltage_to_percent(4.2), 100.0);
        assert_eq!(voltage_to_percent(4.0), 80.0);
        assert_eq!(voltage_to_percent(3.7), 50.0);
        assert_eq!(voltage_to_percent(3.5), 30.0);
        assert_eq!(voltage_to_percent(3.3), 10.0);
        assert_eq!(voltage_to_percent(3.0), 0.0);
    }

    #[test]
    fn test_voltage_curve_interpolates() {
        let p = voltage_to_percent(3.85);
        assert!((p - 65.0).abs() < 0.01, "3.85V should be ~65%, got {p}");
    }

    #[test]
    fn test_voltage_curve_clamps() {
        assert_eq!(voltage_to_percent(2.5), 0.0);
        assert_eq!(voltage_to_percent(4.4), 100.0);
    }

    #[test]
    fn test_status_report_rejects_unknown_fields() {
        let body = r#"{"deviceId":"d1","status":{},"bogus":1}"#;
        assert!(serde_json::from_str::<StatusReport>(body).is_err());
    }

    #[test]
    fn test_operation_sample_type_field_name() {
        let sample = OperationSample {
            timestamp: Utc::now(),
            kind: OperationKind::Display,
            voltage_before: 4.0,
            voltage_after: 3.95,
            drop: 0.05,
            firmware_version: None,
            rssi: None,
        };
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["type"], "display");
    }
}
