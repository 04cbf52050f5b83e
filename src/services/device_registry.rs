//! Device telemetry ingestion.
//!
//! Each status post is folded into the device record by a pure function so
//! the derivation rules (charging detection, sessions, operation costs,
//! brownouts, OTA events) are testable without I/O. Posts for the same
//! device serialize on a per-device lock; histories therefore reflect a
//! total order.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::notify::Notifier;
use crate::error::AppError;
use crate::models::{
    voltage_to_percent, BatterySample, BatterySession, BrownoutEvent, ChargingSource,
    DeviceRecord, OperationKind, OperationSample, OtaEvent, SignalSample, StatusReport,
    MAX_BATTERY_HISTORY, MAX_BATTERY_SESSIONS, MAX_BROWNOUT_HISTORY, MAX_OPERATION_SAMPLES,
    MAX_OTA_HISTORY, MAX_SIGNAL_HISTORY,
};
use crate::store::{entity, JsonStore};

/// A voltage rise larger than this implies the charger is connected.
const CHARGE_RISE_VOLTS: f32 = 0.15;
/// Flat-trend threshold for overriding a device's charging claim.
const TREND_FLAT_VOLTS: f32 = 0.01;
/// Trend override needs this many prior samples.
const TREND_SAMPLES: usize = 5;

/// Low-battery notification thresholds, in percent.
const LOW_BATTERY_THRESHOLDS: [f32; 2] = [30.0, 15.0];

/// Side effects derived from one status post.
#[derive(Debug, PartialEq)]
pub(crate) enum DeviceEvent {
    ChargeStarted,
    SessionOpened,
    OtaSuccess { from: String, to: String },
    OtaFailed,
    Brownout { count: u32 },
    LowBattery { threshold: f32, percent: f32 },
}

type DeviceMap = HashMap<String, DeviceRecord>;

pub struct DeviceRegistry {
    store: Arc<JsonStore>,
    notifier: Arc<Notifier>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<JsonStore>, notifier: Arc<Notifier>) -> Self {
        Self {
            store,
            notifier,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn device_lock(&self, device_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Fold a status post into the device record and persist it.
    pub async fn ingest(&self, report: StatusReport) -> Result<DeviceRecord, AppError> {
        let lock = self.device_lock(&report.device_id).await;
        let _guard = lock.lock().await;

        let devices: DeviceMap = self.store.read_or_default(entity::DEVICES).await?;
        let prev = devices.get(&report.device_id).cloned();
        let (record, events) = apply_status(prev, &report, Utc::now());

        let persisted = record.clone();
        self.store
            .update(entity::DEVICES, move |map: &mut DeviceMap| {
                map.insert(persisted.device_id.clone(), persisted.clone());
            })
            .await?;

        for event in &events {
            match event {
                DeviceEvent::ChargeStarted => {
                    tracing::info!(device_id = %record.device_id, "Device started charging");
                }
                DeviceEvent::SessionOpened => {
                    tracing::info!(device_id = %record.device_id, "Battery session opened");
                }
                DeviceEvent::OtaSuccess { from, to } => {
                    tracing::info!(device_id = %record.device_id, from = %from, to = %to, "Firmware updated");
                }
                DeviceEvent::OtaFailed => {
                    tracing::warn!(device_id = %record.device_id, "Device reported OTA failure");
                }
                DeviceEvent::Brownout { count } => {
                    tracing::warn!(device_id = %record.device_id, count = count, "Brownout detected");
                }
                DeviceEvent::LowBattery { threshold, percent } => {
                    // Fire-and-forget: the device response never waits on
                    // the webhook.
                    self.notifier
                        .low_battery(&record.device_id, *threshold, *percent);
                }
            }
        }

        Ok(record)
    }

    pub async fn get(&self, device_id: &str) -> Result<Option<DeviceRecord>, AppError> {
        let devices: DeviceMap = self.store.read_or_default(entity::DEVICES).await?;
        Ok(devices.get(device_id).cloned())
    }

    pub async fn list(&self) -> Result<Vec<DeviceRecord>, AppError> {
        let devices: DeviceMap = self.store.read_or_default(entity::DEVICES).await?;
        let mut list: Vec<DeviceRecord> = devices.into_values().collect();
        list.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(list)
    }
}

/// Battery analytics derived from a device record.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAnalytics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_drop_wake: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_drop_display: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_drop_ota: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_days_remaining: Option<f64>,
}

pub fn analytics(record: &DeviceRecord, now: DateTime<Utc>) -> DeviceAnalytics {
    let stats = &record.usage_stats;
    let avg = |total: f64, count: u64| {
        if count > 0 {
            Some(total / count as f64)
        } else {
            None
        }
    };

    // Discharge slope of the open session projects days until 3.3V.
    let estimated_days_remaining = record.current_session.as_ref().and_then(|session| {
        let voltage = record.voltage? as f64;
        let elapsed_days =
            now.signed_duration_since(session.started_at).num_seconds() as f64 / 86_400.0;
        if elapsed_days < 0.01 {
            return None;
        }
        let slope = (session.start_voltage as f64 - voltage) / elapsed_days;
        if slope <= 0.0 {
            return None;
        }
        Some(((voltage - 3.3) / slope).max(0.0))
    });

    DeviceAnalytics {
        avg_drop_wake: avg(stats.voltage_drop_wake, stats.total_wakes),
        avg_drop_display: avg(stats.voltage_drop_display, stats.total_display_updates),
        avg_drop_ota: avg(stats.voltage_drop_ota, stats.total_ota_updates),
        estimated_days_remaining,
    }
}

fn push_bounded<T>(items: &mut Vec<T>, item: T, cap: usize) {
    items.push(item);
    while items.len() > cap {
        items.remove(0);
    }
}

/// Pure fold of one status post into a device record.
pub(crate) fn apply_status(
    prev: Option<DeviceRecord>,
    report: &StatusReport,
    now: DateTime<Utc>,
) -> (DeviceRecord, Vec<DeviceEvent>) {
    let mut events = Vec::new();
    let mut record = prev.unwrap_or_else(|| DeviceRecord::new(&report.device_id, now));
    let status = &report.status;

    let prev_voltage = record.voltage;
    let prev_percent = record.percent;
    let prev_charging = record.is_charging;
    let prev_firmware = record.firmware_version.clone();
    let prev_status = record.last_status.clone();
    let prev_brownouts = record.brownout_count;

    record.last_seen = now;

    let voltage = status.battery_voltage;
    let percent = status
        .battery_percent
        .or_else(|| voltage.map(voltage_to_percent));

    // Charging: device report wins, then voltage-rise inference, then the
    // flat-trend override of an implausible device claim.
    let mut charging = prev_charging;
    let mut charging_source = record.charging_source;
    match status.is_charging {
        Some(reported) => {
            charging = reported;
            charging_source = ChargingSource::Esp32;
        }
        None => {
            if let (Some(prev_v), Some(v)) = (prev_voltage, voltage) {
                if v - prev_v > CHARGE_RISE_VOLTS {
                    charging = true;
                    charging_source = ChargingSource::VoltageRise;
                }
            }
        }
    }
    if status.is_charging == Some(true) {
        if let Some(v_now) = voltage {
            let recent: Vec<f32> = record
                .battery_history
                .iter()
                .rev()
                .take(TREND_SAMPLES)
                .map(|s| s.voltage)
                .collect();
            if recent.len() == TREND_SAMPLES {
                let oldest = recent[recent.len() - 1];
                let avg_delta = (v_now - oldest) / recent.len() as f32;
                if avg_delta <= TREND_FLAT_VOLTS {
                    charging = false;
                    charging_source = ChargingSource::TrendOverride;
                }
            }
        }
    }

    // Charging edges.
    if !prev_charging && charging {
        record.last_charge_timestamp = Some(now);
        events.push(DeviceEvent::ChargeStarted);
        if let Some(mut session) = record.current_session.take() {
            session.ended_at = Some(now);
            session.end_voltage = voltage.or(prev_voltage);
            session.end_percent = percent.or(prev_percent);
            push_bounded(&mut record.battery_sessions, session, MAX_BATTERY_SESSIONS);
        }
    } else if prev_charging && !charging {
        record.current_session = Some(BatterySession {
            started_at: now,
            ended_at: None,
            start_voltage: voltage.or(prev_voltage).unwrap_or(0.0),
            start_percent: percent.or(prev_percent).unwrap_or(0.0),
            end_voltage: None,
            end_percent: None,
            wakes: 0,
            display_updates: 0,
            ota_updates: 0,
        });
        events.push(DeviceEvent::SessionOpened);
    }

    // Histories. The trend check above reads the history *before* this
    // append; keep that ordering.
    if let Some(v) = voltage {
        let is_display_update = status
            .status
            .as_deref()
            .map(|s| s.starts_with("display"))
            .unwrap_or(false);
        push_bounded(
            &mut record.battery_history,
            BatterySample {
                timestamp: now,
                voltage: v,
                charging,
                is_display_update,
            },
            MAX_BATTERY_HISTORY,
        );
    }
    if let Some(rssi) = status.signal_strength {
        record.signal_strength = Some(rssi);
        push_bounded(
            &mut record.signal_history,
            SignalSample {
                timestamp: now,
                rssi,
            },
            MAX_SIGNAL_HISTORY,
        );
    }

    // Firmware changes count as successful OTA updates.
    if let Some(fw) = &status.firmware_version {
        if let Some(prev_fw) = &prev_firmware {
            if prev_fw != fw {
                push_bounded(
                    &mut record.ota_history,
                    OtaEvent {
                        timestamp: now,
                        from_version: prev_fw.clone(),
                        to_version: fw.clone(),
                        success: true,
                        error: None,
                    },
                    MAX_OTA_HISTORY,
                );
                record.usage_stats.total_ota_updates += 1;
                events.push(DeviceEvent::OtaSuccess {
                    from: prev_fw.clone(),
                    to: fw.clone(),
                });
            }
        }
        record.firmware_version = Some(fw.clone());
    }
    if status.status.as_deref() == Some("ota_failed")
        && prev_status.as_deref() != Some("ota_failed")
    {
        let version = record.firmware_version.clone().unwrap_or_default();
        push_bounded(
            &mut record.ota_history,
            OtaEvent {
                timestamp: now,
                from_version: version.clone(),
                to_version: version,
                success: false,
                error: Some("device reported ota_failed".into()),
            },
            MAX_OTA_HISTORY,
        );
        events.push(DeviceEvent::OtaFailed);
    }

    // Brownout counter is monotonic on the device; an increase means new
    // brownouts since the last post.
    if let Some(count) = status.brownout_count {
        if count > prev_brownouts {
            let (displays, wakes) = record
                .current_session
                .as_ref()
                .map(|s| (s.display_updates, s.wakes))
                .unwrap_or((0, 0));
            push_bounded(
                &mut record.brownout_history,
                BrownoutEvent {
                    timestamp: now,
                    count,
                    display_updates_in_session: displays,
                    wakes_in_session: wakes,
                },
                MAX_BROWNOUT_HISTORY,
            );
            events.push(DeviceEvent::Brownout { count });
        }
        record.brownout_count = count;
    }

    // Operation cost attribution: only on a discharge step.
    if !charging {
        if let (Some(prev_v), Some(v)) = (prev_voltage, voltage) {
            if v < prev_v {
                let kind = classify_operation(status.status.as_deref());
                let drop = prev_v - v;
                push_bounded(
                    &mut record.operation_samples,
                    OperationSample {
                        timestamp: now,
                        kind,
                        voltage_before: prev_v,
                        voltage_after: v,
                        drop,
                        firmware_version: record.firmware_version.clone(),
                        rssi: status.signal_strength,
                    },
                    MAX_OPERATION_SAMPLES,
                );
                let stats = &mut record.usage_stats;
                match kind {
                    OperationKind::Wake => {
                        stats.total_wakes += 1;
                        stats.voltage_drop_wake += drop as f64;
                    }
                    OperationKind::Display => {
                        stats.total_display_updates += 1;
                        stats.voltage_drop_display += drop as f64;
                    }
                    OperationKind::Ota => {
                        stats.voltage_drop_ota += drop as f64;
                    }
                }
                if let Some(session) = &mut record.current_session {
                    match kind {
                        OperationKind::Wake => session.wakes += 1,
                        OperationKind::Display => session.display_updates += 1,
                        OperationKind::Ota => session.ota_updates += 1,
                    }
                }
            }
        }
    }

    // Low-battery threshold crossings, downward only.
    if !charging {
        if let (Some(prev_p), Some(p)) = (prev_percent, percent) {
            for threshold in LOW_BATTERY_THRESHOLDS {
                if prev_p > threshold && p <= threshold {
                    events.push(DeviceEvent::LowBattery {
                        threshold,
                        percent: p,
                    });
                }
            }
        }
    }

    if let Some(v) = voltage {
        record.voltage = Some(v);
    }
    if let Some(p) = percent {
        record.percent = Some(p);
    }
    record.is_charging = charging;
    record.charging_source = charging_source;
    record.last_status = status.status.clone();

    (record, events)
}

fn classify_operation(status: Option<&str>) -> OperationKind {
    match status {
        Some(s) if s.starts_with("display") => OperationKind::Display,
        Some(s) if s.starts_with("ota") => OperationKind::Ota,
        _ => OperationKind::Wake,
    }
}
