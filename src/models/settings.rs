use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Operator settings (singleton entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Settings {
    /// Default deep-sleep duration in microseconds.
    pub default_sleep_duration_us: u64,
    pub dev_mode: bool,
    /// Host the device should talk to while in dev mode.
    pub dev_server_host: Option<String>,
    pub default_orientation: Orientation,
    pub night_sleep_enabled: bool,
    /// Local hour (0-23) the night window opens. May be later than the
    /// end hour: the window then wraps past midnight.
    pub night_sleep_start_hour: u32,
    pub night_sleep_end_hour: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_sleep_duration_us: 3_600_000_000, // 1 hour
            dev_mode: false,
            dev_server_host: None,
            default_orientation: Orientation::Portrait,
            night_sleep_enabled: false,
            night_sleep_start_hour: 22,
            night_sleep_end_hour: 6,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.night_sleep_start_hour > 23 || self.night_sleep_end_hour > 23 {
            return Err(AppError::BadInput(
                "night sleep hours must be between 0 and 23".into(),
            ));
        }
        if self.default_sleep_duration_us < 60_000_000 {
            return Err(AppError::BadInput(
                "default sleep duration must be at least one minute".into(),
            ));
        }
        Ok(())
    }

    /// The sleep duration to hand a device polling at local time `now`.
    ///
    /// Inside the night window the device is told to sleep straight through
    /// to the window's end rather than wake on the normal cadence.
    pub fn sleep_duration_at(&self, now: NaiveDateTime) -> u64 {
        if !self.night_sleep_enabled {
            return self.default_sleep_duration_us;
        }
        if in_hour_window(
            now.hour(),
            self.night_sleep_start_hour,
            self.night_sleep_end_hour,
        ) {
            micros_until_hour(now, self.night_sleep_end_hour)
        } else {
            self.default_sleep_duration_us
        }
    }
}

/// Whether `hour` falls in `[start, end)`, wrapping past midnight when
/// `start > end`. A zero-length window never matches.
pub fn in_hour_window(hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        false
    } else if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// Microseconds from `now` until the next occurrence of `hour:00`.
/// Returns 0 for an out-of-range hour rather than guessing.
pub fn micros_until_hour(now: NaiveDateTime, hour: u32) -> u64 {
    let Some(today_target) = now.date().and_hms_opt(hour, 0, 0) else {
        return 0;
    };
    let target = if today_target > now {
        today_target
    } else {
        today_target + chrono::Duration::days(1)
    };
    target
        .signed_duration_since(now)
        .num_microseconds()
        .unwrap_or(0)
        .max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_window_simple() {
        assert!(in_hour_window(2, 1, 6));
        assert!(in_hour_window(1, 1, 6));
        assert!(!in_hour_window(6, 1, 6));
        assert!(!in_hour_window(12, 1, 6));
    }

    #[test]
    fn test_window_wraps_midnight() {
        // 22:00 -> 06:00
        for hour in [22, 23, 0, 1, 2, 3, 4, 5] {
            assert!(in_hour_window(hour, 22, 6), "hour {hour} should be inside");
        }
        for hour in [6, 7, 12, 21] {
            assert!(!in_hour_window(hour, 22, 6), "hour {hour} should be outside");
        }
    }

    #[test]
    fn test_zero_length_window_is_empty() {
        assert!(!in_hour_window(5, 5, 5));
    }

    #[test]
    fn test_micros_until_hour_same_day() {
        // 23:00 -> 06:00 next day = 7h
        assert_eq!(micros_until_hour(at(23, 0), 6), 7 * 3600 * 1_000_000);
        // 02:30 -> 06:00 = 3.5h
        assert_eq!(
            micros_until_hour(at(2, 30), 6),
            (3 * 3600 + 1800) * 1_000_000
        );
    }

    #[test]
    fn test_night_sleep_overrides_default() {
        let settings = Settings {
            night_sleep_enabled: true,
            night_sleep_start_hour: 22,
            night_sleep_end_hour: 6,
            ..Default::default()
        };
        // At 23:00 the device sleeps until 06:00.
        assert_eq!(
            settings.sleep_duration_at(at(23, 0)),
            7 * 3600 * 1_000_000
        );
        // At noon the normal cadence applies.
        assert_eq!(
            settings.sleep_duration_at(at(12, 0)),
            settings.default_sleep_duration_us
        );
    }

    #[test]
    fn test_night_sleep_disabled() {
        let settings = Settings::default();
        assert_eq!(
            settings.sleep_duration_at(at(23, 0)),
            settings.default_sleep_duration_us
        );
    }

    #[test]
    fn test_validate_hours() {
        let mut settings = Settings::default();
        settings.night_sleep_start_hour = 24;
        assert!(settings.validate().is_err());
    }
}
