//! The Hotline 8-byte date record.
//!
//! ```text
//! Year[2] Milliseconds[2] Seconds[4]
//! ```
//!
//! `Seconds` counts from 00:00:00 on January 1 of `Year`, local clock.

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// An instant in the wire date form
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotlineDate {
    /// Calendar year
    pub year: u16,
    /// Sub-second milliseconds
    pub milliseconds: u16,
    /// Seconds since January 1 of `year`
    pub seconds: u32,
}

impl HotlineDate {
    /// The current local time
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Local::now())
    }

    /// Convert a local datetime
    #[must_use]
    pub fn from_datetime(dt: DateTime<Local>) -> Self {
        let year_start = Local
            .with_ymd_and_hms(dt.year(), 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(dt);
        let seconds = (dt - year_start).num_seconds().max(0) as u32;

        Self {
            year: dt.year().clamp(0, i32::from(u16::MAX)) as u16,
            milliseconds: (dt.nanosecond() / 1_000_000) as u16,
            seconds,
        }
    }

    /// Convert a filesystem timestamp
    #[must_use]
    pub fn from_system_time(t: std::time::SystemTime) -> Self {
        Self::from_datetime(DateTime::<Local>::from(t))
    }

    /// Wire bytes
    #[must_use]
    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0..2].copy_from_slice(&self.year.to_be_bytes());
        out[2..4].copy_from_slice(&self.milliseconds.to_be_bytes());
        out[4..8].copy_from_slice(&self.seconds.to_be_bytes());
        out
    }

    /// Parse wire bytes
    #[must_use]
    pub fn from_bytes(b: [u8; 8]) -> Self {
        Self {
            year: u16::from_be_bytes([b[0], b[1]]),
            milliseconds: u16::from_be_bytes([b[2], b[3]]),
            seconds: u32::from_be_bytes([b[4], b[5], b[6], b[7]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let d = HotlineDate {
            year: 1999,
            milliseconds: 250,
            seconds: 86_400 * 31,
        };
        assert_eq!(HotlineDate::from_bytes(d.to_bytes()), d);
    }

    #[test]
    fn test_jan_first_midnight_is_zero_seconds() {
        let dt = Local.with_ymd_and_hms(2003, 1, 1, 0, 0, 0).unwrap();
        let d = HotlineDate::from_datetime(dt);
        assert_eq!(d.year, 2003);
        assert_eq!(d.seconds, 0);
    }

    #[test]
    fn test_seconds_count_from_year_start() {
        let dt = Local.with_ymd_and_hms(2003, 1, 2, 0, 0, 30).unwrap();
        let d = HotlineDate::from_datetime(dt);
        assert_eq!(d.seconds, 86_400 + 30);
    }

    #[test]
    fn test_now_is_sane() {
        let d = HotlineDate::now();
        assert!(d.year >= 2024);
        assert!(d.milliseconds < 1000);
    }
}
