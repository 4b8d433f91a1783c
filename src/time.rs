//! Browser timestamp normalization.
//!
//! Chromium stores microseconds since 1601-01-01 (the Windows FILETIME epoch),
//! Firefox stores microseconds since the Unix epoch and Safari stores seconds
//! since 2001-01-01 as a float. A stored zero means the browser never set the
//! value, so it maps to `None` rather than to the epoch itself.

use chrono::{DateTime, Utc};

/// Seconds between 1601-01-01 and 1970-01-01.
pub const CHROMIUM_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Seconds between 1970-01-01 and 2001-01-01.
pub const COCOA_EPOCH_OFFSET_SECS: i64 = 978_307_200;

pub fn chromium_to_utc(microseconds: Option<i64>) -> Option<DateTime<Utc>> {
    let microseconds = microseconds.filter(|v| *v != 0)?;
    let secs = microseconds.div_euclid(1_000_000) - CHROMIUM_EPOCH_OFFSET_SECS;
    let nsecs = (microseconds.rem_euclid(1_000_000) as u32) * 1000;
    DateTime::<Utc>::from_timestamp(secs, nsecs)
}

pub fn mozilla_to_utc(microseconds: Option<i64>) -> Option<DateTime<Utc>> {
    let microseconds = microseconds.filter(|v| *v != 0)?;
    let secs = microseconds.div_euclid(1_000_000);
    let nsecs = (microseconds.rem_euclid(1_000_000) as u32) * 1000;
    DateTime::<Utc>::from_timestamp(secs, nsecs)
}

pub fn cocoa_to_utc(seconds: Option<f64>) -> Option<DateTime<Utc>> {
    let seconds = seconds.filter(|v| *v != 0.0 && v.is_finite())?;
    let whole = seconds.floor();
    if whole.abs() > i64::MAX as f64 / 2.0 {
        return None;
    }
    let nsecs = ((seconds - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64 + COCOA_EPOCH_OFFSET_SECS, nsecs.min(999_999_999))
}

/// ISO-8601 rendering shared by every output format.
pub fn format_utc(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}
