use std::time::{Duration, SystemTime};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Nanoseconds relative to the unix epoch, negative for earlier times.
fn unix_nanos(st: &SystemTime) -> i128 {
    match st.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(err) => -(err.duration().as_nanos() as i128),
    }
}

/// Converts float seconds relative to the unix epoch back to a time.
pub fn timestamp_to_datetime(ts: f64) -> Option<SystemTime> {
    if !ts.is_finite() {
        return None;
    }
    let offset = Duration::try_from_secs_f64(ts.abs()).ok()?;
    if ts < 0.0 {
        SystemTime::UNIX_EPOCH.checked_sub(offset)
    } else {
        SystemTime::UNIX_EPOCH.checked_add(offset)
    }
}

pub fn to_rfc3339(st: &SystemTime) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(unix_nanos(st))
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default()
}

/// Serde adapter for times as (possibly fractional, possibly negative)
/// seconds since the unix epoch.
pub mod ts_seconds_float {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::*;

    const NANOS_PER_SEC: i128 = 1_000_000_000;

    pub fn serialize<S: Serializer>(st: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = unix_nanos(st);
        if nanos % NANOS_PER_SEC == 0 {
            if let Ok(secs) = i64::try_from(nanos / NANOS_PER_SEC) {
                return serializer.serialize_i64(secs);
            }
        }
        serializer.serialize_f64(nanos as f64 / NANOS_PER_SEC as f64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let ts = f64::deserialize(d)?;
        timestamp_to_datetime(ts)
            .ok_or_else(|| de::Error::custom(format_args!("invalid timestamp: {}", ts)))
    }
}
