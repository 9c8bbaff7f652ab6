// Calendar-aligned batch windowing
use super::series::Frame;
use super::time_range::{DAY_MS, TimeRange};
use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;

pub const BATCH_DURATION_MS: i64 = DAY_MS;

/// Start of the UTC day containing `now_ms`. Batch ids are counted from here.
pub fn day_anchor(now_ms: i64) -> i64 {
    DateTime::<Utc>::from_timestamp_millis(now_ms)
        .and_then(|t| t.date_naive().and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
        .unwrap_or_else(|| now_ms - now_ms.rem_euclid(DAY_MS))
}

pub fn batch_id(timestamp: i64, anchor: i64) -> i64 {
    (timestamp - anchor).div_euclid(BATCH_DURATION_MS)
}

pub fn batch_range(id: i64, anchor: i64) -> TimeRange {
    TimeRange {
        from: anchor + id * BATCH_DURATION_MS,
        to: anchor + (id + 1) * BATCH_DURATION_MS,
    }
}

/// Inclusive ids of every batch touched by `[from, to]`. Callers pass `to >= from`.
pub fn ids_covering(from: i64, to: i64, anchor: i64) -> RangeInclusive<i64> {
    batch_id(from, anchor)..=batch_id(to, anchor)
}

/// A loaded (or failed) batch held by the cache.
#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_id: i64,
    pub range: TimeRange,
    pub frames: Vec<Frame>,
    pub error: Option<String>,
}

impl Batch {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The next window the loader should fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRequest {
    pub batch_id: i64,
    pub range: TimeRange,
}
