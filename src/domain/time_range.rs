// Time range domain model and context presets
use super::error::{SeekerError, SeekerResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Smallest width a context or timeline window may shrink to.
pub const MIN_RANGE_WIDTH_MS: i64 = 1;

/// Instants are kept within `±2^52` ms (about 142,000 years) so the sum of two
/// instants never overflows and round trips through `f64` stay exact.
pub const MAX_TIMESTAMP_MS: i64 = 1 << 52;

/// Widest context window: one leap year, i.e. at most 367 daily batches.
pub const MAX_CONTEXT_WIDTH_MS: i64 = 366 * DAY_MS;

/// Named context durations offered by the window picker.
pub const CONTEXT_PRESETS: [&str; 5] = ["12h", "24h", "3d", "7d", "14d"];

/// Preset meaning "use the host's current range as the context window".
pub const MATCH_HOST_PRESET: &str = "0h";

/// Half-open `[from, to)` window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> SeekerResult<Self> {
        if from >= to {
            return Err(SeekerError::InvalidRange { from, to });
        }
        if from < -MAX_TIMESTAMP_MS || to > MAX_TIMESTAMP_MS {
            return Err(SeekerError::OutOfBounds { from, to });
        }
        Ok(Self { from, to })
    }

    /// A range usable as a context window: valid and at most
    /// [`MAX_CONTEXT_WIDTH_MS`] wide.
    pub fn new_context(from: i64, to: i64) -> SeekerResult<Self> {
        let range = Self::new(from, to)?;
        if range.width() > MAX_CONTEXT_WIDTH_MS {
            return Err(SeekerError::RangeTooWide {
                width: range.width(),
                max: MAX_CONTEXT_WIDTH_MS,
            });
        }
        Ok(range)
    }

    pub fn width(&self) -> i64 {
        self.to.saturating_sub(self.from)
    }

    pub fn center(&self) -> i64 {
        self.from.saturating_add(self.width() / 2)
    }

    pub fn centered_on(center: i64, width: i64) -> Self {
        let width = width.clamp(MIN_RANGE_WIDTH_MS, 2 * MAX_TIMESTAMP_MS);
        let from = center.saturating_sub(width / 2);
        Self {
            from,
            to: from.saturating_add(width),
        }
        .normalized()
    }

    pub fn shifted(&self, delta: i64) -> Self {
        Self {
            from: self.from.saturating_add(delta),
            to: self.to.saturating_add(delta),
        }
    }

    /// Pull both ends inside `±MAX_TIMESTAMP_MS` and widen to at least
    /// [`MIN_RANGE_WIDTH_MS`].
    pub fn normalized(&self) -> Self {
        let from = self
            .from
            .clamp(-MAX_TIMESTAMP_MS, MAX_TIMESTAMP_MS - MIN_RANGE_WIDTH_MS);
        let to = self.to.clamp(from + MIN_RANGE_WIDTH_MS, MAX_TIMESTAMP_MS);
        Self { from, to }
    }

    /// Shrink around the center to at most `max_width`.
    pub fn limited_to(&self, max_width: i64) -> Self {
        if self.width() <= max_width {
            *self
        } else {
            Self::centered_on(self.center(), max_width)
        }
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        other.from >= self.from && other.to <= self.to
    }

    pub fn contains_instant(&self, t: i64) -> bool {
        t >= self.from && t < self.to
    }

    /// Scale the width by `factor` keeping the center fixed.
    pub fn scaled(&self, factor: f64) -> Self {
        let center = (self.from as f64 + self.to as f64) / 2.0;
        let half = (self.width() as f64 * factor / 2.0).max(MIN_RANGE_WIDTH_MS as f64 / 2.0);
        Self::from_f64(center - half, center + half)
    }

    /// Scale the width by `factor` keeping `anchor` at the same relative position.
    pub fn scaled_around(&self, anchor: i64, factor: f64) -> Self {
        let anchor = anchor as f64;
        let from = anchor - (anchor - self.from as f64) * factor;
        let to = anchor + (self.to as f64 - anchor) * factor;
        Self::from_f64(from, to)
    }

    /// Move (and if necessary shrink) this range so it fits inside `outer`.
    pub fn clamped_within(&self, outer: &TimeRange) -> Self {
        if self.width() >= outer.width() {
            return *outer;
        }
        if self.from < outer.from {
            self.shifted(outer.from.saturating_sub(self.from))
        } else if self.to > outer.to {
            self.shifted(outer.to.saturating_sub(self.to))
        } else {
            *self
        }
    }

    /// Shift left so the range does not end after `limit`, keeping its width.
    pub fn ending_no_later_than(&self, limit: i64) -> Self {
        if self.to > limit {
            self.shifted(limit.saturating_sub(self.to))
        } else {
            *self
        }
    }

    fn from_f64(from: f64, to: f64) -> Self {
        let bound = MAX_TIMESTAMP_MS as f64;
        Self {
            from: from.round().clamp(-bound, bound) as i64,
            to: to.round().clamp(-bound, bound) as i64,
        }
        .normalized()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanDirection {
    Left,
    Right,
}

/// A relative context duration picked by name, e.g. `"3d"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextPreset {
    label: String,
    duration: Duration,
}

impl ContextPreset {
    /// Accepts only the offered labels: [`CONTEXT_PRESETS`] and [`MATCH_HOST_PRESET`].
    pub fn parse(label: &str) -> SeekerResult<Self> {
        let label = label.trim();
        if label != MATCH_HOST_PRESET && !CONTEXT_PRESETS.contains(&label) {
            return Err(SeekerError::InvalidDuration(label.to_string()));
        }
        let duration = parse_duration(label)?;
        Ok(Self {
            label: label.to_string(),
            duration,
        })
    }

    pub fn hours(hours: i64) -> Self {
        Self {
            label: format!("{hours}h"),
            duration: Duration::hours(hours),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration.num_milliseconds()
    }

    /// `0h` keeps the context window identical to the host range.
    pub fn matches_host(&self) -> bool {
        self.duration.is_zero()
    }
}

/// Parse `<amount><unit>` where unit is one of `ms`, `s`, `m`, `h`, `d`, `w`.
pub fn parse_duration(input: &str) -> SeekerResult<Duration> {
    let invalid = || SeekerError::InvalidDuration(input.to_string());
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (amount, unit) = input.split_at(split);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "ms" => Duration::try_milliseconds(amount),
        "s" => Duration::try_seconds(amount),
        "m" => Duration::try_minutes(amount),
        "h" => Duration::try_hours(amount),
        "d" => Duration::try_days(amount),
        "w" => Duration::try_weeks(amount),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12h").unwrap().num_milliseconds(), 12 * HOUR_MS);
        assert_eq!(parse_duration("3d").unwrap().num_milliseconds(), 3 * DAY_MS);
        assert_eq!(parse_duration("0h").unwrap().num_milliseconds(), 0);
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("12").is_err());
        assert!(parse_duration("12y").is_err());
        assert!(parse_duration("-1h").is_err());
    }

    #[test]
    fn test_presets_parse() {
        for label in CONTEXT_PRESETS {
            let preset = ContextPreset::parse(label).unwrap();
            assert!(preset.duration_ms() > 0);
            assert!(!preset.matches_host());
        }
        assert!(ContextPreset::parse(MATCH_HOST_PRESET).unwrap().matches_host());
    }

    #[test]
    fn test_presets_outside_the_offered_set_are_rejected() {
        for label in ["2000000w", "1ms", "5d", "48h"] {
            assert_eq!(
                ContextPreset::parse(label),
                Err(SeekerError::InvalidDuration(label.to_string()))
            );
        }
        assert_eq!(ContextPreset::parse(" 14d ").unwrap().label(), "14d");
    }

    #[test]
    fn test_new_rejects_out_of_bounds_and_too_wide_contexts() {
        let huge = 9_000_000_000_000_000_000_i64;
        assert_eq!(
            TimeRange::new(-huge, huge),
            Err(SeekerError::OutOfBounds { from: -huge, to: huge })
        );
        assert!(TimeRange::new_context(0, MAX_CONTEXT_WIDTH_MS).is_ok());
        assert_eq!(
            TimeRange::new_context(0, MAX_CONTEXT_WIDTH_MS + 1),
            Err(SeekerError::RangeTooWide {
                width: MAX_CONTEXT_WIDTH_MS + 1,
                max: MAX_CONTEXT_WIDTH_MS,
            })
        );
    }

    #[test]
    fn test_arithmetic_saturates_at_the_bounds() {
        let range = TimeRange { from: 0, to: DAY_MS };
        let huge = range.scaled(1e12);
        assert_eq!(huge, TimeRange { from: -MAX_TIMESTAMP_MS, to: MAX_TIMESTAMP_MS });
        assert_eq!(huge.width(), 2 * MAX_TIMESTAMP_MS);

        let extreme = TimeRange { from: i64::MIN, to: i64::MAX };
        assert_eq!(extreme.width(), i64::MAX);
        assert_eq!(extreme.normalized().width(), 2 * MAX_TIMESTAMP_MS);
        assert_eq!(extreme.shifted(i64::MAX).to, i64::MAX);
        assert!(range.scaled_around(i64::MAX, 1e9).width() >= MIN_RANGE_WIDTH_MS);

        let limited = huge.limited_to(MAX_CONTEXT_WIDTH_MS);
        assert_eq!(limited.width(), MAX_CONTEXT_WIDTH_MS);
        assert_eq!(limited.center(), 0);
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert_eq!(
            TimeRange::new(10, 10),
            Err(SeekerError::InvalidRange { from: 10, to: 10 })
        );
        assert!(TimeRange::new(10, 5).is_err());
        assert!(TimeRange::new(5, 10).is_ok());
    }

    #[test]
    fn test_scaled_keeps_center() {
        let range = TimeRange { from: 0, to: 10_000 };
        assert_eq!(range.scaled(0.5), TimeRange { from: 2_500, to: 7_500 });
        assert_eq!(range.scaled(0.5).scaled(2.0), range);
    }

    #[test]
    fn test_scaled_around_anchor() {
        let range = TimeRange { from: 0, to: 10_000 };
        let zoomed = range.scaled_around(2_000, 0.5);
        assert_eq!(zoomed, TimeRange { from: 1_000, to: 6_000 });
    }

    #[test]
    fn test_clamped_within() {
        let outer = TimeRange { from: 0, to: 100 };
        assert_eq!(TimeRange { from: -10, to: 10 }.clamped_within(&outer), TimeRange { from: 0, to: 20 });
        assert_eq!(TimeRange { from: 90, to: 110 }.clamped_within(&outer), TimeRange { from: 80, to: 100 });
        assert_eq!(TimeRange { from: -10, to: 200 }.clamped_within(&outer), outer);
        assert_eq!(TimeRange { from: 10, to: 20 }.clamped_within(&outer), TimeRange { from: 10, to: 20 });
    }
}
