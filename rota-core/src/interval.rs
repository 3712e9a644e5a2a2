//! 15-minute interval grid math.
//!
//! All scheduling, forecasting and coverage data is keyed to quarter-hour
//! slots aligned to clock minutes 00/15/30/45.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WfmError, WfmResult};

pub const INTERVAL_MINUTES: i64 = 15;
pub const INTERVAL_SECONDS: i64 = INTERVAL_MINUTES * 60;
pub const INTERVALS_PER_HOUR: usize = 4;

/// Round down to the containing interval boundary.
pub fn floor_to_interval(dt: DateTime<Utc>) -> DateTime<Utc> {
    let extra_min = (dt.minute() as i64) % INTERVAL_MINUTES;
    let extra = Duration::minutes(extra_min)
        + Duration::seconds(dt.second() as i64)
        + Duration::nanoseconds(dt.nanosecond() as i64);
    dt - extra
}

pub fn is_aligned(dt: DateTime<Utc>) -> bool {
    floor_to_interval(dt) == dt
}

/// Number of whole intervals covered by [start, end).
pub fn interval_count(start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
    if end <= start {
        return 0;
    }
    ((end - start).num_minutes() / INTERVAL_MINUTES) as usize
}

/// Aligned interval starts covering [start, end).
pub fn interval_grid(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut out = Vec::new();
    let mut cur = floor_to_interval(start);
    while cur < end {
        out.push(cur);
        cur += Duration::minutes(INTERVAL_MINUTES);
    }
    out
}

/// Convert a block count to hours.
pub fn blocks_to_hours(blocks: usize) -> f64 {
    blocks as f64 / INTERVALS_PER_HOUR as f64
}

/// Convert fractional hours to a block count, rounding down.
pub fn hours_to_blocks(hours: f64) -> usize {
    (hours * INTERVALS_PER_HOUR as f64).floor() as usize
}

/// Half-open UTC time range shared by read operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> WfmResult<Self> {
        if end < start {
            return Err(WfmError::Validation(format!(
                "date range is inverted: {start} > {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}
