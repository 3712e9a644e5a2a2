//! Shift contracts produced upstream; source of truth for the planner.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WfmError, WfmResult};
use crate::interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    Confirmed,
    Published,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub status: ShiftStatus,
}

impl Shift {
    pub fn new(
        id: impl Into<String>,
        employee_id: impl Into<String>,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Self {
        Self {
            id: id.into(),
            employee_id: employee_id.into(),
            date,
            start,
            end,
            status: ShiftStatus::Scheduled,
        }
    }

    pub fn with_status(mut self, status: ShiftStatus) -> Self {
        self.status = status;
        self
    }

    pub fn start_dt(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date.and_time(self.start))
    }

    /// End instant; an end at or before the start crosses midnight into the
    /// next calendar day.
    pub fn end_dt(&self) -> DateTime<Utc> {
        let mut end = Utc.from_utc_datetime(&self.date.and_time(self.end));
        if end <= self.start_dt() {
            end += Duration::days(1);
        }
        end
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration_hours(&self) -> f64 {
        (self.end_dt() - self.start_dt()).num_minutes() as f64 / 60.0
    }

    pub fn interval_count(&self) -> usize {
        interval::interval_count(self.start_dt(), self.end_dt())
    }

    pub fn validate(&self) -> WfmResult<()> {
        if self.id.trim().is_empty() || self.employee_id.trim().is_empty() {
            return Err(WfmError::Validation("shift ids must be non-empty".into()));
        }
        if self.start.signed_duration_since(NaiveTime::MIN).num_minutes() % 15 != 0
            || self.end.signed_duration_since(NaiveTime::MIN).num_minutes() % 15 != 0
        {
            return Err(WfmError::Validation(format!(
                "shift {} boundaries must align to 15-minute marks",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn day_shift_duration_and_intervals() {
        let s = Shift::new("s1", "emp_1", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), hm(9, 0), hm(17, 30));
        assert!(!s.crosses_midnight());
        assert!((s.duration_hours() - 8.5).abs() < f64::EPSILON);
        assert_eq!(s.interval_count(), 34);
    }

    #[test]
    fn night_shift_extends_into_next_day() {
        let s = Shift::new("s2", "emp_1", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), hm(22, 0), hm(6, 0));
        assert!(s.crosses_midnight());
        assert_eq!(s.end_dt().date_naive(), NaiveDate::from_ymd_opt(2026, 3, 3).unwrap());
        assert!((s.duration_hours() - 8.0).abs() < f64::EPSILON);
        assert_eq!(s.interval_count(), 32);
    }

    #[test]
    fn validate_rejects_unaligned_boundaries() {
        let s = Shift::new("s3", "emp_1", NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), hm(9, 10), hm(17, 0));
        assert!(s.validate().is_err());
    }
}
