//! Timetable blocks: one 15-minute interval of one employee with a single
//! activity label. Mutable only through audited adjustments, which emit
//! [`BlockChange`] events for the violation monitor.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::INTERVAL_MINUTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Work,
    Lunch,
    ShortBreak,
    Project,
    Training,
    Meeting,
    Downtime,
    NotAvailable,
}

impl Activity {
    /// Counts toward worked hours.
    pub fn is_productive(self) -> bool {
        matches!(self, Activity::Work | Activity::Project | Activity::Training | Activity::Meeting)
    }

    pub fn is_break(self) -> bool {
        matches!(self, Activity::Lunch | Activity::ShortBreak)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableBlock {
    pub employee_id: String,
    /// Aligned interval start.
    pub start: DateTime<Utc>,
    pub activity: Activity,
    pub skill_id: Option<String>,
    pub project_id: Option<String>,
    pub locked: bool,
    pub template_code: String,
}

impl TimetableBlock {
    pub fn new(employee_id: impl Into<String>, start: DateTime<Utc>, activity: Activity) -> Self {
        Self {
            employee_id: employee_id.into(),
            start,
            activity,
            skill_id: None,
            project_id: None,
            locked: false,
            template_code: "default".to_string(),
        }
    }

    pub fn with_skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }

    pub fn with_template(mut self, code: impl Into<String>) -> Self {
        self.template_code = code.into();
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(INTERVAL_MINUTES)
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

/// Audited mutation of a block, consumed by the real-time monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockChange {
    pub employee_id: String,
    pub block_start: DateTime<Utc>,
    pub previous: Activity,
    pub current: Activity,
    pub changed_at: DateTime<Utc>,
}

/// Field-level update applied through the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockUpdate {
    pub activity: Option<Activity>,
    pub skill_id: Option<Option<String>>,
    pub project_id: Option<Option<String>>,
    pub locked: Option<bool>,
}
