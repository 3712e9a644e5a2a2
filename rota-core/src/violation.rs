//! Violations and alerts: severity model, coalescing keys and remediation
//! suggestion templates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rules::{PenaltyTier, RuleKind};

/// Alert severity derived from violation magnitude. Ordered so that
/// `Critical` sorts highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Map |observed - threshold| / threshold to a severity band.
pub fn severity_from_magnitude(observed: f64, threshold: f64) -> Severity {
    let magnitude = if threshold.abs() > f64::EPSILON {
        (observed - threshold).abs() / threshold.abs()
    } else {
        (observed - threshold).abs()
    };

    if magnitude >= 1.0 {
        Severity::Critical
    } else if magnitude >= 0.5 {
        Severity::High
    } else if magnitude >= 0.25 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub id: Uuid,
    pub employee_id: String,
    pub rule: RuleKind,
    pub occurred_on: NaiveDate,
    pub detected_at: DateTime<Utc>,
    pub observed: f64,
    pub required: f64,
    pub penalty: PenaltyTier,
    pub severity: Severity,
    pub description: String,
    pub remediation: Vec<String>,
}

impl Violation {
    pub fn new(
        employee_id: impl Into<String>,
        rule: RuleKind,
        occurred_on: NaiveDate,
        detected_at: DateTime<Utc>,
        observed: f64,
        required: f64,
        penalty: PenaltyTier,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: employee_id.into(),
            rule,
            occurred_on,
            detected_at,
            observed,
            required,
            penalty,
            severity: severity_from_magnitude(observed, required),
            description: description.into(),
            remediation: remediation_suggestions(rule, observed, required),
        }
    }
}

/// Filled remediation templates per rule kind.
pub fn remediation_suggestions(rule: RuleKind, observed: f64, required: f64) -> Vec<String> {
    let excess = observed - required;
    match rule {
        RuleKind::DailyHours => vec![
            format!("Reduce the shift by {:.1} hours to return under the daily cap", excess),
            "Split the excess across other days of the week".to_string(),
            "Confirm overtime authorization before publishing the schedule".to_string(),
        ],
        RuleKind::BreakQuota => vec![
            format!("Schedule {:.0} more minutes of short breaks", required - observed),
            "Rebalance workload so breaks fit between peak intervals".to_string(),
        ],
        RuleKind::WeeklyHours => vec![
            format!("Redistribute {:.1} weekly hours to other employees", excess),
            "Defer non-urgent shifts to the following week".to_string(),
            "Consider temporary staff for the excess workload".to_string(),
        ],
        RuleKind::RestBetween => vec![
            format!("Delay the next shift start by {:.1} hours", required - observed),
            "Swap the next shift with another employee".to_string(),
        ],
        RuleKind::Lunch => vec![
            "Insert a 30-60 minute lunch between the second hour and 14:00".to_string(),
        ],
        RuleKind::ConsecutiveDays => vec![
            "Insert a mandatory rest day before continuing the run".to_string(),
            "Rotate the assignment with another employee".to_string(),
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Queued,
    Sent,
    Acknowledged,
}

/// Alerts with the same key within the cooldown window are duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoalescingKey {
    pub employee_id: String,
    pub rule: RuleKind,
    pub shift_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub employee_id: String,
    pub violation_ids: Vec<Uuid>,
    pub rule: RuleKind,
    pub severity: Severity,
    pub shift_date: NaiveDate,
    pub detected_at: DateTime<Utc>,
    pub description: String,
    pub observed_value: f64,
    pub threshold_value: f64,
    pub department_id: String,
    /// Manager ids the alert is routed to.
    pub recipients: Vec<String>,
    pub remediation: Vec<String>,
    pub status: AlertStatus,
}

impl Alert {
    pub fn from_violation(violation: &Violation, department_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_id: violation.employee_id.clone(),
            violation_ids: vec![violation.id],
            rule: violation.rule,
            severity: violation.severity,
            shift_date: violation.occurred_on,
            detected_at: violation.detected_at,
            description: violation.description.clone(),
            observed_value: violation.observed,
            threshold_value: violation.required,
            department_id: department_id.into(),
            recipients: Vec::new(),
            remediation: violation.remediation.clone(),
            status: AlertStatus::Queued,
        }
    }

    pub fn key(&self) -> CoalescingKey {
        CoalescingKey {
            employee_id: self.employee_id.clone(),
            rule: self.rule,
            shift_date: self.shift_date,
        }
    }
}
