//! Live-operations inputs: interval forecasts, queue snapshots, agent
//! activity and metric threshold configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WfmError, WfmResult};

/// Forecast demand for one service at one interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInterval {
    pub service_id: String,
    pub start: DateTime<Utc>,
    pub required_agents: f64,
    /// Percentage; 80 means 80% of calls answered within target.
    pub service_level_target: f64,
    pub avg_handle_time_sec: f64,
}

impl ForecastInterval {
    pub fn new(service_id: impl Into<String>, start: DateTime<Utc>, required_agents: f64) -> Self {
        Self {
            service_id: service_id.into(),
            start,
            required_agents,
            service_level_target: 80.0,
            avg_handle_time_sec: 300.0,
        }
    }
}

/// Point-in-time queue state for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub service_id: String,
    pub at: DateTime<Utc>,
    pub calls_waiting: u32,
    pub longest_wait_sec: u32,
    pub agents_available: u32,
    pub agents_busy: u32,
    /// Percentage.
    pub current_service_level: f64,
}

impl QueueSnapshot {
    pub fn agents_on_duty(&self) -> u32 {
        self.agents_available + self.agents_busy
    }
}

/// Aggregated agent phone-state for one 15-minute interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActivityInterval {
    pub agent_id: String,
    pub start: DateTime<Utc>,
    pub login_sec: u32,
    pub productive_sec: u32,
    pub break_sec: u32,
    pub group_id: String,
}

impl AgentActivityInterval {
    pub fn was_logged_in(&self) -> bool {
        self.login_sec > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDirection {
    /// Breach when the observed value falls below the level.
    Below,
    /// Breach when the observed value rises above the level.
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMetric {
    ServiceLevel,
    AbandonmentRate,
    QueueLength,
    WaitTime,
    Coverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachLevel {
    Warning,
    Critical,
    Emergency,
}

/// Warning/critical/emergency levels for one metric of one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub service_id: String,
    pub metric: ThresholdMetric,
    pub warning: f64,
    pub critical: f64,
    pub emergency: f64,
    pub direction: ThresholdDirection,
    pub auto_alert: bool,
}

impl ThresholdConfig {
    /// Default service-level thresholds: breach below 75/65/55.
    pub fn service_level_defaults(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            metric: ThresholdMetric::ServiceLevel,
            warning: 75.0,
            critical: 65.0,
            emergency: 55.0,
            direction: ThresholdDirection::Below,
            auto_alert: true,
        }
    }

    /// Default abandonment thresholds: breach above 5/10/15.
    pub fn abandonment_defaults(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            metric: ThresholdMetric::AbandonmentRate,
            warning: 5.0,
            critical: 10.0,
            emergency: 15.0,
            direction: ThresholdDirection::Above,
            auto_alert: true,
        }
    }

    pub fn validate(&self) -> WfmResult<()> {
        let ordered = match self.direction {
            ThresholdDirection::Below => {
                self.warning >= self.critical && self.critical >= self.emergency
            }
            ThresholdDirection::Above => {
                self.warning <= self.critical && self.critical <= self.emergency
            }
        };
        if !ordered {
            return Err(WfmError::Validation(format!(
                "threshold levels for {:?}/{} are not monotonic",
                self.metric, self.service_id
            )));
        }
        Ok(())
    }

    /// Highest level the observed value breaches, if any.
    pub fn breach_level(&self, observed: f64) -> Option<BreachLevel> {
        let breached = |level: f64| match self.direction {
            ThresholdDirection::Below => observed < level,
            ThresholdDirection::Above => observed > level,
        };
        if breached(self.emergency) {
            Some(BreachLevel::Emergency)
        } else if breached(self.critical) {
            Some(BreachLevel::Critical)
        } else if breached(self.warning) {
            Some(BreachLevel::Warning)
        } else {
            None
        }
    }
}
