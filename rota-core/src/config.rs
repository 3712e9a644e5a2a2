//! Recognized configuration options and their defaults.

use serde::{Deserialize, Serialize};

use crate::optimizer::OptimizerSettings;
use crate::planner::{BreakRule, LunchRule, TimetableTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LunchConfig {
    pub earliest_start: String,
    pub latest_start: String,
    pub min_duration_min: u32,
    pub max_duration_min: u32,
    pub min_hours_before_shift_start: f64,
}

impl Default for LunchConfig {
    fn default() -> Self {
        Self {
            earliest_start: "11:00".to_string(),
            latest_start: "14:00".to_string(),
            min_duration_min: 30,
            max_duration_min: 60,
            min_hours_before_shift_start: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortBreakConfig {
    pub duration_min: u32,
    pub frequency_hours: f64,
    pub spacing_min: u32,
    pub max_delay_min: u32,
    pub max_consecutive_work_hours: f64,
}

impl Default for ShortBreakConfig {
    fn default() -> Self {
        Self {
            duration_min: 15,
            frequency_hours: 2.0,
            spacing_min: 90,
            max_delay_min: 30,
            max_consecutive_work_hours: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    pub min_hours: f64,
    pub max_hours: f64,
    pub min_rest_hours: f64,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            min_hours: 4.0,
            max_hours: 12.0,
            min_rest_hours: 11.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub cache_ttl_employee_sec: u64,
    pub cache_ttl_rules_sec: u64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_employee_sec: 14_400,
            cache_ttl_rules_sec: 86_400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub realtime_period_sec: u64,
    pub realtime_period_under_load_sec: u64,
    pub batch_period_sec: u64,
    pub cooldown_sec: u64,
    pub queue_capacity: usize,
    pub batch_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            realtime_period_sec: 5,
            realtime_period_under_load_sec: 2,
            batch_period_sec: 1_800,
            cooldown_sec: 3_600,
            queue_capacity: 1_000,
            batch_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdLevels {
    pub warning: f64,
    pub critical: f64,
    pub emergency: f64,
}

impl Default for ThresholdLevels {
    fn default() -> Self {
        Self {
            warning: 75.0,
            critical: 65.0,
            emergency: 55.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfigSection {
    pub service_level: ThresholdLevels,
    pub abandonment_rate: ThresholdLevels,
}

impl Default for ThresholdConfigSection {
    fn default() -> Self {
        Self {
            service_level: ThresholdLevels::default(),
            abandonment_rate: ThresholdLevels {
                warning: 5.0,
                critical: 10.0,
                emergency: 15.0,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub primary_skill_load_pct: f64,
    pub target_utilization: f64,
    pub development_reserve_pct: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            primary_skill_load_pct: 70.0,
            target_utilization: 0.85,
            development_reserve_pct: 20.0,
        }
    }
}

impl OptimizerConfig {
    pub fn settings(&self) -> OptimizerSettings {
        OptimizerSettings {
            primary_load_fraction: self.primary_skill_load_pct / 100.0,
            target_utilization_cap: self.target_utilization,
            development_reserve_fraction: self.development_reserve_pct / 100.0,
        }
    }
}

/// The whole recognized option set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WfmConfig {
    pub lunch: LunchConfig,
    pub short_break: ShortBreakConfig,
    pub shift: ShiftConfig,
    pub compliance: ComplianceConfig,
    pub monitor: MonitorConfig,
    pub threshold: ThresholdConfigSection,
    pub optimizer: OptimizerConfig,
}

impl WfmConfig {
    /// Build the planner template the configuration describes.
    pub fn template(&self, code: impl Into<String>) -> anyhow::Result<TimetableTemplate> {
        let lunch = LunchRule {
            earliest_start: crate::time::parse_hm(&self.lunch.earliest_start)?,
            latest_start: crate::time::parse_hm(&self.lunch.latest_start)?,
            min_duration_min: self.lunch.min_duration_min,
            max_duration_min: self.lunch.max_duration_min,
            min_hours_before: self.lunch.min_hours_before_shift_start,
        };
        let breaks = BreakRule {
            duration_min: self.short_break.duration_min,
            frequency_hours: self.short_break.frequency_hours,
            spacing_min: self.short_break.spacing_min,
            max_delay_min: self.short_break.max_delay_min,
            max_consecutive_work_hours: self.short_break.max_consecutive_work_hours,
        };
        Ok(TimetableTemplate {
            code: code.into(),
            lunch,
            breaks,
            ..TimetableTemplate::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recognized_options() {
        let cfg = WfmConfig::default();
        assert_eq!(cfg.lunch.min_duration_min, 30);
        assert_eq!(cfg.short_break.spacing_min, 90);
        assert_eq!(cfg.shift.min_rest_hours, 11.0);
        assert_eq!(cfg.compliance.cache_ttl_employee_sec, 14_400);
        assert_eq!(cfg.monitor.queue_capacity, 1_000);
        assert_eq!(cfg.threshold.service_level.critical, 65.0);
        assert_eq!(cfg.threshold.abandonment_rate.emergency, 15.0);
        assert_eq!(cfg.optimizer.primary_skill_load_pct, 70.0);
    }

    #[test]
    fn template_reflects_lunch_window() {
        let mut cfg = WfmConfig::default();
        cfg.lunch.earliest_start = "12:00".to_string();
        let template = cfg.template("tuned").unwrap();
        assert_eq!(template.code, "tuned");
        assert_eq!(
            template.lunch.earliest_start,
            chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap()
        );
    }

    #[test]
    fn optimizer_settings_convert_percentages() {
        let settings = WfmConfig::default().optimizer.settings();
        assert!((settings.primary_load_fraction - 0.7).abs() < 1e-9);
        assert!((settings.development_reserve_fraction - 0.2).abs() < 1e-9);
    }
}
