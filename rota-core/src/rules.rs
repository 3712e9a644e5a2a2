//! Labor-rule catalog and its numeric matrix.
//!
//! The rule set is fixed and versioned in configuration: rules are a tagged
//! variant, not a DSL. The matrix caches per-age-category thresholds so the
//! batch path evaluates without branching on employee category.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::employee::AgeCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    DailyHours,
    WeeklyHours,
    RestBetween,
    BreakQuota,
    Lunch,
    ConsecutiveDays,
}

impl RuleKind {
    /// Fixed evaluation order; violation lists are deterministic.
    pub const ORDERED: [RuleKind; 6] = [
        RuleKind::DailyHours,
        RuleKind::WeeklyHours,
        RuleKind::RestBetween,
        RuleKind::BreakQuota,
        RuleKind::Lunch,
        RuleKind::ConsecutiveDays,
    ];

    pub fn category(self) -> RuleCategory {
        match self {
            RuleKind::DailyHours => RuleCategory::WorkingTime,
            RuleKind::WeeklyHours => RuleCategory::Overtime,
            RuleKind::RestBetween => RuleCategory::RestPeriods,
            RuleKind::BreakQuota => RuleCategory::Breaks,
            RuleKind::Lunch => RuleCategory::Breaks,
            RuleKind::ConsecutiveDays => RuleCategory::RestPeriods,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    WorkingTime,
    Breaks,
    Overtime,
    RestPeriods,
    SpecialConditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyTier {
    Warning,
    Fine,
    Serious,
}

impl PenaltyTier {
    /// Compliance-score penalty weight.
    pub fn weight(self) -> f64 {
        match self {
            PenaltyTier::Warning => 0.1,
            PenaltyTier::Fine => 0.2,
            PenaltyTier::Serious => 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub kind: RuleKind,
    pub category: RuleCategory,
    pub penalty: PenaltyTier,
    pub enabled: bool,
}

/// Numeric thresholds for one age category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub daily_hours_std: f64,
    pub daily_hours_max: f64,
    pub weekly_hours_std: f64,
    pub weekly_hours_max: f64,
    pub min_rest_hours: f64,
    /// Minimum break minutes per two worked hours.
    pub break_min_per_2h: f64,
    pub lunch_min_minutes: f64,
    pub lunch_max_minutes: f64,
    pub lunch_min_hours_into_shift: f64,
    pub lunch_latest_start: NaiveTime,
    /// Hours at or above which a lunch becomes mandatory.
    pub lunch_required_above_hours: f64,
    pub max_consecutive_days: u32,
}

/// Branch-free threshold lookup keyed by age category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatrix {
    adult: ThresholdRow,
    minor: ThresholdRow,
}

impl RuleMatrix {
    pub fn row(&self, cat: AgeCategory) -> &ThresholdRow {
        match cat {
            AgeCategory::Adult => &self.adult,
            AgeCategory::Minor => &self.minor,
        }
    }
}

impl Default for RuleMatrix {
    fn default() -> Self {
        let adult = ThresholdRow {
            daily_hours_std: 8.0,
            daily_hours_max: 12.0,
            weekly_hours_std: 40.0,
            weekly_hours_max: 48.0,
            min_rest_hours: 11.0,
            break_min_per_2h: 15.0,
            lunch_min_minutes: 30.0,
            lunch_max_minutes: 60.0,
            lunch_min_hours_into_shift: 2.0,
            lunch_latest_start: NaiveTime::from_hms_opt(14, 0, 0).expect("valid time"),
            lunch_required_above_hours: 6.0,
            max_consecutive_days: 6,
        };
        let minor = ThresholdRow {
            daily_hours_std: 7.0,
            daily_hours_max: 7.0,
            weekly_hours_std: 35.0,
            weekly_hours_max: 35.0,
            ..adult
        };
        Self { adult, minor }
    }
}

/// The loaded rule set plus its matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCatalog {
    pub rules: Vec<Rule>,
    pub matrix: RuleMatrix,
    pub version: String,
    pub loaded_at: DateTime<Utc>,
}

impl RuleCatalog {
    /// Canonical minimum implementable rule set.
    pub fn builtin(now: DateTime<Utc>) -> Self {
        let rule = |kind: RuleKind, penalty: PenaltyTier| Rule {
            kind,
            category: kind.category(),
            penalty,
            enabled: true,
        };
        Self {
            rules: vec![
                rule(RuleKind::DailyHours, PenaltyTier::Fine),
                rule(RuleKind::WeeklyHours, PenaltyTier::Fine),
                rule(RuleKind::RestBetween, PenaltyTier::Serious),
                rule(RuleKind::BreakQuota, PenaltyTier::Warning),
                rule(RuleKind::Lunch, PenaltyTier::Warning),
                rule(RuleKind::ConsecutiveDays, PenaltyTier::Serious),
            ],
            matrix: RuleMatrix::default(),
            version: "builtin-1".to_string(),
            loaded_at: now,
        }
    }

    pub fn rule(&self, kind: RuleKind) -> Option<&Rule> {
        self.rules.iter().find(|r| r.kind == kind && r.enabled)
    }
}

/// Shared catalog handle with TTL-based refresh.
///
/// The catalog itself is immutable once loaded; a refresh atomically swaps
/// the pointer. Readers never block each other.
pub struct SharedCatalog {
    inner: RwLock<Arc<RuleCatalog>>,
    ttl: Duration,
}

impl SharedCatalog {
    pub fn new(catalog: RuleCatalog, ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Arc::new(catalog)),
            ttl,
        }
    }

    pub fn get(&self) -> Arc<RuleCatalog> {
        self.inner.read().clone()
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.inner.read().loaded_at >= self.ttl
    }

    /// Atomically replace the loaded catalog.
    pub fn swap(&self, catalog: RuleCatalog) {
        *self.inner.write() = Arc::new(catalog);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    #[test]
    fn builtin_catalog_has_all_kinds_in_order() {
        let cat = RuleCatalog::builtin(now());
        let kinds: Vec<RuleKind> = cat.rules.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, RuleKind::ORDERED.to_vec());
        assert_eq!(cat.rule(RuleKind::RestBetween).unwrap().penalty, PenaltyTier::Serious);
    }

    #[test]
    fn matrix_rows_differ_by_age_category() {
        let m = RuleMatrix::default();
        assert_eq!(m.row(AgeCategory::Adult).daily_hours_std, 8.0);
        assert_eq!(m.row(AgeCategory::Minor).daily_hours_std, 7.0);
        assert_eq!(m.row(AgeCategory::Minor).weekly_hours_max, 35.0);
        // Shared thresholds come from the adult row.
        assert_eq!(m.row(AgeCategory::Minor).min_rest_hours, 11.0);
    }

    #[test]
    fn shared_catalog_ttl_and_swap() {
        let shared = SharedCatalog::new(RuleCatalog::builtin(now()), Duration::hours(24));
        assert!(!shared.is_stale(now() + Duration::hours(23)));
        assert!(shared.is_stale(now() + Duration::hours(24)));

        let mut fresh = RuleCatalog::builtin(now() + Duration::hours(25));
        fresh.version = "builtin-2".to_string();
        shared.swap(fresh);
        assert_eq!(shared.get().version, "builtin-2");
        assert!(!shared.is_stale(now() + Duration::hours(25)));
    }

    #[test]
    fn penalty_weights_match_scoring_model() {
        assert_eq!(PenaltyTier::Warning.weight(), 0.1);
        assert_eq!(PenaltyTier::Fine.weight(), 0.2);
        assert_eq!(PenaltyTier::Serious.weight(), 0.4);
    }
}
