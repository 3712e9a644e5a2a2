//! Coverage analysis: interval-by-interval join of forecast demand, planned
//! staffing and live queue state, with gap detection and cost impact.

use std::collections::BTreeMap;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interval::{self, INTERVAL_SECONDS};
use crate::telemetry::{
    AgentActivityInterval, BreachLevel, ForecastInterval, QueueSnapshot, ThresholdConfig,
    ThresholdMetric,
};
use crate::violation::Severity;

pub const DEFAULT_HOURLY_COST: f64 = 35.0;
pub const OVERTIME_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    Optimal,
    Adequate,
    Shortage,
    Surplus,
}

/// Status bands over coverage percent: 95-105 optimal, 85-95 adequate,
/// below 85 shortage, above 105 surplus.
pub fn coverage_status(pct: f64) -> CoverageStatus {
    if pct > 105.0 {
        CoverageStatus::Surplus
    } else if pct >= 95.0 {
        CoverageStatus::Optimal
    } else if pct >= 85.0 {
        CoverageStatus::Adequate
    } else {
        CoverageStatus::Shortage
    }
}

/// Coverage percent; zero forecast is 100% only for zero staffing, any
/// staffing against no demand is unbounded surplus.
pub fn coverage_pct(forecast_agents: f64, staffed_agents: f64) -> f64 {
    if forecast_agents <= 0.0 {
        if staffed_agents <= 0.0 { 100.0 } else { f64::INFINITY }
    } else {
        staffed_agents / forecast_agents * 100.0
    }
}

/// Piecewise service-level projection from coverage percent. Anchors:
/// 100→85, 95→80, 85→70, 70→50; below 70 the curve falls at 2 SL points
/// per coverage point, floored at zero.
pub fn project_service_level(pct: f64) -> f64 {
    if pct >= 100.0 {
        85.0
    } else if pct >= 95.0 {
        80.0 + (pct - 95.0)
    } else if pct >= 85.0 {
        70.0 + (pct - 85.0)
    } else if pct >= 70.0 {
        50.0 + (pct - 70.0) * (20.0 / 15.0)
    } else {
        (50.0 - (70.0 - pct) * 2.0).max(0.0)
    }
}

/// Inline staffing estimate when no forecast exists:
/// ceil(offered · AHT / interval · 1.3 + 1).
pub fn erlang_required(offered_calls: f64, aht_sec: f64) -> f64 {
    let traffic = offered_calls * aht_sec / INTERVAL_SECONDS as f64;
    (traffic * 1.3 + 1.0).ceil()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageInterval {
    pub service_id: String,
    pub start: DateTime<Utc>,
    pub forecast_agents: f64,
    pub planned_agents: u32,
    pub live_agents: Option<u32>,
    pub coverage_pct: f64,
    pub status: CoverageStatus,
    pub projected_service_level: f64,
    /// Agents short of forecast (zero when staffed at or above it).
    pub gap: f64,
}

/// Join forecast, planned staffing and the live snapshot per interval.
///
/// Planned agents are the distinct agents logged in during the interval;
/// the live count applies only to the interval containing `now`.
pub fn analyze_coverage(
    forecasts: &[ForecastInterval],
    activity: &[AgentActivityInterval],
    snapshot: Option<&QueueSnapshot>,
    now: DateTime<Utc>,
) -> Vec<CoverageInterval> {
    let current_interval = interval::floor_to_interval(now);

    let mut planned: BTreeMap<DateTime<Utc>, HashSet<&str>> = BTreeMap::new();
    for a in activity.iter().filter(|a| a.was_logged_in()) {
        planned.entry(a.start).or_default().insert(a.agent_id.as_str());
    }

    let mut out = Vec::with_capacity(forecasts.len());
    for f in forecasts {
        let planned_agents = planned.get(&f.start).map_or(0, |s| s.len()) as u32;
        let live_agents = snapshot
            .filter(|s| s.service_id == f.service_id && f.start == current_interval)
            .map(|s| s.agents_on_duty());

        let staffed = live_agents.unwrap_or(planned_agents) as f64;
        let pct = coverage_pct(f.required_agents, staffed);
        out.push(CoverageInterval {
            service_id: f.service_id.clone(),
            start: f.start,
            forecast_agents: f.required_agents,
            planned_agents,
            live_agents,
            coverage_pct: pct,
            status: coverage_status(pct),
            projected_service_level: project_service_level(pct.min(200.0)),
            gap: (f.required_agents - staffed).max(0.0),
        });
    }
    out
}

/// Business impact of one shortage interval.
pub fn interval_impact(iv: &CoverageInterval) -> f64 {
    let sl_degradation = (80.0 - iv.projected_service_level).max(0.0) / 100.0;
    iv.gap * 0.25 * (1.0 + sl_degradation)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub service_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval_count: usize,
    pub peak_shortage: f64,
    pub avg_shortage: f64,
    pub avg_service_level: f64,
    pub real_impact: f64,
    pub severity: Severity,
}

fn gap_severity(avg_service_level: f64, real_impact: f64) -> Severity {
    if avg_service_level < 50.0 || real_impact > 20.0 {
        Severity::Critical
    } else if avg_service_level < 70.0 || real_impact > 10.0 {
        Severity::High
    } else if avg_service_level < 80.0 || real_impact > 5.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Scan for contiguous runs of shortage intervals.
pub fn find_gaps(intervals: &[CoverageInterval]) -> Vec<CoverageGap> {
    let mut gaps = Vec::new();
    let mut run: Vec<&CoverageInterval> = Vec::new();

    let close = |run: &mut Vec<&CoverageInterval>, gaps: &mut Vec<CoverageGap>| {
        if run.is_empty() {
            return;
        }
        let total_shortage: f64 = run.iter().map(|i| i.gap).sum();
        let real_impact: f64 = run.iter().map(|i| interval_impact(i)).sum();
        let avg_sl =
            run.iter().map(|i| i.projected_service_level).sum::<f64>() / run.len() as f64;
        gaps.push(CoverageGap {
            service_id: run[0].service_id.clone(),
            start: run[0].start,
            end: run[run.len() - 1].start + chrono::Duration::minutes(15),
            interval_count: run.len(),
            peak_shortage: run.iter().map(|i| i.gap).fold(0.0, f64::max),
            avg_shortage: total_shortage / run.len() as f64,
            avg_service_level: avg_sl,
            real_impact,
            severity: gap_severity(avg_sl, real_impact),
        });
        run.clear();
    };

    for iv in intervals {
        if iv.status == CoverageStatus::Shortage {
            run.push(iv);
        } else {
            close(&mut run, &mut gaps);
        }
    }
    close(&mut run, &mut gaps);
    gaps
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostImpact {
    pub agent_hours_short: f64,
    pub hourly_cost: f64,
    pub overtime_applied: bool,
    pub total_cost: f64,
}

/// Cost of closing the gaps; overtime pricing kicks in past a peak
/// shortage of five agents.
pub fn cost_impact(gaps: &[CoverageGap], hourly_cost: Option<f64>) -> CostImpact {
    let hourly_cost = hourly_cost.unwrap_or(DEFAULT_HOURLY_COST);
    let agent_hours: f64 = gaps.iter().map(|g| g.avg_shortage * g.interval_count as f64 * 0.25).sum();
    let peak = gaps.iter().map(|g| g.peak_shortage).fold(0.0, f64::max);
    let overtime = peak > 5.0;
    let mut total = agent_hours * hourly_cost;
    if overtime {
        total *= OVERTIME_MULTIPLIER;
    }
    CostImpact {
        agent_hours_short: agent_hours,
        hourly_cost,
        overtime_applied: overtime,
        total_cost: total,
    }
}

/// Range-level summary over analyzed intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStatistics {
    pub interval_count: usize,
    pub avg_coverage_pct: f64,
    pub status_counts: BTreeMap<CoverageStatus, usize>,
    pub peak_shortage: f64,
    pub peak_shortage_at: Option<DateTime<Utc>>,
    pub agent_hours_short: f64,
}

pub fn coverage_statistics(intervals: &[CoverageInterval]) -> CoverageStatistics {
    let mut status_counts = BTreeMap::new();
    let mut peak = 0.0_f64;
    let mut peak_at = None;
    let mut pct_sum = 0.0;
    let mut finite = 0usize;
    let mut short_hours = 0.0;

    for iv in intervals {
        *status_counts.entry(iv.status).or_insert(0) += 1;
        if iv.gap > peak {
            peak = iv.gap;
            peak_at = Some(iv.start);
        }
        if iv.coverage_pct.is_finite() {
            pct_sum += iv.coverage_pct;
            finite += 1;
        }
        short_hours += iv.gap * 0.25;
    }

    CoverageStatistics {
        interval_count: intervals.len(),
        avg_coverage_pct: if finite > 0 { pct_sum / finite as f64 } else { 100.0 },
        status_counts,
        peak_shortage: peak,
        peak_shortage_at: peak_at,
        agent_hours_short: short_hours,
    }
}

// ---------------------------------------------------------------------------
// Threshold breaches and monitoring events

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBreach {
    pub service_id: String,
    pub metric: ThresholdMetric,
    pub level: BreachLevel,
    pub observed: f64,
    pub threshold: f64,
    /// Predicted seconds until the next level is breached, from the recent
    /// trend; None when the trend points away from the threshold.
    pub predicted_next_breach_sec: Option<f64>,
}

/// Evaluate one observed metric value against its configured thresholds.
pub fn evaluate_threshold(
    cfg: &ThresholdConfig,
    observed: f64,
    history: &[(DateTime<Utc>, f64)],
) -> Option<ThresholdBreach> {
    let level = cfg.breach_level(observed)?;
    let threshold = match level {
        BreachLevel::Warning => cfg.warning,
        BreachLevel::Critical => cfg.critical,
        BreachLevel::Emergency => cfg.emergency,
    };
    let next_level = match level {
        BreachLevel::Warning => Some(cfg.critical),
        BreachLevel::Critical => Some(cfg.emergency),
        BreachLevel::Emergency => None,
    };
    let predicted = next_level.and_then(|next| predict_time_to_cross(history, observed, next));
    Some(ThresholdBreach {
        service_id: cfg.service_id.clone(),
        metric: cfg.metric,
        level,
        observed,
        threshold,
        predicted_next_breach_sec: predicted,
    })
}

/// Linear extrapolation from the history window to the given level.
pub fn predict_time_to_cross(
    history: &[(DateTime<Utc>, f64)],
    current: f64,
    level: f64,
) -> Option<f64> {
    let (first, last) = (history.first()?, history.last()?);
    let elapsed = (last.0 - first.0).num_seconds() as f64;
    if elapsed <= 0.0 {
        return None;
    }
    let slope = (last.1 - first.1) / elapsed;
    let remaining = level - current;
    if slope.abs() < 1e-9 || remaining / slope < 0.0 {
        return None;
    }
    Some(remaining / slope)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MonitoringEventKind {
    CoverageTick {
        coverage: CoverageInterval,
        breaches: Vec<ThresholdBreach>,
    },
    MonitorStarted,
    MonitorStopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringEvent {
    pub id: Uuid,
    pub service_id: String,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: MonitoringEventKind,
}

impl MonitoringEvent {
    pub fn new(service_id: impl Into<String>, at: DateTime<Utc>, kind: MonitoringEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id: service_id.into(),
            at,
            kind,
        }
    }
}
