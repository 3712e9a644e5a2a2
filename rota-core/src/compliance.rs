//! Compliance evaluation: per-day work aggregates checked against the rule
//! matrix, producing a deterministic violation list and a compliance score.
//!
//! The engine never touches storage: callers preload [`EmployeeWorkData`]
//! (the bulk validator does this one batch at a time) and the engine
//! evaluates in memory. Results are cached behind the [`ResultCache`]
//! collaborator so tests can inject a no-op cache.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::block::TimetableBlock;
use crate::employee::{AgeCategory, Employee};
use crate::error::{WfmError, WfmResult};
use crate::interval::DateRange;
use crate::rules::{PenaltyTier, RuleKind, SharedCatalog, ThresholdRow};
use crate::shift::Shift;
use crate::violation::Violation;

/// Score at or above which an employee is compliant.
pub const COMPLIANT_SCORE: f64 = 0.95;

/// Aggregates for one worked day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkDay {
    pub date: NaiveDate,
    pub worked_hours: f64,
    pub shift_count: u32,
    /// None when no timetable blocks exist for the day; break and lunch
    /// rules are skipped rather than reported as zero.
    pub break_minutes: Option<f64>,
    pub lunch_minutes: f64,
    pub lunch_start: Option<NaiveTime>,
    pub first_start: Option<NaiveTime>,
}

/// One shift's absolute span, for rest-period checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeWorkData {
    pub employee_id: String,
    pub age_category: AgeCategory,
    /// Sorted by date.
    pub days: Vec<WorkDay>,
    /// Sorted by start.
    pub spans: Vec<ShiftSpan>,
}

/// Build work data from shifts and (optionally) their planned blocks.
///
/// Days covered by blocks get real break/lunch aggregates; days that only
/// have a shift fall back to the contracted duration.
pub fn aggregate_work_data(
    employee: &Employee,
    shifts: &[Shift],
    blocks: &[TimetableBlock],
) -> EmployeeWorkData {
    let mut days: BTreeMap<NaiveDate, WorkDay> = BTreeMap::new();
    let mut spans = Vec::new();

    for shift in shifts.iter().filter(|s| s.employee_id == employee.id) {
        spans.push(ShiftSpan {
            start: shift.start_dt(),
            end: shift.end_dt(),
        });
        let day = days.entry(shift.date).or_insert_with(|| WorkDay {
            date: shift.date,
            worked_hours: 0.0,
            shift_count: 0,
            break_minutes: None,
            lunch_minutes: 0.0,
            lunch_start: None,
            first_start: None,
        });
        day.shift_count += 1;
        day.first_start = Some(match day.first_start {
            Some(t) if t < shift.start => t,
            _ => shift.start,
        });
    }

    // Per-day block aggregates keyed by the shift date (a night shift's
    // post-midnight blocks belong to the day the shift started).
    let mut block_days: BTreeMap<NaiveDate, (f64, f64, f64, Option<NaiveTime>)> = BTreeMap::new();
    for block in blocks.iter().filter(|b| b.employee_id == employee.id) {
        let date = owning_shift_date(block, shifts).unwrap_or_else(|| block.date());
        let entry = block_days.entry(date).or_insert((0.0, 0.0, 0.0, None));
        if block.activity.is_productive() {
            entry.0 += 0.25;
        }
        match block.activity {
            crate::block::Activity::ShortBreak => entry.1 += 15.0,
            crate::block::Activity::Lunch => {
                entry.2 += 15.0;
                let tod = block.start.time();
                entry.3 = Some(match entry.3 {
                    Some(t) if t < tod => t,
                    _ => tod,
                });
            }
            _ => {}
        }
    }

    for (date, (worked, brk, lunch, lunch_start)) in block_days {
        let day = days.entry(date).or_insert_with(|| WorkDay {
            date,
            worked_hours: 0.0,
            shift_count: 0,
            break_minutes: None,
            lunch_minutes: 0.0,
            lunch_start: None,
            first_start: None,
        });
        day.worked_hours = worked;
        day.break_minutes = Some(brk);
        day.lunch_minutes = lunch;
        day.lunch_start = lunch_start;
    }

    // Shift-only days: contracted duration, no break visibility.
    for shift in shifts.iter().filter(|s| s.employee_id == employee.id) {
        let day = days.get_mut(&shift.date).expect("day inserted above");
        if day.break_minutes.is_none() {
            day.worked_hours += shift.duration_hours();
        }
    }

    spans.sort_by_key(|s| s.start);

    EmployeeWorkData {
        employee_id: employee.id.clone(),
        age_category: employee.age_category,
        days: days.into_values().collect(),
        spans,
    }
}

fn owning_shift_date(block: &TimetableBlock, shifts: &[Shift]) -> Option<NaiveDate> {
    shifts
        .iter()
        .filter(|s| s.employee_id == block.employee_id)
        .find(|s| block.start >= s.start_dt() && block.start < s.end_dt())
        .map(|s| s.date)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleObservation {
    pub observed: f64,
    pub required: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub employee_id: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub violations: Vec<Violation>,
    pub score: f64,
    pub compliant: bool,
    pub observations: BTreeMap<RuleKind, RuleObservation>,
    pub check_duration_ms: u64,
    pub cache_hit: bool,
}

/// Score = 1 - Σ penalty weights, floored at zero.
pub fn compliance_score(violations: &[Violation]) -> f64 {
    let total: f64 = violations.iter().map(|v| v.penalty.weight()).sum();
    (1.0 - total).max(0.0)
}

/// Evaluate every enabled rule in fixed order. Never short-circuits: each
/// rule contributes its violations independently.
pub fn evaluate(
    data: &EmployeeWorkData,
    row: &ThresholdRow,
    now: DateTime<Utc>,
) -> (Vec<Violation>, BTreeMap<RuleKind, RuleObservation>) {
    let mut violations = Vec::new();
    let mut observations = BTreeMap::new();

    for kind in RuleKind::ORDERED {
        match kind {
            RuleKind::DailyHours => check_daily_hours(data, row, now, &mut violations, &mut observations),
            RuleKind::WeeklyHours => check_weekly_hours(data, row, now, &mut violations, &mut observations),
            RuleKind::RestBetween => check_rest_between(data, row, now, &mut violations, &mut observations),
            RuleKind::BreakQuota => check_break_quota(data, row, now, &mut violations, &mut observations),
            RuleKind::Lunch => check_lunch(data, row, now, &mut violations, &mut observations),
            RuleKind::ConsecutiveDays => check_consecutive_days(data, row, now, &mut violations, &mut observations),
        }
    }

    (violations, observations)
}

fn observe(
    observations: &mut BTreeMap<RuleKind, RuleObservation>,
    kind: RuleKind,
    observed: f64,
    required: f64,
) {
    observations
        .entry(kind)
        .and_modify(|o| {
            if (observed - required).abs() > (o.observed - o.required).abs() {
                *o = RuleObservation { observed, required };
            }
        })
        .or_insert(RuleObservation { observed, required });
}

fn check_daily_hours(
    data: &EmployeeWorkData,
    row: &ThresholdRow,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
    observations: &mut BTreeMap<RuleKind, RuleObservation>,
) {
    for day in &data.days {
        observe(observations, RuleKind::DailyHours, day.worked_hours, row.daily_hours_std);
        if day.worked_hours > row.daily_hours_std {
            let penalty = if day.worked_hours > row.daily_hours_max {
                PenaltyTier::Serious
            } else {
                PenaltyTier::Fine
            };
            violations.push(Violation::new(
                &data.employee_id,
                RuleKind::DailyHours,
                day.date,
                now,
                day.worked_hours,
                row.daily_hours_std,
                penalty,
                format!(
                    "daily hours {:.1}h exceed the {:.1}h cap on {}",
                    day.worked_hours, row.daily_hours_std, day.date
                ),
            ));
        }
    }
}

fn check_weekly_hours(
    data: &EmployeeWorkData,
    row: &ThresholdRow,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
    observations: &mut BTreeMap<RuleKind, RuleObservation>,
) {
    let mut weeks: BTreeMap<(i32, u32), (f64, NaiveDate)> = BTreeMap::new();
    for day in &data.days {
        let week = day.date.iso_week();
        let entry = weeks.entry((week.year(), week.week())).or_insert((0.0, day.date));
        entry.0 += day.worked_hours;
    }

    for ((_, _), (hours, first_date)) in weeks {
        observe(observations, RuleKind::WeeklyHours, hours, row.weekly_hours_std);
        if hours > row.weekly_hours_std {
            let penalty = if hours > row.weekly_hours_max {
                PenaltyTier::Serious
            } else {
                PenaltyTier::Fine
            };
            violations.push(Violation::new(
                &data.employee_id,
                RuleKind::WeeklyHours,
                first_date,
                now,
                hours,
                row.weekly_hours_std,
                penalty,
                format!(
                    "weekly hours {:.1}h exceed the {:.1}h cap in the week of {}",
                    hours, row.weekly_hours_std, first_date
                ),
            ));
        }
    }
}

fn check_rest_between(
    data: &EmployeeWorkData,
    row: &ThresholdRow,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
    observations: &mut BTreeMap<RuleKind, RuleObservation>,
) {
    for pair in data.spans.windows(2) {
        let rest_hours = (pair[1].start - pair[0].end).num_minutes() as f64 / 60.0;
        observe(observations, RuleKind::RestBetween, rest_hours, row.min_rest_hours);
        if rest_hours < row.min_rest_hours {
            violations.push(Violation::new(
                &data.employee_id,
                RuleKind::RestBetween,
                pair[1].start.date_naive(),
                now,
                rest_hours,
                row.min_rest_hours,
                PenaltyTier::Serious,
                format!(
                    "only {:.1}h of rest before the shift starting {}",
                    rest_hours, pair[1].start
                ),
            ));
        }
    }
}

fn check_break_quota(
    data: &EmployeeWorkData,
    row: &ThresholdRow,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
    observations: &mut BTreeMap<RuleKind, RuleObservation>,
) {
    for day in &data.days {
        let Some(break_minutes) = day.break_minutes else {
            continue;
        };
        let required = (day.worked_hours / 2.0).floor() * row.break_min_per_2h;
        observe(observations, RuleKind::BreakQuota, break_minutes, required);
        if break_minutes < required {
            violations.push(Violation::new(
                &data.employee_id,
                RuleKind::BreakQuota,
                day.date,
                now,
                break_minutes,
                required,
                PenaltyTier::Warning,
                format!(
                    "{break_minutes:.0}min of short breaks against a {required:.0}min quota on {}",
                    day.date
                ),
            ));
        }
    }
}

fn check_lunch(
    data: &EmployeeWorkData,
    row: &ThresholdRow,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
    observations: &mut BTreeMap<RuleKind, RuleObservation>,
) {
    for day in &data.days {
        // Exactly at the boundary a lunch is optional, not mandated.
        if day.break_minutes.is_none() || day.worked_hours <= row.lunch_required_above_hours {
            continue;
        }
        observe(observations, RuleKind::Lunch, day.lunch_minutes, row.lunch_min_minutes);

        let mut problem: Option<String> = None;
        if day.lunch_minutes < row.lunch_min_minutes {
            problem = Some(format!(
                "lunch of {:.0}min is shorter than the {:.0}min minimum",
                day.lunch_minutes, row.lunch_min_minutes
            ));
        } else if day.lunch_minutes > row.lunch_max_minutes {
            problem = Some(format!(
                "lunch of {:.0}min is longer than the {:.0}min maximum",
                day.lunch_minutes, row.lunch_max_minutes
            ));
        } else if let (Some(lunch_start), Some(first_start)) = (day.lunch_start, day.first_start) {
            let into_shift =
                lunch_start.signed_duration_since(first_start).num_minutes() as f64 / 60.0;
            if into_shift >= 0.0 && into_shift < row.lunch_min_hours_into_shift {
                problem = Some(format!(
                    "lunch starts {:.1}h into the shift, before the {:.1}h minimum",
                    into_shift, row.lunch_min_hours_into_shift
                ));
            } else if lunch_start > row.lunch_latest_start {
                problem = Some(format!(
                    "lunch starts at {lunch_start}, after the {} latest start",
                    row.lunch_latest_start
                ));
            }
        }

        if let Some(description) = problem {
            violations.push(Violation::new(
                &data.employee_id,
                RuleKind::Lunch,
                day.date,
                now,
                day.lunch_minutes,
                row.lunch_min_minutes,
                PenaltyTier::Warning,
                format!("{description} on {}", day.date),
            ));
        }
    }
}

fn check_consecutive_days(
    data: &EmployeeWorkData,
    row: &ThresholdRow,
    now: DateTime<Utc>,
    violations: &mut Vec<Violation>,
    observations: &mut BTreeMap<RuleKind, RuleObservation>,
) {
    let worked: Vec<NaiveDate> = data
        .days
        .iter()
        .filter(|d| d.worked_hours > 0.0)
        .map(|d| d.date)
        .collect();

    let mut run_start = 0;
    let mut i = 0;
    while i < worked.len() {
        let run_continues =
            i + 1 < worked.len() && worked[i + 1] - worked[i] == Duration::days(1);
        if !run_continues {
            let run_len = (i - run_start + 1) as u32;
            observe(
                observations,
                RuleKind::ConsecutiveDays,
                run_len as f64,
                row.max_consecutive_days as f64,
            );
            if run_len > row.max_consecutive_days {
                violations.push(Violation::new(
                    &data.employee_id,
                    RuleKind::ConsecutiveDays,
                    worked[i],
                    now,
                    run_len as f64,
                    row.max_consecutive_days as f64,
                    PenaltyTier::Serious,
                    format!(
                        "{run_len} consecutive worked days ending {} exceed the {} day limit",
                        worked[i], row.max_consecutive_days
                    ),
                ));
            }
            run_start = i + 1;
        }
        i += 1;
    }
}

// ---------------------------------------------------------------------------
// Result cache collaborator

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub employee_id: String,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
}

pub trait ResultCache: Send + Sync {
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<ComplianceReport>;
    fn put(&self, key: CacheKey, report: ComplianceReport, now: DateTime<Utc>);
    fn invalidate_employee(&self, employee_id: &str);
}

/// TTL cache over a concurrent map; default TTL 4 hours.
pub struct TtlCache {
    entries: DashMap<CacheKey, (ComplianceReport, DateTime<Utc>)>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(Duration::seconds(14_400))
    }
}

impl ResultCache for TtlCache {
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<ComplianceReport> {
        let entry = self.entries.get(key)?;
        let (report, stored_at) = entry.value();
        if now - *stored_at >= self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(report.clone())
    }

    fn put(&self, key: CacheKey, report: ComplianceReport, now: DateTime<Utc>) {
        self.entries.insert(key, (report, now));
    }

    fn invalidate_employee(&self, employee_id: &str) {
        self.entries.retain(|k, _| k.employee_id != employee_id);
    }
}

/// Cache that stores nothing; injected by tests and one-shot CLI runs.
pub struct NoopCache;

impl ResultCache for NoopCache {
    fn get(&self, _key: &CacheKey, _now: DateTime<Utc>) -> Option<ComplianceReport> {
        None
    }
    fn put(&self, _key: CacheKey, _report: ComplianceReport, _now: DateTime<Utc>) {}
    fn invalidate_employee(&self, _employee_id: &str) {}
}

// ---------------------------------------------------------------------------
// Engine

#[derive(Debug, Default)]
pub struct EngineMetrics {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_check_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineMetricsSnapshot {
    pub requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub avg_check_ms: f64,
    pub cache_hit_rate: f64,
}

pub struct ComplianceEngine {
    catalog: Arc<SharedCatalog>,
    cache: Box<dyn ResultCache>,
    metrics: EngineMetrics,
}

impl ComplianceEngine {
    pub fn new(catalog: Arc<SharedCatalog>, cache: Box<dyn ResultCache>) -> Self {
        Self {
            catalog,
            cache,
            metrics: EngineMetrics::default(),
        }
    }

    /// Validate one employee against preloaded work data.
    ///
    /// Missing shifts are a valid empty result: no days means no violations
    /// and a score of 1.0.
    pub fn validate_one(
        &self,
        employee: &Employee,
        range: DateRange,
        data: &EmployeeWorkData,
        use_cache: bool,
        now: DateTime<Utc>,
    ) -> WfmResult<ComplianceReport> {
        employee.validate()?;
        if data.employee_id != employee.id {
            return Err(WfmError::Validation(format!(
                "work data belongs to {}, not {}",
                data.employee_id, employee.id
            )));
        }

        self.metrics.requests.fetch_add(1, Ordering::Relaxed);
        let key = CacheKey {
            employee_id: employee.id.clone(),
            range_start: range.start.date_naive(),
            range_end: range.end.date_naive(),
        };

        if use_cache {
            if let Some(mut report) = self.cache.get(&key, now) {
                self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
                report.cache_hit = true;
                return Ok(report);
            }
            self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        }

        let started = Instant::now();
        let catalog = self.catalog.get();
        let row = catalog.matrix.row(employee.age_category);
        let (violations, observations) = evaluate(data, row, now);
        let score = compliance_score(&violations);
        let check_duration_ms = started.elapsed().as_millis() as u64;
        self.metrics
            .total_check_ms
            .fetch_add(check_duration_ms, Ordering::Relaxed);

        let report = ComplianceReport {
            employee_id: employee.id.clone(),
            range_start: key.range_start,
            range_end: key.range_end,
            violations,
            score,
            compliant: score >= COMPLIANT_SCORE,
            observations,
            check_duration_ms,
            cache_hit: false,
        };

        if use_cache {
            self.cache.put(key, report.clone(), now);
        }
        Ok(report)
    }

    /// Drop cached results for an employee after a block change.
    pub fn invalidate(&self, employee_id: &str) {
        self.cache.invalidate_employee(employee_id);
    }

    pub fn catalog(&self) -> Arc<SharedCatalog> {
        self.catalog.clone()
    }

    pub fn metrics(&self) -> EngineMetricsSnapshot {
        let requests = self.metrics.requests.load(Ordering::Relaxed);
        let hits = self.metrics.cache_hits.load(Ordering::Relaxed);
        let misses = self.metrics.cache_misses.load(Ordering::Relaxed);
        let total_ms = self.metrics.total_check_ms.load(Ordering::Relaxed);
        let evaluated = requests.saturating_sub(hits);
        EngineMetricsSnapshot {
            requests,
            cache_hits: hits,
            cache_misses: misses,
            avg_check_ms: if evaluated > 0 {
                total_ms as f64 / evaluated as f64
            } else {
                0.0
            },
            cache_hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Bulk aggregation

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkReport {
    pub total_employees: usize,
    pub compliant_employees: usize,
    pub non_compliant_employees: usize,
    pub errors: usize,
    pub violation_count: usize,
    pub violations_by_kind: BTreeMap<RuleKind, usize>,
    pub cache_hit_rate: f64,
    pub duration_ms: u64,
    pub cancelled: bool,
    pub reports: Vec<ComplianceReport>,
}

impl BulkReport {
    /// Fold per-employee outcomes into the aggregate.
    pub fn aggregate(
        outcomes: Vec<Result<ComplianceReport, WfmError>>,
        duration_ms: u64,
        cancelled: bool,
    ) -> Self {
        let mut out = BulkReport {
            duration_ms,
            cancelled,
            ..Default::default()
        };
        let mut cache_hits = 0usize;

        for outcome in outcomes {
            out.total_employees += 1;
            match outcome {
                Ok(report) => {
                    if report.cache_hit {
                        cache_hits += 1;
                    }
                    if report.compliant {
                        out.compliant_employees += 1;
                    } else {
                        out.non_compliant_employees += 1;
                    }
                    out.violation_count += report.violations.len();
                    for v in &report.violations {
                        *out.violations_by_kind.entry(v.rule).or_insert(0) += 1;
                    }
                    out.reports.push(report);
                }
                Err(_) => out.errors += 1,
            }
        }

        let evaluated = out.total_employees - out.errors;
        out.cache_hit_rate = if evaluated > 0 {
            cache_hits as f64 / evaluated as f64
        } else {
            0.0
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Activity;
    use crate::rules::RuleCatalog;
    use chrono::TimeZone;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap()
    }

    fn engine() -> ComplianceEngine {
        let catalog = Arc::new(SharedCatalog::new(
            RuleCatalog::builtin(now()),
            Duration::hours(24),
        ));
        ComplianceEngine::new(catalog, Box::new(NoopCache))
    }

    fn cached_engine() -> ComplianceEngine {
        let catalog = Arc::new(SharedCatalog::new(
            RuleCatalog::builtin(now()),
            Duration::hours(24),
        ));
        ComplianceEngine::new(catalog, Box::new(TtlCache::default()))
    }

    fn day(d: u32, worked: f64) -> WorkDay {
        WorkDay {
            date: date(d),
            worked_hours: worked,
            shift_count: 1,
            break_minutes: None,
            lunch_minutes: 0.0,
            lunch_start: None,
            first_start: Some(hm(9, 0)),
        }
    }

    fn data_for(days: Vec<WorkDay>) -> EmployeeWorkData {
        EmployeeWorkData {
            employee_id: "emp_1".into(),
            age_category: AgeCategory::Adult,
            days,
            spans: vec![],
        }
    }

    fn adult_row() -> ThresholdRow {
        *crate::rules::RuleMatrix::default().row(AgeCategory::Adult)
    }

    // Scenario: adult single shift 09:00-20:30 with 30min lunch = 11h worked.
    #[test]
    fn daily_overtime_is_a_fine() {
        let (violations, _) = evaluate(&data_for(vec![day(2, 11.0)]), &adult_row(), now());
        let daily: Vec<_> = violations.iter().filter(|v| v.rule == RuleKind::DailyHours).collect();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].penalty, PenaltyTier::Fine);
        assert_eq!(daily[0].observed, 11.0);
    }

    #[test]
    fn daily_hours_past_hard_max_are_serious() {
        let (violations, _) = evaluate(&data_for(vec![day(2, 12.5)]), &adult_row(), now());
        assert_eq!(violations[0].penalty, PenaltyTier::Serious);
    }

    // Scenario: Mon 22:00-06:00 then Tue 15:00-23:00 leaves 9h of rest.
    #[test]
    fn insufficient_rest_between_shifts_is_serious() {
        let mut data = data_for(vec![day(2, 8.0), day(3, 8.0)]);
        data.spans = vec![
            ShiftSpan {
                start: Utc.with_ymd_and_hms(2026, 3, 2, 22, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2026, 3, 3, 6, 0, 0).unwrap(),
            },
            ShiftSpan {
                start: Utc.with_ymd_and_hms(2026, 3, 3, 15, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2026, 3, 3, 23, 0, 0).unwrap(),
            },
        ];
        let (violations, _) = evaluate(&data, &adult_row(), now());
        let rest: Vec<_> = violations.iter().filter(|v| v.rule == RuleKind::RestBetween).collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].penalty, PenaltyTier::Serious);
        assert!((rest[0].observed - 9.0).abs() < 1e-9);
    }

    // Scenario: minor with 5x8h = 40h against a 35h weekly cap.
    #[test]
    fn minor_weekly_cap_is_serious() {
        let mut data = data_for((2..=6).map(|d| day(d, 8.0)).collect());
        data.age_category = AgeCategory::Minor;
        let row = *crate::rules::RuleMatrix::default().row(AgeCategory::Minor);
        let (violations, _) = evaluate(&data, &row, now());
        let weekly: Vec<_> = violations.iter().filter(|v| v.rule == RuleKind::WeeklyHours).collect();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].penalty, PenaltyTier::Serious);
        assert_eq!(weekly[0].required, 35.0);
    }

    #[test]
    fn weekly_hours_at_exactly_the_cap_pass() {
        let data = data_for((2..=6).map(|d| day(d, 8.0)).collect());
        let (violations, _) = evaluate(&data, &adult_row(), now());
        assert!(violations.iter().all(|v| v.rule != RuleKind::WeeklyHours));

        // Any positive epsilon over the cap trips the rule.
        let data = data_for((2..=6).map(|d| day(d, 8.01)).collect());
        let (violations, _) = evaluate(&data, &adult_row(), now());
        assert!(violations.iter().any(|v| v.rule == RuleKind::WeeklyHours));
    }

    #[test]
    fn break_quota_requires_15min_per_two_hours() {
        let mut d = day(2, 8.0);
        d.break_minutes = Some(30.0);
        let (violations, _) = evaluate(&data_for(vec![d]), &adult_row(), now());
        let brk: Vec<_> = violations.iter().filter(|v| v.rule == RuleKind::BreakQuota).collect();
        assert_eq!(brk.len(), 1);
        assert_eq!(brk[0].required, 60.0);

        // Without block visibility the rule is skipped, not violated.
        let (violations, _) = evaluate(&data_for(vec![day(2, 8.0)]), &adult_row(), now());
        assert!(violations.iter().all(|v| v.rule != RuleKind::BreakQuota));
    }

    #[test]
    fn missing_lunch_on_long_shift_is_flagged() {
        let mut d = day(2, 8.0);
        d.break_minutes = Some(60.0);
        d.lunch_minutes = 0.0;
        let (violations, _) = evaluate(&data_for(vec![d]), &adult_row(), now());
        assert!(violations.iter().any(|v| v.rule == RuleKind::Lunch));
    }

    #[test]
    fn six_hour_shift_does_not_mandate_lunch() {
        let mut d = day(2, 5.75);
        d.break_minutes = Some(30.0);
        let (violations, _) = evaluate(&data_for(vec![d]), &adult_row(), now());
        assert!(violations.iter().all(|v| v.rule != RuleKind::Lunch));
    }

    #[test]
    fn early_lunch_is_flagged() {
        let mut d = day(2, 8.0);
        d.break_minutes = Some(60.0);
        d.lunch_minutes = 30.0;
        d.lunch_start = Some(hm(10, 0));
        d.first_start = Some(hm(9, 0));
        let (violations, _) = evaluate(&data_for(vec![d]), &adult_row(), now());
        let lunch: Vec<_> = violations.iter().filter(|v| v.rule == RuleKind::Lunch).collect();
        assert_eq!(lunch.len(), 1);
        assert!(lunch[0].description.contains("1.0h into the shift"));
    }

    #[test]
    fn seven_consecutive_days_trip_the_rule() {
        let data = data_for((2..=8).map(|d| day(d, 6.0)).collect());
        let (violations, _) = evaluate(&data, &adult_row(), now());
        let consecutive: Vec<_> = violations.iter().filter(|v| v.rule == RuleKind::ConsecutiveDays).collect();
        assert_eq!(consecutive.len(), 1);
        assert_eq!(consecutive[0].observed, 7.0);
    }

    #[test]
    fn score_is_one_minus_penalty_weights() {
        let (violations, _) = evaluate(&data_for(vec![day(2, 11.0)]), &adult_row(), now());
        assert!((compliance_score(&violations) - 0.8).abs() < 1e-9);
        assert_eq!(compliance_score(&[]), 1.0);
    }

    #[test]
    fn validate_one_empty_range_is_compliant() {
        let engine = engine();
        let employee = Employee::new("emp_1", "A");
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let data = data_for(vec![]);
        let report = engine.validate_one(&employee, range, &data, false, now()).unwrap();
        assert_eq!(report.score, 1.0);
        assert!(report.compliant);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn score_stays_in_unit_range_and_compliance_matches_threshold() {
        // Enough serious violations to push the raw penalty past 1.0.
        let data = data_for((2..=6).map(|d| day(d, 13.0)).collect());
        let engine = engine();
        let employee = Employee::new("emp_1", "A");
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let report = engine.validate_one(&employee, range, &data, false, now()).unwrap();
        assert!((0.0..=1.0).contains(&report.score));
        assert_eq!(report.compliant, report.score >= COMPLIANT_SCORE);
        assert!(!report.compliant);
    }

    #[test]
    fn cache_round_trip_and_invalidation() {
        let engine = cached_engine();
        let employee = Employee::new("emp_1", "A");
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let data = data_for(vec![day(2, 11.0)]);

        let first = engine.validate_one(&employee, range, &data, true, now()).unwrap();
        assert!(!first.cache_hit);
        let second = engine.validate_one(&employee, range, &data, true, now()).unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.score, first.score);

        engine.invalidate("emp_1");
        let third = engine.validate_one(&employee, range, &data, true, now()).unwrap();
        assert!(!third.cache_hit);

        let m = engine.metrics();
        assert_eq!(m.requests, 3);
        assert_eq!(m.cache_hits, 1);
        assert_eq!(m.cache_misses, 2);
    }

    #[test]
    fn aggregate_work_data_prefers_blocks_over_contracted_hours() {
        let employee = Employee::new("emp_1", "A");
        let shift = Shift::new("s1", "emp_1", date(2), hm(9, 0), hm(17, 0));
        let mut blocks = Vec::new();
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        for i in 0..32 {
            let at = start + Duration::minutes(15 * i);
            let activity = match i {
                14 | 15 => Activity::Lunch,
                8 | 24 => Activity::ShortBreak,
                _ => Activity::Work,
            };
            blocks.push(TimetableBlock::new("emp_1", at, activity));
        }

        let data = aggregate_work_data(&employee, &[shift], &blocks);
        assert_eq!(data.days.len(), 1);
        let d = &data.days[0];
        assert!((d.worked_hours - 7.0).abs() < 1e-9);
        assert_eq!(d.break_minutes, Some(30.0));
        assert_eq!(d.lunch_minutes, 30.0);
        assert_eq!(d.lunch_start, Some(hm(12, 30)));
        assert_eq!(d.shift_count, 1);
        assert_eq!(data.spans.len(), 1);
    }

    #[test]
    fn aggregate_uses_contracted_hours_without_blocks() {
        let employee = Employee::new("emp_1", "A");
        let shift = Shift::new("s1", "emp_1", date(2), hm(9, 0), hm(17, 0));
        let data = aggregate_work_data(&employee, &[shift], &[]);
        assert_eq!(data.days.len(), 1);
        assert!((data.days[0].worked_hours - 8.0).abs() < 1e-9);
        assert_eq!(data.days[0].break_minutes, None);
    }

    #[test]
    fn bulk_totals_balance() {
        let engine = engine();
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 0, 0, 0).unwrap(),
        )
        .unwrap();

        let ok = engine.validate_one(
            &Employee::new("emp_1", "A"),
            range,
            &data_for(vec![day(2, 8.0)]),
            false,
            now(),
        );

        let mut over = data_for((2..=6).map(|d| day(d, 13.0)).collect());
        over.employee_id = "emp_2".into();
        let bad = engine.validate_one(&Employee::new("emp_2", "B"), range, &over, false, now());
        assert!(!bad.as_ref().unwrap().compliant);

        let err: Result<ComplianceReport, WfmError> = Err(WfmError::NotFound("emp_3".into()));

        let bulk = BulkReport::aggregate(vec![ok, bad, err], 12, false);
        assert_eq!(bulk.total_employees, 3);
        assert_eq!(
            bulk.total_employees,
            bulk.compliant_employees + bulk.non_compliant_employees + bulk.errors
        );
        let by_kind: usize = bulk.violations_by_kind.values().sum();
        assert_eq!(by_kind, bulk.violation_count);
    }
}
