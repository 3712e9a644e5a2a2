//! Intraday timetable planner.
//!
//! Decomposes published shifts into 15-minute activity blocks: work with
//! skill rotation, a lunch placed around the eligible-window midpoint, and
//! short breaks driven by consecutive-work limits. Deterministic: identical
//! inputs produce identical blocks.

use std::collections::BTreeMap;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::block::{Activity, BlockChange, TimetableBlock};
use crate::employee::Employee;
use crate::error::{WfmError, WfmResult};
use crate::interval::{self, DateRange, INTERVAL_MINUTES, INTERVALS_PER_HOUR};
use crate::shift::Shift;
use crate::telemetry::ForecastInterval;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LunchRule {
    pub earliest_start: NaiveTime,
    pub latest_start: NaiveTime,
    pub min_duration_min: u32,
    pub max_duration_min: u32,
    /// Hours into the shift before a lunch may start.
    pub min_hours_before: f64,
}

impl Default for LunchRule {
    fn default() -> Self {
        Self {
            earliest_start: NaiveTime::from_hms_opt(11, 0, 0).expect("valid time"),
            latest_start: NaiveTime::from_hms_opt(14, 0, 0).expect("valid time"),
            min_duration_min: 30,
            max_duration_min: 60,
            min_hours_before: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakRule {
    pub duration_min: u32,
    pub frequency_hours: f64,
    pub spacing_min: u32,
    pub max_delay_min: u32,
    pub max_consecutive_work_hours: f64,
}

impl Default for BreakRule {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanObjective {
    /// Insert breaks by the rules alone.
    Balanced,
    /// Additionally move breaks out of under-covered forecast intervals.
    ServiceLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimetableTemplate {
    pub code: String,
    pub lunch: LunchRule,
    pub breaks: BreakRule,
    pub objective: PlanObjective,
    /// Target share of intervals per activity, reported against by stats.
    pub activity_targets: BTreeMap<Activity, f64>,
}

impl Default for TimetableTemplate {
    fn default() -> Self {
        let mut activity_targets = BTreeMap::new();
        activity_targets.insert(Activity::Work, 0.85);
        activity_targets.insert(Activity::Lunch, 0.05);
        activity_targets.insert(Activity::ShortBreak, 0.075);
        activity_targets.insert(Activity::Training, 0.025);
        Self {
            code: "default".to_string(),
            lunch: LunchRule::default(),
            breaks: BreakRule::default(),
            objective: PlanObjective::Balanced,
            activity_targets,
        }
    }
}

/// Per-employee wishes for one date, applied when within two hours of the
/// scheduled boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulePreference {
    pub employee_id: String,
    pub date: chrono::NaiveDate,
    pub day_off: bool,
    pub preferred_start: Option<NaiveTime>,
    pub preferred_end: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTimetable {
    pub blocks: Vec<TimetableBlock>,
    /// End was pulled in because the shift exceeded the daily cap without
    /// overtime authorization.
    pub truncated: bool,
}

fn preference_window() -> Duration {
    Duration::hours(2)
}

/// Plan one shift into blocks.
pub fn plan_shift(
    employee: &Employee,
    shift: &Shift,
    preference: Option<&SchedulePreference>,
    template: &TimetableTemplate,
) -> WfmResult<PlannedTimetable> {
    employee.validate()?;
    shift.validate()?;
    if shift.employee_id != employee.id {
        return Err(WfmError::Validation(format!(
            "shift {} belongs to {}, not {}",
            shift.id, shift.employee_id, employee.id
        )));
    }

    let mut start = shift.start_dt();
    let mut end = shift.end_dt();

    // Envelope first: clip the scheduled shift to the daily cap before
    // looking at preferences.
    let cap = employee.constraints.max_daily_hours;
    let mut truncated = false;
    let envelope_hours = (end - start).num_minutes() as f64 / 60.0;
    if envelope_hours > cap && !employee.constraints.overtime_allowed {
        end = start + Duration::minutes((interval::hours_to_blocks(cap) as i64) * INTERVAL_MINUTES);
        truncated = true;
    }

    // Requested day off: the whole envelope is locked out.
    if preference.is_some_and(|p| p.day_off) {
        return Ok(PlannedTimetable {
            blocks: unavailable_envelope(employee, start, end, &template.code),
            truncated,
        });
    }

    // Preferences are judged against the clipped envelope and are not
    // re-truncated; an accepted end wins over the cap.
    if let Some(pref) = preference {
        if let Some(p_start) = pref.preferred_start {
            let wanted = shift_instant(shift, p_start);
            if (wanted - start).abs() <= preference_window() {
                start = wanted;
            }
        }
        if let Some(p_end) = pref.preferred_end {
            let mut wanted = shift_instant(shift, p_end);
            if wanted <= start {
                wanted += Duration::days(1);
            }
            if (wanted - end).abs() <= preference_window() {
                end = wanted;
                truncated = false;
            }
        }
    }

    // Weekend lockout covers the entire envelope.
    let weekday = shift.date.weekday();
    if !employee.constraints.weekend_work_allowed
        && matches!(weekday, Weekday::Sat | Weekday::Sun)
    {
        return Ok(PlannedTimetable {
            blocks: unavailable_envelope(employee, start, end, &template.code),
            truncated,
        });
    }

    let mut blocks = default_work_blocks(employee, start, end, &template.code);
    mask_night_hours(employee, &mut blocks);
    insert_lunch(employee, &mut blocks, &template.lunch);
    insert_short_breaks(&mut blocks, &template.breaks);

    Ok(PlannedTimetable { blocks, truncated })
}

fn shift_instant(shift: &Shift, tod: NaiveTime) -> DateTime<Utc> {
    chrono::TimeZone::from_utc_datetime(&Utc, &shift.date.and_time(tod))
}

fn unavailable_envelope(
    employee: &Employee,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    template_code: &str,
) -> Vec<TimetableBlock> {
    interval::interval_grid(start, end)
        .into_iter()
        .map(|at| {
            TimetableBlock::new(&employee.id, at, Activity::NotAvailable)
                .with_template(template_code)
                .locked()
        })
        .collect()
}

/// Every block starts as work; the primary skill covers seven of every ten
/// blocks, secondaries round-robin through the rest.
fn default_work_blocks(
    employee: &Employee,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    template_code: &str,
) -> Vec<TimetableBlock> {
    let primary = employee.primary_skill().map(|s| s.skill_id.clone());
    let secondaries: Vec<&str> = employee
        .secondary_skills()
        .iter()
        .map(|s| s.skill_id.as_str())
        .collect();

    let mut secondary_cursor = 0usize;
    interval::interval_grid(start, end)
        .into_iter()
        .enumerate()
        .map(|(i, at)| {
            let skill = if secondaries.is_empty() || i % 10 < 7 {
                primary.clone()
            } else {
                let s = secondaries[secondary_cursor % secondaries.len()].to_string();
                secondary_cursor += 1;
                Some(s)
            };
            let mut block =
                TimetableBlock::new(&employee.id, at, Activity::Work).with_template(template_code);
            block.skill_id = skill;
            block
        })
        .collect()
}

/// Night hours (22:00-06:00) become locked not-available blocks for
/// employees without night-work permission.
fn mask_night_hours(employee: &Employee, blocks: &mut [TimetableBlock]) {
    if employee.constraints.night_work_allowed {
        return;
    }
    for block in blocks.iter_mut() {
        let hour = block.start.hour();
        if hour >= 22 || hour < 6 {
            block.activity = Activity::NotAvailable;
            block.skill_id = None;
            block.locked = true;
        }
    }
}

/// Insert a lunch when the envelope is six hours or longer, at the work
/// block closest to the eligible window's midpoint.
fn insert_lunch(employee: &Employee, blocks: &mut [TimetableBlock], rule: &LunchRule) {
    let envelope_blocks = blocks.len();
    if interval::blocks_to_hours(envelope_blocks) < 6.0 {
        return;
    }

    let earliest_index = interval::hours_to_blocks(rule.min_hours_before);
    let midpoint = midpoint_of(rule.earliest_start, rule.latest_start);

    let mut best: Option<(usize, i64)> = None;
    for (i, block) in blocks.iter().enumerate().skip(earliest_index) {
        if block.activity != Activity::Work {
            continue;
        }
        let tod = block.start.time();
        if tod < rule.earliest_start || tod > rule.latest_start {
            continue;
        }
        let distance = (tod.signed_duration_since(midpoint)).num_minutes().abs();
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }
    let Some((start_index, _)) = best else {
        return;
    };

    let min_blocks = (rule.min_duration_min as usize) / INTERVAL_MINUTES as usize;
    let max_blocks = (rule.max_duration_min as usize) / INTERVAL_MINUTES as usize;
    let cap_blocks = interval::hours_to_blocks(employee.constraints.max_daily_hours);

    // Stretch the lunch when that is what keeps net worked time under the cap.
    let needed = envelope_blocks.saturating_sub(cap_blocks);
    let duration = needed.clamp(min_blocks, max_blocks);

    for block in blocks
        .iter_mut()
        .skip(start_index)
        .take(duration)
        .take_while(|b| b.activity == Activity::Work)
    {
        block.activity = Activity::Lunch;
        block.skill_id = None;
    }
}

fn midpoint_of(earliest: NaiveTime, latest: NaiveTime) -> NaiveTime {
    let span = latest.signed_duration_since(earliest);
    earliest + span / 2
}

/// Walk the envelope forcing a break whenever the consecutive-work limit is
/// hit, and topping up on the frequency/spacing rules.
fn insert_short_breaks(blocks: &mut [TimetableBlock], rule: &BreakRule) {
    let duration_blocks = ((rule.duration_min as usize) / INTERVAL_MINUTES as usize).max(1);
    let frequency_blocks = interval::hours_to_blocks(rule.frequency_hours);
    let spacing_blocks = (rule.spacing_min as usize) / INTERVAL_MINUTES as usize;
    let max_consecutive = interval::hours_to_blocks(rule.max_consecutive_work_hours);

    let mut consecutive_work = 0usize;
    let mut last_break: Option<usize> = None;

    let mut i = 0;
    while i < blocks.len() {
        if blocks[i].activity != Activity::Work {
            consecutive_work = 0;
            if blocks[i].activity.is_break() {
                last_break = Some(i);
            }
            i += 1;
            continue;
        }

        consecutive_work += 1;

        let forced = consecutive_work >= max_consecutive;
        let due = i >= frequency_blocks
            && last_break.is_none_or(|lb| i - lb >= spacing_blocks);

        if (forced || due) && place_break(blocks, i, duration_blocks) {
            last_break = Some(i);
            consecutive_work = 0;
        }
        i += 1;
    }
}

fn place_break(blocks: &mut [TimetableBlock], at: usize, duration_blocks: usize) -> bool {
    if at + duration_blocks > blocks.len() {
        return false;
    }
    if blocks[at..at + duration_blocks]
        .iter()
        .any(|b| b.activity != Activity::Work || b.locked)
    {
        return false;
    }
    for block in &mut blocks[at..at + duration_blocks] {
        block.activity = Activity::ShortBreak;
        block.skill_id = None;
    }
    true
}

/// Plan a full range of shifts, then (for the service-level objective)
/// nudge breaks out of under-covered forecast intervals.
pub fn plan_range(
    employees: &[Employee],
    shifts: &[Shift],
    preferences: &[SchedulePreference],
    template: &TimetableTemplate,
    forecasts: &[ForecastInterval],
) -> WfmResult<Vec<TimetableBlock>> {
    let by_id: HashMap<&str, &Employee> = employees.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut ordered: Vec<&Shift> = shifts.iter().collect();
    ordered.sort_by(|a, b| (&a.employee_id, a.date, a.start).cmp(&(&b.employee_id, b.date, b.start)));

    let mut blocks = Vec::new();
    for shift in ordered {
        let employee = by_id
            .get(shift.employee_id.as_str())
            .ok_or_else(|| WfmError::NotFound(format!("employee {}", shift.employee_id)))?;
        let preference = preferences
            .iter()
            .find(|p| p.employee_id == shift.employee_id && p.date == shift.date);
        blocks.extend(plan_shift(employee, shift, preference, template)?.blocks);
    }

    if template.objective == PlanObjective::ServiceLevel {
        rebalance_breaks_for_coverage(&mut blocks, forecasts);
    }
    Ok(blocks)
}

/// Move unlocked short breaks out of intervals staffed below forecast into
/// a nearby interval with spare capacity (±2 hours). Returns moves applied.
pub fn rebalance_breaks_for_coverage(
    blocks: &mut [TimetableBlock],
    forecasts: &[ForecastInterval],
) -> usize {
    let mut staffed: HashMap<DateTime<Utc>, i64> = HashMap::new();
    for b in blocks.iter() {
        if b.activity == Activity::Work {
            *staffed.entry(b.start).or_insert(0) += 1;
        }
    }
    let required: HashMap<DateTime<Utc>, f64> =
        forecasts.iter().map(|f| (f.start, f.required_agents)).collect();

    let mut ordered_forecasts: Vec<&ForecastInterval> = forecasts.iter().collect();
    ordered_forecasts.sort_by_key(|f| f.start);

    let mut moves = 0;
    for forecast in ordered_forecasts {
        let mut shortfall = forecast.required_agents - *staffed.get(&forecast.start).unwrap_or(&0) as f64;
        if shortfall <= 0.0 {
            continue;
        }

        // Break blocks sitting inside the under-covered interval.
        let break_indexes: Vec<usize> = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| {
                b.start == forecast.start && b.activity == Activity::ShortBreak && !b.locked
            })
            .map(|(i, _)| i)
            .collect();

        for break_index in break_indexes {
            if shortfall <= 0.0 {
                break;
            }
            let employee_id = blocks[break_index].employee_id.clone();
            let Some(target) = find_swap_target(blocks, &staffed, &required, &employee_id, forecast.start)
            else {
                continue;
            };

            blocks[break_index].activity = Activity::Work;
            blocks[target].activity = Activity::ShortBreak;
            let target_start = blocks[target].start;
            blocks[target].skill_id = None;
            *staffed.entry(forecast.start).or_insert(0) += 1;
            *staffed.entry(target_start).or_insert(0) -= 1;
            shortfall -= 1.0;
            moves += 1;
        }
    }
    moves
}

/// Nearest work block of the same employee within ±2h whose interval keeps
/// spare capacity after losing one agent.
fn find_swap_target(
    blocks: &[TimetableBlock],
    staffed: &HashMap<DateTime<Utc>, i64>,
    required: &HashMap<DateTime<Utc>, f64>,
    employee_id: &str,
    from: DateTime<Utc>,
) -> Option<usize> {
    for offset in 1..=(2 * INTERVALS_PER_HOUR as i64) {
        for sign in [-1i64, 1] {
            let candidate = from + Duration::minutes(sign * offset * INTERVAL_MINUTES);
            let spare = *staffed.get(&candidate).unwrap_or(&0) as f64
                - required.get(&candidate).copied().unwrap_or(0.0);
            if spare <= 0.0 {
                continue;
            }
            if let Some(i) = blocks.iter().position(|b| {
                b.employee_id == employee_id
                    && b.start == candidate
                    && b.activity == Activity::Work
                    && !b.locked
            }) {
                return Some(i);
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Manual adjustments

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "arg")]
pub enum Adjustment {
    AddWork,
    DoesNotAcceptCalls,
    AssignProject(String),
    AddLunch,
    AddBreak,
    CancelBreaks,
    Meeting,
    Training,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentOutcome {
    pub changed: usize,
    pub skipped_locked: usize,
    pub events: Vec<BlockChange>,
}

/// Apply one adjustment to an employee's blocks inside a range. Locked
/// blocks are skipped and counted; every change emits an audit event.
pub fn apply_adjustment(
    blocks: &mut [TimetableBlock],
    employee_id: &str,
    range: DateRange,
    adjustment: &Adjustment,
    now: DateTime<Utc>,
) -> WfmResult<AdjustmentOutcome> {
    let mut outcome = AdjustmentOutcome::default();
    let mut matched = 0usize;

    for block in blocks
        .iter_mut()
        .filter(|b| b.employee_id == employee_id && range.contains(b.start))
    {
        matched += 1;
        if block.locked {
            outcome.skipped_locked += 1;
            continue;
        }

        let previous = block.activity;
        let target = match adjustment {
            Adjustment::AddWork => Some(Activity::Work),
            Adjustment::DoesNotAcceptCalls => Some(Activity::Downtime),
            Adjustment::AssignProject(project) => {
                block.project_id = Some(project.clone());
                Some(Activity::Project)
            }
            Adjustment::AddLunch => Some(Activity::Lunch),
            Adjustment::AddBreak => Some(Activity::ShortBreak),
            Adjustment::CancelBreaks => previous.is_break().then_some(Activity::Work),
            Adjustment::Meeting => Some(Activity::Meeting),
            Adjustment::Training => Some(Activity::Training),
        };

        if let Some(activity) = target
            && activity != previous
        {
            block.activity = activity;
            if !activity.is_productive() {
                block.skill_id = None;
            }
            outcome.changed += 1;
            outcome.events.push(BlockChange {
                employee_id: employee_id.to_string(),
                block_start: block.start,
                previous,
                current: activity,
                changed_at: now,
            });
        }
    }

    if matched == 0 {
        return Err(WfmError::NotFound(format!(
            "no blocks for {employee_id} in {} .. {}",
            range.start, range.end
        )));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn overtime_employee() -> Employee {
        let mut e = Employee::new("emp_1", "A. Ivanova")
            .with_skill("support_l1", 4)
            .with_skill("sales", 3);
        e.constraints.max_daily_hours = 9.0;
        e.constraints.overtime_allowed = true;
        e
    }

    fn nine_hour_shift() -> Shift {
        Shift::new("s1", "emp_1", monday(), hm(8, 0), hm(17, 0))
    }

    // Scenario: 08:00-17:00 with the default template puts a 30-minute
    // lunch at 12:30, the midpoint of the eligible window.
    #[test]
    fn lunch_lands_on_window_midpoint() {
        let plan = plan_shift(
            &overtime_employee(),
            &nine_hour_shift(),
            None,
            &TimetableTemplate::default(),
        )
        .unwrap();

        let lunch: Vec<_> = plan
            .blocks
            .iter()
            .filter(|b| b.activity == Activity::Lunch)
            .collect();
        assert_eq!(lunch.len(), 2);
        assert_eq!(lunch[0].start, at(12, 30));
        assert_eq!(lunch[1].start, at(12, 45));
    }

    #[test]
    fn envelope_duration_matches_shift() {
        let shift = nine_hour_shift();
        let plan = plan_shift(
            &overtime_employee(),
            &shift,
            None,
            &TimetableTemplate::default(),
        )
        .unwrap();
        assert_eq!(plan.blocks.len(), shift.interval_count());
        assert!(!plan.truncated);
    }

    #[test]
    fn planner_is_deterministic() {
        let employee = overtime_employee();
        let shift = nine_hour_shift();
        let template = TimetableTemplate::default();
        let a = plan_shift(&employee, &shift, None, &template).unwrap();
        let b = plan_shift(&employee, &shift, None, &template).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shift_is_truncated_without_overtime_permission() {
        let employee = Employee::new("emp_1", "A").with_skill("support_l1", 4);
        let plan = plan_shift(
            &employee,
            &nine_hour_shift(),
            None,
            &TimetableTemplate::default(),
        )
        .unwrap();
        assert!(plan.truncated);
        // Eight-hour cap: 32 blocks, ending 16:00.
        assert_eq!(plan.blocks.len(), 32);
        assert_eq!(plan.blocks.last().unwrap().start, at(15, 45));
    }

    #[test]
    fn day_off_preference_locks_the_envelope() {
        let pref = SchedulePreference {
            employee_id: "emp_1".into(),
            date: monday(),
            day_off: true,
            preferred_start: None,
            preferred_end: None,
        };
        let plan = plan_shift(
            &overtime_employee(),
            &nine_hour_shift(),
            Some(&pref),
            &TimetableTemplate::default(),
        )
        .unwrap();
        assert!(plan
            .blocks
            .iter()
            .all(|b| b.activity == Activity::NotAvailable && b.locked));
        assert_eq!(plan.blocks.len(), 36);
    }

    #[test]
    fn close_preferences_shift_the_envelope() {
        let pref = SchedulePreference {
            employee_id: "emp_1".into(),
            date: monday(),
            day_off: false,
            preferred_start: Some(hm(9, 0)),
            preferred_end: Some(hm(18, 0)),
        };
        let plan = plan_shift(
            &overtime_employee(),
            &nine_hour_shift(),
            Some(&pref),
            &TimetableTemplate::default(),
        )
        .unwrap();
        assert_eq!(plan.blocks[0].start, at(9, 0));
        assert_eq!(plan.blocks.last().unwrap().start, at(17, 45));
    }

    #[test]
    fn end_preference_is_judged_against_the_truncated_envelope() {
        // Cap 8h, no overtime: 08:00-17:00 clips to 16:00 first. The
        // preferred end of 18:00 is exactly two hours from that clipped
        // boundary, so it wins and the envelope runs past the cap.
        let employee = Employee::new("emp_1", "A").with_skill("support_l1", 4);
        let pref = SchedulePreference {
            employee_id: "emp_1".into(),
            date: monday(),
            day_off: false,
            preferred_start: None,
            preferred_end: Some(hm(18, 0)),
        };
        let plan = plan_shift(
            &employee,
            &nine_hour_shift(),
            Some(&pref),
            &TimetableTemplate::default(),
        )
        .unwrap();
        assert_eq!(plan.blocks.len(), 40);
        assert_eq!(plan.blocks.last().unwrap().start, at(17, 45));
        assert!(!plan.truncated);

        // Three hours from the clipped end: out of the window, the
        // truncation stands.
        let far = SchedulePreference {
            preferred_end: Some(hm(19, 0)),
            ..pref
        };
        let plan = plan_shift(
            &employee,
            &nine_hour_shift(),
            Some(&far),
            &TimetableTemplate::default(),
        )
        .unwrap();
        assert_eq!(plan.blocks.len(), 32);
        assert!(plan.truncated);
    }

    #[test]
    fn far_preferences_are_ignored() {
        let pref = SchedulePreference {
            employee_id: "emp_1".into(),
            date: monday(),
            day_off: false,
            preferred_start: Some(hm(13, 0)),
            preferred_end: None,
        };
        let plan = plan_shift(
            &overtime_employee(),
            &nine_hour_shift(),
            Some(&pref),
            &TimetableTemplate::default(),
        )
        .unwrap();
        assert_eq!(plan.blocks[0].start, at(8, 0));
    }

    #[test]
    fn night_hours_are_masked_without_permission() {
        let mut employee = Employee::new("emp_1", "A").with_skill("support_l1", 4);
        employee.constraints.night_work_allowed = false;
        employee.constraints.overtime_allowed = true;
        let shift = Shift::new("s2", "emp_1", monday(), hm(20, 0), hm(23, 45));
        let plan = plan_shift(&employee, &shift, None, &TimetableTemplate::default()).unwrap();

        for block in &plan.blocks {
            if block.start.hour() >= 22 {
                assert_eq!(block.activity, Activity::NotAvailable);
                assert!(block.locked);
            } else {
                assert_ne!(block.activity, Activity::NotAvailable);
            }
        }
    }

    #[test]
    fn weekend_shift_is_locked_out_without_permission() {
        let mut employee = overtime_employee();
        employee.constraints.weekend_work_allowed = false;
        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let shift = Shift::new("s3", "emp_1", saturday, hm(9, 0), hm(17, 0));
        let plan = plan_shift(&employee, &shift, None, &TimetableTemplate::default()).unwrap();
        assert!(plan
            .blocks
            .iter()
            .all(|b| b.activity == Activity::NotAvailable && b.locked));
    }

    #[test]
    fn breaks_respect_consecutive_work_limit() {
        let plan = plan_shift(
            &overtime_employee(),
            &nine_hour_shift(),
            None,
            &TimetableTemplate::default(),
        )
        .unwrap();

        let mut consecutive = 0;
        let mut max_consecutive = 0;
        for block in &plan.blocks {
            if block.activity == Activity::Work {
                consecutive += 1;
                max_consecutive = max_consecutive.max(consecutive);
            } else {
                consecutive = 0;
            }
        }
        assert!(max_consecutive <= 16, "ran {max_consecutive} work blocks");
        assert!(plan.blocks.iter().any(|b| b.activity == Activity::ShortBreak));
    }

    #[test]
    fn skill_rotation_favors_primary_seven_of_ten() {
        let plan = plan_shift(
            &overtime_employee(),
            &nine_hour_shift(),
            None,
            &TimetableTemplate::default(),
        )
        .unwrap();
        let work: Vec<_> = plan
            .blocks
            .iter()
            .filter(|b| b.activity == Activity::Work)
            .collect();
        let primary = work
            .iter()
            .filter(|b| b.skill_id.as_deref() == Some("support_l1"))
            .count();
        let secondary = work
            .iter()
            .filter(|b| b.skill_id.as_deref() == Some("sales"))
            .count();
        assert!(primary > secondary);
        assert!(secondary > 0);
    }

    #[test]
    fn rebalance_moves_break_out_of_shortage_interval() {
        let employee = overtime_employee();
        let shift = nine_hour_shift();
        let mut template = TimetableTemplate::default();
        template.objective = PlanObjective::ServiceLevel;

        let mut blocks = plan_shift(&employee, &shift, None, &template).unwrap().blocks;
        let break_at = blocks
            .iter()
            .find(|b| b.activity == Activity::ShortBreak)
            .unwrap()
            .start;

        // One agent demanded exactly where the break sits, nothing elsewhere.
        let forecasts = vec![ForecastInterval::new("svc_1", break_at, 1.0)];
        let moves = rebalance_breaks_for_coverage(&mut blocks, &forecasts);
        assert_eq!(moves, 1);
        assert!(blocks
            .iter()
            .all(|b| !(b.start == break_at && b.activity == Activity::ShortBreak)));
        // The break still exists somewhere within two hours.
        let relocated = blocks.iter().find(|b| b.activity == Activity::ShortBreak).unwrap();
        assert!((relocated.start - break_at).abs() <= Duration::hours(2));
    }

    #[test]
    fn cancel_then_add_break_restores_equivalent_blocks() {
        let employee = overtime_employee();
        let shift = nine_hour_shift();
        let mut blocks = plan_shift(&employee, &shift, None, &TimetableTemplate::default())
            .unwrap()
            .blocks;
        let now = at(7, 0);

        let original_break_blocks = blocks
            .iter()
            .filter(|b| b.activity == Activity::ShortBreak)
            .count();
        assert!(original_break_blocks > 0);
        let first_break = blocks
            .iter()
            .find(|b| b.activity == Activity::ShortBreak)
            .unwrap()
            .start;

        let whole = DateRange::new(at(8, 0), at(17, 0)).unwrap();
        let cancelled =
            apply_adjustment(&mut blocks, "emp_1", whole, &Adjustment::CancelBreaks, now).unwrap();
        assert!(cancelled.changed >= original_break_blocks);
        assert!(blocks.iter().all(|b| b.activity != Activity::ShortBreak));
        assert_eq!(cancelled.events.len(), cancelled.changed);

        let slot = DateRange::new(first_break, first_break + Duration::minutes(15)).unwrap();
        let added = apply_adjustment(&mut blocks, "emp_1", slot, &Adjustment::AddBreak, now).unwrap();
        assert_eq!(added.changed, 1);
        assert_eq!(
            blocks
                .iter()
                .filter(|b| b.activity == Activity::ShortBreak)
                .count(),
            1
        );
    }

    #[test]
    fn adjustments_skip_locked_blocks() {
        let mut blocks = vec![
            TimetableBlock::new("emp_1", at(9, 0), Activity::Work).locked(),
            TimetableBlock::new("emp_1", at(9, 15), Activity::Work),
        ];
        let range = DateRange::new(at(9, 0), at(9, 30)).unwrap();
        let out = apply_adjustment(
            &mut blocks,
            "emp_1",
            range,
            &Adjustment::DoesNotAcceptCalls,
            at(9, 0),
        )
        .unwrap();
        assert_eq!(out.changed, 1);
        assert_eq!(out.skipped_locked, 1);
        assert_eq!(blocks[0].activity, Activity::Work);
        assert_eq!(blocks[1].activity, Activity::Downtime);
    }

    #[test]
    fn adjustment_outside_any_block_is_not_found() {
        let mut blocks = vec![TimetableBlock::new("emp_1", at(9, 0), Activity::Work)];
        let range = DateRange::new(at(12, 0), at(13, 0)).unwrap();
        let err = apply_adjustment(&mut blocks, "emp_1", range, &Adjustment::AddWork, at(9, 0))
            .unwrap_err();
        assert!(matches!(err, WfmError::NotFound(_)));
    }

    #[test]
    fn assign_project_records_project_id() {
        let mut blocks = vec![TimetableBlock::new("emp_1", at(9, 0), Activity::Work)];
        let range = DateRange::new(at(9, 0), at(9, 15)).unwrap();
        let out = apply_adjustment(
            &mut blocks,
            "emp_1",
            range,
            &Adjustment::AssignProject("proj_42".into()),
            at(9, 0),
        )
        .unwrap();
        assert_eq!(out.changed, 1);
        assert_eq!(blocks[0].activity, Activity::Project);
        assert_eq!(blocks[0].project_id.as_deref(), Some("proj_42"));
    }
}
