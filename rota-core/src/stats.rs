//! Timetable statistics: activity mix, interval staffing, per-employee
//! utilization and break spread, reported against template targets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::block::{Activity, TimetableBlock};
use crate::planner::TimetableTemplate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimetableStatistics {
    pub block_count: usize,
    /// Share of blocks per activity.
    pub activity_distribution: BTreeMap<Activity, f64>,
    /// Deviation from the template's target share, per targeted activity.
    pub target_deviation: BTreeMap<Activity, f64>,
    /// Work-staffed headcount per interval.
    pub interval_staffing: BTreeMap<DateTime<Utc>, u32>,
    /// Productive share of each employee's schedulable blocks.
    pub employee_utilization: BTreeMap<String, f64>,
    /// Break blocks per hour of day.
    pub breaks_by_hour: BTreeMap<u32, u32>,
}

pub fn timetable_statistics(
    blocks: &[TimetableBlock],
    template: &TimetableTemplate,
) -> TimetableStatistics {
    let mut stats = TimetableStatistics {
        block_count: blocks.len(),
        ..Default::default()
    };
    if blocks.is_empty() {
        return stats;
    }

    let mut activity_counts: BTreeMap<Activity, usize> = BTreeMap::new();
    let mut per_employee: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for block in blocks {
        *activity_counts.entry(block.activity).or_insert(0) += 1;

        if block.activity == Activity::Work {
            *stats.interval_staffing.entry(block.start).or_insert(0) += 1;
        }
        if block.activity.is_break() {
            use chrono::Timelike;
            *stats.breaks_by_hour.entry(block.start.hour()).or_insert(0) += 1;
        }

        let entry = per_employee.entry(block.employee_id.as_str()).or_insert((0, 0));
        if block.activity != Activity::NotAvailable {
            entry.1 += 1;
            if block.activity.is_productive() {
                entry.0 += 1;
            }
        }
    }

    for (activity, count) in &activity_counts {
        stats
            .activity_distribution
            .insert(*activity, *count as f64 / blocks.len() as f64);
    }
    for (activity, target) in &template.activity_targets {
        let actual = stats.activity_distribution.get(activity).copied().unwrap_or(0.0);
        stats.target_deviation.insert(*activity, actual - target);
    }
    for (employee, (productive, schedulable)) in per_employee {
        let utilization = if schedulable > 0 {
            productive as f64 / schedulable as f64
        } else {
            0.0
        };
        stats.employee_utilization.insert(employee.to_string(), utilization);
    }

    stats
}
