//! rota-core: domain model and deterministic compute for the Rota
//! workforce-management core — rules, compliance, planning, assignment
//! optimization and coverage math.

pub mod block;
pub mod compliance;
pub mod config;
pub mod coverage;
pub mod employee;
pub mod error;
pub mod interval;
pub mod optimizer;
pub mod planner;
pub mod rules;
pub mod shift;
pub mod skill;
pub mod stats;
pub mod telemetry;
pub mod time;
pub mod violation;

pub use block::{Activity, BlockChange, BlockUpdate, TimetableBlock};
pub use compliance::{
    aggregate_work_data, compliance_score, BulkReport, ComplianceEngine, ComplianceReport,
    EmployeeWorkData, NoopCache, ResultCache, TtlCache, WorkDay, COMPLIANT_SCORE,
};
pub use config::WfmConfig;
pub use coverage::{
    analyze_coverage, coverage_statistics, cost_impact, find_gaps, CoverageGap, CoverageInterval,
    CoverageStatus, MonitoringEvent, MonitoringEventKind, ThresholdBreach,
};
pub use employee::{AgeCategory, Employee, EmployeeConstraints, EmploymentType, SkillGrade};
pub use error::{ErrorKind, ResultEnvelope, WfmError, WfmResult};
pub use interval::DateRange;
pub use optimizer::{
    assignment_summary, validate_proficiency, MultiSkillOptimizer, OperatorProfile,
    OptimizationResult, OptimizerSettings, SkillDemand, Strategy,
};
pub use planner::{
    apply_adjustment, plan_range, plan_shift, Adjustment, AdjustmentOutcome, PlanObjective,
    PlannedTimetable, SchedulePreference, TimetableTemplate,
};
pub use rules::{PenaltyTier, Rule, RuleCatalog, RuleKind, RuleMatrix, SharedCatalog};
pub use shift::{Shift, ShiftStatus};
pub use skill::{Skill, SkillCategory};
pub use stats::{timetable_statistics, TimetableStatistics};
pub use telemetry::{
    AgentActivityInterval, BreachLevel, ForecastInterval, QueueSnapshot, ThresholdConfig,
    ThresholdDirection, ThresholdMetric,
};
pub use violation::{Alert, AlertStatus, CoalescingKey, Severity, Violation};
