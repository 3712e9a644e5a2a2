//! rota-gateway: the repository gateway behind which all persisted state
//! lives. Reads are point-in-time consistent within a call; writes are
//! transactional per call and idempotent under client-supplied ids.

pub mod memory;
pub mod parsers;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rota_core::block::{BlockChange, BlockUpdate, TimetableBlock};
use rota_core::coverage::MonitoringEvent;
use rota_core::employee::Employee;
use rota_core::error::WfmResult;
use rota_core::interval::DateRange;
use rota_core::planner::SchedulePreference;
use rota_core::rules::RuleCatalog;
use rota_core::shift::Shift;
use rota_core::telemetry::{
    AgentActivityInterval, ForecastInterval, QueueSnapshot, ThresholdConfig,
};
use rota_core::violation::{Alert, Violation};

pub use memory::MemoryGateway;

/// Strongly typed read/write surface over persisted state.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn load_shifts(&self, range: DateRange, employees: Option<&[String]>) -> WfmResult<Vec<Shift>>;

    async fn load_forecast(&self, range: DateRange, services: Option<&[String]>) -> WfmResult<Vec<ForecastInterval>>;

    async fn load_activity(&self, range: DateRange, employees: Option<&[String]>) -> WfmResult<Vec<AgentActivityInterval>>;

    async fn load_queue_snapshot(&self, service_id: &str) -> WfmResult<QueueSnapshot>;

    async fn load_rules(&self) -> WfmResult<RuleCatalog>;

    async fn load_thresholds(&self, service_id: &str) -> WfmResult<Vec<ThresholdConfig>>;

    async fn load_employee_profiles(&self, ids: &[String]) -> WfmResult<Vec<Employee>>;

    async fn load_schedule_preferences(&self, range: DateRange, employees: &[String]) -> WfmResult<Vec<SchedulePreference>>;

    async fn load_timetable_blocks(&self, range: DateRange, employees: Option<&[String]>) -> WfmResult<Vec<TimetableBlock>>;

    /// Block mutations since the given instant, oldest first.
    async fn recent_block_changes(&self, since: DateTime<Utc>) -> WfmResult<Vec<BlockChange>>;

    /// Employee ids of a department.
    async fn load_department_members(&self, department_id: &str) -> WfmResult<Vec<String>>;

    /// Manager ids responsible for a department.
    async fn load_department_managers(&self, department_id: &str) -> WfmResult<Vec<String>>;

    /// Employees with shifts touching the last `since` window.
    async fn active_employees_since(&self, since: DateTime<Utc>) -> WfmResult<Vec<String>>;

    async fn persist_timetable_blocks(&self, blocks: &[TimetableBlock]) -> WfmResult<usize>;

    async fn persist_violations(&self, violations: &[Violation]) -> WfmResult<usize>;

    async fn persist_alerts(&self, alerts: &[Alert]) -> WfmResult<usize>;

    async fn record_monitoring_event(&self, event: MonitoringEvent) -> WfmResult<()>;

    /// Apply a field-level update to one block. Locked blocks conflict.
    async fn update_block(&self, employee_id: &str, block_start: DateTime<Utc>, changes: BlockUpdate) -> WfmResult<()>;

    async fn upsert_threshold_config(&self, config: ThresholdConfig) -> WfmResult<()>;
}
