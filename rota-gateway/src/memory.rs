//! In-memory gateway: one `RwLock` over the whole store gives every read
//! call snapshot semantics, and writes apply atomically per call.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use rota_core::block::{BlockChange, BlockUpdate, TimetableBlock};
use rota_core::coverage::MonitoringEvent;
use rota_core::employee::Employee;
use rota_core::error::{WfmError, WfmResult};
use rota_core::interval::DateRange;
use rota_core::planner::SchedulePreference;
use rota_core::rules::RuleCatalog;
use rota_core::shift::Shift;
use rota_core::telemetry::{
    AgentActivityInterval, ForecastInterval, QueueSnapshot, ThresholdConfig,
};
use rota_core::violation::{Alert, Violation};

use crate::Gateway;

#[derive(Debug, Clone, Default)]
pub struct Department {
    pub members: Vec<String>,
    pub managers: Vec<String>,
}

#[derive(Default)]
struct Store {
    employees: HashMap<String, Employee>,
    shifts: Vec<Shift>,
    forecast: Vec<ForecastInterval>,
    activity: Vec<AgentActivityInterval>,
    snapshots: HashMap<String, QueueSnapshot>,
    rules: Option<RuleCatalog>,
    thresholds: HashMap<String, Vec<ThresholdConfig>>,
    preferences: Vec<SchedulePreference>,
    blocks: Vec<TimetableBlock>,
    block_changes: Vec<BlockChange>,
    violations: Vec<Violation>,
    alerts: Vec<Alert>,
    events: Vec<MonitoringEvent>,
    departments: HashMap<String, Department>,
    /// Ids already written; repeated writes with the same id are no-ops.
    written_ids: HashSet<String>,
}

/// Gateway over process memory, used by tests and the CLI's file-seeded runs.
#[derive(Default)]
pub struct MemoryGateway {
    store: RwLock<Store>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_employees(&self, employees: Vec<Employee>) {
        let mut store = self.store.write();
        for e in employees {
            store.employees.insert(e.id.clone(), e);
        }
    }

    pub fn seed_shifts(&self, shifts: Vec<Shift>) {
        self.store.write().shifts.extend(shifts);
    }

    pub fn seed_forecast(&self, forecast: Vec<ForecastInterval>) {
        self.store.write().forecast.extend(forecast);
    }

    pub fn seed_activity(&self, activity: Vec<AgentActivityInterval>) {
        self.store.write().activity.extend(activity);
    }

    pub fn seed_snapshot(&self, snapshot: QueueSnapshot) {
        self.store
            .write()
            .snapshots
            .insert(snapshot.service_id.clone(), snapshot);
    }

    pub fn seed_rules(&self, catalog: RuleCatalog) {
        self.store.write().rules = Some(catalog);
    }

    pub fn seed_preferences(&self, preferences: Vec<SchedulePreference>) {
        self.store.write().preferences.extend(preferences);
    }

    pub fn seed_department(&self, id: impl Into<String>, department: Department) {
        self.store.write().departments.insert(id.into(), department);
    }

    /// Test/ops hook: inject a change event as if a block had been edited.
    pub fn push_block_change(&self, change: BlockChange) {
        self.store.write().block_changes.push(change);
    }

    pub fn alert_count(&self) -> usize {
        self.store.read().alerts.len()
    }

    pub fn violation_count(&self) -> usize {
        self.store.read().violations.len()
    }

    pub fn event_count(&self) -> usize {
        self.store.read().events.len()
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn load_shifts(&self, range: DateRange, employees: Option<&[String]>) -> WfmResult<Vec<Shift>> {
        let store = self.store.read();
        Ok(store
            .shifts
            .iter()
            .filter(|s| s.start_dt() < range.end && s.end_dt() > range.start)
            .filter(|s| employees.is_none_or(|ids| ids.contains(&s.employee_id)))
            .cloned()
            .collect())
    }

    async fn load_forecast(&self, range: DateRange, services: Option<&[String]>) -> WfmResult<Vec<ForecastInterval>> {
        let store = self.store.read();
        let mut out: Vec<ForecastInterval> = store
            .forecast
            .iter()
            .filter(|f| range.contains(f.start))
            .filter(|f| services.is_none_or(|ids| ids.contains(&f.service_id)))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.start, &a.service_id).cmp(&(b.start, &b.service_id)));
        Ok(out)
    }

    async fn load_activity(&self, range: DateRange, employees: Option<&[String]>) -> WfmResult<Vec<AgentActivityInterval>> {
        let store = self.store.read();
        Ok(store
            .activity
            .iter()
            .filter(|a| range.contains(a.start))
            .filter(|a| employees.is_none_or(|ids| ids.contains(&a.agent_id)))
            .cloned()
            .collect())
    }

    async fn load_queue_snapshot(&self, service_id: &str) -> WfmResult<QueueSnapshot> {
        self.store
            .read()
            .snapshots
            .get(service_id)
            .cloned()
            .ok_or_else(|| WfmError::NotFound(format!("queue snapshot for {service_id}")))
    }

    async fn load_rules(&self) -> WfmResult<RuleCatalog> {
        self.store
            .read()
            .rules
            .clone()
            .ok_or_else(|| WfmError::Upstream("rule catalog is not loaded".into()))
    }

    async fn load_thresholds(&self, service_id: &str) -> WfmResult<Vec<ThresholdConfig>> {
        let store = self.store.read();
        match store.thresholds.get(service_id) {
            Some(configs) => Ok(configs.clone()),
            None => Ok(vec![
                ThresholdConfig::service_level_defaults(service_id),
                ThresholdConfig::abandonment_defaults(service_id),
            ]),
        }
    }

    async fn load_employee_profiles(&self, ids: &[String]) -> WfmResult<Vec<Employee>> {
        let store = self.store.read();
        ids.iter()
            .map(|id| {
                store
                    .employees
                    .get(id)
                    .cloned()
                    .ok_or_else(|| WfmError::NotFound(format!("employee {id}")))
            })
            .collect()
    }

    async fn load_schedule_preferences(&self, range: DateRange, employees: &[String]) -> WfmResult<Vec<SchedulePreference>> {
        let store = self.store.read();
        Ok(store
            .preferences
            .iter()
            .filter(|p| employees.contains(&p.employee_id))
            .filter(|p| {
                let day = chrono::TimeZone::from_utc_datetime(&Utc, &p.date.and_time(chrono::NaiveTime::MIN));
                day < range.end && day >= range.start - chrono::Duration::days(1)
            })
            .cloned()
            .collect())
    }

    async fn load_timetable_blocks(&self, range: DateRange, employees: Option<&[String]>) -> WfmResult<Vec<TimetableBlock>> {
        let store = self.store.read();
        Ok(store
            .blocks
            .iter()
            .filter(|b| range.contains(b.start))
            .filter(|b| employees.is_none_or(|ids| ids.contains(&b.employee_id)))
            .cloned()
            .collect())
    }

    async fn recent_block_changes(&self, since: DateTime<Utc>) -> WfmResult<Vec<BlockChange>> {
        let store = self.store.read();
        let mut out: Vec<BlockChange> = store
            .block_changes
            .iter()
            .filter(|c| c.changed_at >= since)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.changed_at);
        Ok(out)
    }

    async fn load_department_members(&self, department_id: &str) -> WfmResult<Vec<String>> {
        self.store
            .read()
            .departments
            .get(department_id)
            .map(|d| d.members.clone())
            .ok_or_else(|| WfmError::NotFound(format!("department {department_id}")))
    }

    async fn load_department_managers(&self, department_id: &str) -> WfmResult<Vec<String>> {
        Ok(self
            .store
            .read()
            .departments
            .get(department_id)
            .map(|d| d.managers.clone())
            .unwrap_or_default())
    }

    async fn active_employees_since(&self, since: DateTime<Utc>) -> WfmResult<Vec<String>> {
        let store = self.store.read();
        let mut ids: Vec<String> = store
            .shifts
            .iter()
            .filter(|s| s.end_dt() >= since)
            .map(|s| s.employee_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn persist_timetable_blocks(&self, blocks: &[TimetableBlock]) -> WfmResult<usize> {
        let mut store = self.store.write();
        // Replace any block occupying the same (employee, interval) slot.
        let mut written = 0;
        for block in blocks {
            store
                .blocks
                .retain(|b| !(b.employee_id == block.employee_id && b.start == block.start));
            store.blocks.push(block.clone());
            written += 1;
        }
        debug!(written, "persisted timetable blocks");
        Ok(written)
    }

    async fn persist_violations(&self, violations: &[Violation]) -> WfmResult<usize> {
        let mut store = self.store.write();
        let mut written = 0;
        for v in violations {
            let id = format!("violation:{}", v.id);
            if store.written_ids.insert(id) {
                store.violations.push(v.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn persist_alerts(&self, alerts: &[Alert]) -> WfmResult<usize> {
        let mut store = self.store.write();
        let mut written = 0;
        for a in alerts {
            let id = format!("alert:{}", a.id);
            if store.written_ids.insert(id) {
                store.alerts.push(a.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn record_monitoring_event(&self, event: MonitoringEvent) -> WfmResult<()> {
        let mut store = self.store.write();
        let id = format!("event:{}", event.id);
        if store.written_ids.insert(id) {
            store.events.push(event);
        }
        Ok(())
    }

    async fn update_block(&self, employee_id: &str, block_start: DateTime<Utc>, changes: BlockUpdate) -> WfmResult<()> {
        let mut store = self.store.write();
        let block = store
            .blocks
            .iter_mut()
            .find(|b| b.employee_id == employee_id && b.start == block_start)
            .ok_or_else(|| {
                WfmError::NotFound(format!("block {employee_id}@{block_start}"))
            })?;

        if block.locked && changes.locked != Some(false) {
            return Err(WfmError::Conflict(format!(
                "block {employee_id}@{block_start} is locked"
            )));
        }

        let previous = block.activity;
        if let Some(activity) = changes.activity {
            block.activity = activity;
        }
        if let Some(skill) = changes.skill_id {
            block.skill_id = skill;
        }
        if let Some(project) = changes.project_id {
            block.project_id = project;
        }
        if let Some(locked) = changes.locked {
            block.locked = locked;
        }

        let current = block.activity;
        if current != previous {
            store.block_changes.push(BlockChange {
                employee_id: employee_id.to_string(),
                block_start,
                previous,
                current,
                changed_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn upsert_threshold_config(&self, config: ThresholdConfig) -> WfmResult<()> {
        config.validate()?;
        let mut store = self.store.write();
        let configs = store
            .thresholds
            .entry(config.service_id.clone())
            .or_default();
        configs.retain(|c| c.metric != config.metric);
        configs.push(config);
        Ok(())
    }
}
