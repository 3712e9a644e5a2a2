//! Real-time violation monitor: a change-driven task and a periodic batch
//! sweep, coordinated through the shared bounded alert queue.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rota_core::compliance::{BulkReport, ComplianceEngine, aggregate_work_data};
use rota_core::config::MonitorConfig;
use rota_core::error::{WfmError, WfmResult};
use rota_core::interval::DateRange;
use rota_core::violation::Alert;
use rota_gateway::Gateway;

use crate::alerts::{AlertQueue, DedupSet, ProcessorSettings, run_alert_processor};
use crate::bulk::BulkValidator;
use crate::progress::ValidationRegistry;

/// Changes seen in one tick at or above which the monitor speeds up.
const LOAD_THRESHOLD: usize = 20;
/// Extra sleep after an upstream failure.
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Look-back window for the change feed.
fn change_window() -> ChronoDuration {
    ChronoDuration::minutes(5)
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub realtime_period: Duration,
    pub realtime_period_under_load: Duration,
    pub batch_period: Duration,
    pub cooldown_sec: u64,
    pub queue_capacity: usize,
    pub batch_size: usize,
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(cfg: &MonitorConfig) -> Self {
        Self {
            realtime_period: Duration::from_secs(cfg.realtime_period_sec),
            realtime_period_under_load: Duration::from_secs(cfg.realtime_period_under_load_sec),
            batch_period: Duration::from_secs(cfg.batch_period_sec),
            cooldown_sec: cfg.cooldown_sec,
            queue_capacity: cfg.queue_capacity,
            batch_size: cfg.batch_size,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

#[derive(Debug, Default)]
struct Counters {
    violations_detected: AtomicU64,
    alerts_enqueued: AtomicU64,
    ticks: AtomicU64,
    sweeps: AtomicU64,
    employees_checked: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub violations_detected: u64,
    pub alerts_enqueued: u64,
    pub alerts_deduplicated: u64,
    pub alerts_rejected: u64,
    pub ticks: u64,
    pub sweeps: u64,
    pub employees_checked: u64,
    pub uptime_sec: Option<f64>,
}

pub struct ViolationMonitor {
    gateway: Arc<dyn Gateway>,
    engine: Arc<ComplianceEngine>,
    bulk: BulkValidator,
    settings: MonitorSettings,
    dedup: Arc<DedupSet>,
    queue: Arc<AlertQueue>,
    receiver: Mutex<Option<mpsc::Receiver<Alert>>>,
    counters: Counters,
    started_at: Mutex<Option<DateTime<Utc>>>,
}

impl ViolationMonitor {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        engine: Arc<ComplianceEngine>,
        settings: MonitorSettings,
    ) -> Arc<Self> {
        let (queue, rx) = AlertQueue::bounded(settings.queue_capacity);
        let bulk = BulkValidator::new(
            gateway.clone(),
            engine.clone(),
            Arc::new(ValidationRegistry::new()),
        );
        Arc::new(Self {
            gateway,
            engine,
            bulk,
            settings,
            dedup: Arc::new(DedupSet::new(settings.cooldown_sec)),
            queue,
            receiver: Mutex::new(Some(rx)),
            counters: Counters::default(),
            started_at: Mutex::new(None),
        })
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            violations_detected: self.counters.violations_detected.load(Ordering::Relaxed),
            alerts_enqueued: self.counters.alerts_enqueued.load(Ordering::Relaxed),
            alerts_deduplicated: self.dedup.dropped_count(),
            alerts_rejected: self.queue.rejected_count(),
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            sweeps: self.counters.sweeps.load(Ordering::Relaxed),
            employees_checked: self.counters.employees_checked.load(Ordering::Relaxed),
            uptime_sec: (*self.started_at.lock())
                .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0),
        }
    }

    /// One pass over the recent change feed. Returns the change count so
    /// the loop can adapt its period under load.
    pub async fn realtime_tick(&self, now: DateTime<Utc>) -> WfmResult<usize> {
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        self.refresh_rules_if_stale(now).await;
        let changes = self.gateway.recent_block_changes(now - change_window()).await?;
        if changes.is_empty() {
            return Ok(0);
        }

        let touched: BTreeSet<(String, chrono::NaiveDate)> = changes
            .iter()
            .map(|c| (c.employee_id.clone(), c.block_start.date_naive()))
            .collect();

        for (employee_id, date) in touched {
            self.engine.invalidate(&employee_id);
            if let Err(e) = self.check_employee_day(&employee_id, date, now).await {
                warn!(employee = %employee_id, error = %e, "change evaluation failed");
            }
        }
        Ok(changes.len())
    }

    /// Reload the rule catalog past its TTL; the swap is atomic and
    /// readers keep the old catalog until it lands.
    async fn refresh_rules_if_stale(&self, now: DateTime<Utc>) {
        let catalog = self.engine.catalog();
        if !catalog.is_stale(now) {
            return;
        }
        match self.gateway.load_rules().await {
            Ok(mut fresh) => {
                fresh.loaded_at = now;
                catalog.swap(fresh);
                debug!("rule catalog refreshed");
            }
            Err(e) => warn!(error = %e, "rule catalog refresh failed, keeping previous"),
        }
    }

    /// Evaluate one employee's day and enqueue alerts for fresh violations.
    async fn check_employee_day(
        &self,
        employee_id: &str,
        date: chrono::NaiveDate,
        now: DateTime<Utc>,
    ) -> WfmResult<()> {
        self.counters.employees_checked.fetch_add(1, Ordering::Relaxed);
        let ids = [employee_id.to_string()];
        let employee = self
            .gateway
            .load_employee_profiles(&ids)
            .await?
            .remove(0);

        // A day plus the next morning catches shifts over midnight.
        let day_start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        let range = DateRange::new(day_start, day_start + ChronoDuration::hours(36))?;
        let shifts = self.gateway.load_shifts(range, Some(&ids)).await?;
        let blocks = self.gateway.load_timetable_blocks(range, Some(&ids)).await?;

        let data = aggregate_work_data(&employee, &shifts, &blocks);
        let report = self
            .engine
            .validate_one(&employee, range, &data, false, now)?;
        if report.violations.is_empty() {
            return Ok(());
        }

        self.counters
            .violations_detected
            .fetch_add(report.violations.len() as u64, Ordering::Relaxed);
        self.gateway.persist_violations(&report.violations).await?;

        for violation in &report.violations {
            let alert = Alert::from_violation(violation, &employee.department_id);
            if self.dedup.admit(alert.key(), now) && self.queue.enqueue(alert) {
                self.counters.alerts_enqueued.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Batch sweep over employees active in the last 24 hours; catches
    /// violations the change feed missed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> WfmResult<BulkReport> {
        self.counters.sweeps.fetch_add(1, Ordering::Relaxed);
        let active = self
            .gateway
            .active_employees_since(now - ChronoDuration::hours(24))
            .await?;
        if active.is_empty() {
            return Ok(BulkReport::default());
        }

        let range = DateRange::new(now - ChronoDuration::hours(24), now + ChronoDuration::hours(24))?;
        let report = self
            .bulk
            .validate_employees(active, range, false, None)
            .await?;

        for employee_report in &report.reports {
            if employee_report.violations.is_empty() {
                continue;
            }
            self.gateway
                .persist_violations(&employee_report.violations)
                .await?;
            let profile = self
                .gateway
                .load_employee_profiles(std::slice::from_ref(&employee_report.employee_id))
                .await?
                .remove(0);
            for violation in &employee_report.violations {
                let alert = Alert::from_violation(violation, &profile.department_id);
                if self.dedup.admit(alert.key(), now) && self.queue.enqueue(alert) {
                    self.counters.alerts_enqueued.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        debug!(
            violations = report.violation_count,
            employees = report.total_employees,
            "sweep finished"
        );
        Ok(report)
    }

    /// Spawn the realtime task, the sweep task and the alert processor.
    pub fn start(self: &Arc<Self>) -> MonitorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        *self.started_at.lock() = Some(Utc::now());

        let rx = self
            .receiver
            .lock()
            .take()
            .expect("monitor started twice");
        let processor = tokio::spawn(run_alert_processor(
            rx,
            self.gateway.clone(),
            ProcessorSettings {
                drain_period: Duration::from_secs(60),
                batch_size: self.settings.batch_size,
            },
            stop_rx.clone(),
        ));

        let monitor = self.clone();
        let mut realtime_stop = stop_rx.clone();
        let realtime = tokio::spawn(async move {
            let mut period = monitor.settings.realtime_period;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(period) => {
                        match monitor.realtime_tick(Utc::now()).await {
                            Ok(changes) => {
                                period = if changes >= LOAD_THRESHOLD {
                                    monitor.settings.realtime_period_under_load
                                } else {
                                    monitor.settings.realtime_period
                                };
                            }
                            Err(e) => {
                                warn!(error = %e, "realtime tick failed, backing off");
                                tokio::time::sleep(ERROR_BACKOFF).await;
                            }
                        }
                    }
                    _ = realtime_stop.changed() => break,
                }
            }
            debug!("realtime monitor stopped");
        });

        let monitor = self.clone();
        let mut sweep_stop = stop_rx;
        let sweep = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(monitor.settings.batch_period) => {
                        if let Err(e) = monitor.sweep(Utc::now()).await {
                            warn!(error = %e, "sweep failed, backing off");
                            tokio::time::sleep(ERROR_BACKOFF).await;
                        }
                    }
                    _ = sweep_stop.changed() => break,
                }
            }
            debug!("batch sweep stopped");
        });

        info!("violation monitor started");
        MonitorHandle {
            stop: stop_tx,
            tasks: vec![realtime, sweep, processor],
        }
    }
}

pub struct MonitorHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Signal both tasks, then wait for the processor's final drain.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("violation monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rota_core::block::{Activity, BlockChange, TimetableBlock};
    use rota_core::compliance::NoopCache;
    use rota_core::employee::Employee;
    use rota_core::rules::{RuleCatalog, RuleKind, SharedCatalog};
    use rota_core::shift::Shift;
    use rota_gateway::MemoryGateway;
    use rota_gateway::memory::Department;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap()
    }

    fn engine() -> Arc<ComplianceEngine> {
        let catalog = Arc::new(SharedCatalog::new(
            RuleCatalog::builtin(now()),
            ChronoDuration::hours(24),
        ));
        Arc::new(ComplianceEngine::new(catalog, Box::new(NoopCache)))
    }

    /// Employee on an 11.5h shift: a guaranteed daily-hours violation.
    fn seeded_gateway() -> Arc<MemoryGateway> {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_employees(vec![
            Employee::new("emp_1", "A. Ivanova").with_department("dept_support"),
        ]);
        gw.seed_shifts(vec![Shift::new(
            "s1",
            "emp_1",
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
        )]);
        gw.seed_department(
            "dept_support",
            Department {
                members: vec!["emp_1".to_string()],
                managers: vec!["mgr_1".to_string()],
            },
        );
        gw
    }

    fn block_change(at: DateTime<Utc>) -> BlockChange {
        BlockChange {
            employee_id: "emp_1".to_string(),
            block_start: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            previous: Activity::Work,
            current: Activity::Downtime,
            changed_at: at,
        }
    }

    // Scenario: two identical violations within ten minutes yield exactly
    // one enqueued alert and a dedup count of one.
    #[tokio::test]
    async fn change_tick_detects_and_coalesces() {
        let gw = seeded_gateway();
        let monitor = ViolationMonitor::new(gw.clone(), engine(), MonitorSettings::default());

        gw.push_block_change(block_change(now()));
        let changes = monitor.realtime_tick(now()).await.unwrap();
        assert_eq!(changes, 1);

        gw.push_block_change(block_change(now() + ChronoDuration::minutes(10)));
        monitor
            .realtime_tick(now() + ChronoDuration::minutes(10))
            .await
            .unwrap();

        let stats = monitor.stats();
        assert_eq!(stats.alerts_enqueued, 1);
        assert_eq!(stats.alerts_deduplicated, 1);
        assert!(stats.violations_detected >= 2);
        assert!(gw.violation_count() >= 1);
    }

    #[tokio::test]
    async fn quiet_feed_is_a_no_op() {
        let gw = seeded_gateway();
        let monitor = ViolationMonitor::new(gw, engine(), MonitorSettings::default());
        assert_eq!(monitor.realtime_tick(now()).await.unwrap(), 0);
        assert_eq!(monitor.stats().alerts_enqueued, 0);
    }

    #[tokio::test]
    async fn sweep_catches_violations_without_change_events() {
        let gw = seeded_gateway();
        let monitor = ViolationMonitor::new(gw.clone(), engine(), MonitorSettings::default());

        let report = monitor.sweep(now()).await.unwrap();
        assert_eq!(report.total_employees, 1);
        assert!(report.violation_count >= 1);
        assert!(report.violations_by_kind.contains_key(&RuleKind::DailyHours));
        assert_eq!(monitor.stats().alerts_enqueued, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_stop_drains_alerts_to_the_gateway() {
        let gw = seeded_gateway();
        let monitor = ViolationMonitor::new(gw.clone(), engine(), MonitorSettings::default());

        gw.push_block_change(block_change(Utc::now()));
        let handle = monitor.start();

        // Let the realtime task tick at least once.
        tokio::time::sleep(Duration::from_secs(6)).await;
        handle.stop().await;

        assert!(gw.alert_count() >= 1, "queued alerts survive shutdown");
        assert!(monitor.stats().uptime_sec.is_some());
    }

    #[tokio::test]
    async fn blocks_reduce_false_positives() {
        // With planned blocks present the aggregates come from the blocks:
        // eight productive hours, no daily-hours violation.
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_employees(vec![
            Employee::new("emp_1", "A").with_department("dept_support"),
        ]);
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        gw.seed_shifts(vec![Shift::new(
            "s1",
            "emp_1",
            date,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        )]);
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut blocks = Vec::new();
        for i in 0..36 {
            let activity = match i {
                4 | 8 | 24 | 28 => Activity::ShortBreak,
                14 | 15 => Activity::Lunch,
                _ => Activity::Work,
            };
            blocks.push(TimetableBlock::new(
                "emp_1",
                start + ChronoDuration::minutes(i * 15),
                activity,
            ));
        }
        gw.persist_timetable_blocks(&blocks).await.unwrap();

        let monitor = ViolationMonitor::new(gw.clone(), engine(), MonitorSettings::default());
        gw.push_block_change(block_change(now()));
        monitor.realtime_tick(now()).await.unwrap();

        let stats = monitor.stats();
        assert_eq!(stats.violations_detected, 0);
        assert_eq!(stats.alerts_enqueued, 0);
    }
}
