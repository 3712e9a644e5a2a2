//! Bulk compliance validation: adaptive batching, bounded concurrency and
//! progressive aggregation.
//!
//! Each batch preloads its employees' shifts and blocks in one gateway
//! round-trip, then evaluates in memory on the blocking pool; the hot path
//! never calls the gateway per employee.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use rota_core::compliance::{BulkReport, ComplianceEngine, ComplianceReport, aggregate_work_data};
use rota_core::error::{WfmError, WfmResult};
use rota_core::interval::DateRange;
use rota_gateway::Gateway;

use crate::progress::{ProgressUpdate, ValidationId, ValidationRegistry};

pub const BATCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub max_concurrent: usize,
}

impl BatchPlan {
    /// Size batches to the population and concurrency to the host.
    pub fn for_population(total: usize, cores: usize) -> Self {
        let (batch_size, cap) = match total {
            0..=100 => (25, 4),
            101..=1000 => (50, 8),
            _ => (100, 12),
        };
        Self {
            batch_size,
            max_concurrent: cap.min(cores.max(1)),
        }
    }
}

pub struct BulkValidator {
    gateway: Arc<dyn Gateway>,
    engine: Arc<ComplianceEngine>,
    registry: Arc<ValidationRegistry>,
}

impl BulkValidator {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        engine: Arc<ComplianceEngine>,
        registry: Arc<ValidationRegistry>,
    ) -> Self {
        Self {
            gateway,
            engine,
            registry,
        }
    }

    pub fn registry(&self) -> Arc<ValidationRegistry> {
        self.registry.clone()
    }

    /// Validate a whole department.
    pub async fn validate_department(
        &self,
        department_id: &str,
        range: DateRange,
        use_cache: bool,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
    ) -> WfmResult<BulkReport> {
        let members = self.gateway.load_department_members(department_id).await?;
        self.validate_employees(members, range, use_cache, progress)
            .await
    }

    /// Validate a list of employees, reporting progress after every batch.
    ///
    /// Cancellation via the registry lets in-flight batches finish and
    /// returns the partial aggregate with `cancelled = true`.
    pub async fn validate_employees(
        &self,
        employee_ids: Vec<String>,
        range: DateRange,
        use_cache: bool,
        progress: Option<mpsc::Sender<ProgressUpdate>>,
    ) -> WfmResult<BulkReport> {
        let started = Instant::now();
        let total = employee_ids.len();
        let (validation_id, slot) = self.registry.register(total);
        let plan = BatchPlan::for_population(total, num_cpus::get());
        debug!(
            validation_id,
            total,
            batch_size = plan.batch_size,
            max_concurrent = plan.max_concurrent,
            "starting bulk validation"
        );

        let semaphore = Arc::new(Semaphore::new(plan.max_concurrent));
        let mut join_set: JoinSet<(usize, Vec<Result<ComplianceReport, WfmError>>)> =
            JoinSet::new();

        let batches: Vec<Vec<String>> = employee_ids
            .chunks(plan.batch_size)
            .map(|c| c.to_vec())
            .collect();
        let mut cancelled = false;
        let mut scheduled = 0usize;

        for (index, batch) in batches.into_iter().enumerate() {
            if slot.is_cancelled() {
                cancelled = true;
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WfmError::Cancelled("validator shut down".into()))?;
            scheduled += batch.len();
            let gateway = self.gateway.clone();
            let engine = self.engine.clone();
            join_set.spawn(async move {
                let _permit = permit;
                let outcomes = run_batch(gateway, engine, batch, range, use_cache).await;
                (index, outcomes)
            });
        }

        // Collect in completion order; progress updates follow it.
        let mut by_batch: HashMap<usize, Vec<Result<ComplianceReport, WfmError>>> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            let (index, outcomes) = match joined {
                Ok(v) => v,
                Err(e) => {
                    warn!(validation_id, error = %e, "batch task panicked");
                    continue;
                }
            };

            let update = {
                slot.update(|p| {
                    p.processed += outcomes.len();
                    for o in &outcomes {
                        match o {
                            Ok(r) if r.compliant => p.compliant += 1,
                            Ok(r) => p.violations += r.violations.len(),
                            Err(_) => p.errors += 1,
                        }
                    }
                    p.elapsed_sec = started.elapsed().as_secs_f64();
                    p.eta_sec = if p.processed > 0 {
                        let per_employee = p.elapsed_sec / p.processed as f64;
                        Some(per_employee * (p.total - p.processed) as f64)
                    } else {
                        None
                    };
                });
                slot.snapshot()
            };
            if let Some(tx) = &progress {
                let _ = tx.send(update).await;
            }
            by_batch.insert(index, outcomes);
        }

        // Cancelled-before-scheduling employees never ran.
        let mut all: Vec<Result<ComplianceReport, WfmError>> = Vec::with_capacity(scheduled);
        let mut indexes: Vec<usize> = by_batch.keys().copied().collect();
        indexes.sort_unstable();
        for i in indexes {
            all.extend(by_batch.remove(&i).expect("key from keys()"));
        }

        let report = BulkReport::aggregate(all, started.elapsed().as_millis() as u64, cancelled);
        slot.update(|p| {
            p.finished = true;
            p.cancelled = cancelled;
            p.elapsed_sec = started.elapsed().as_secs_f64();
            p.eta_sec = None;
        });
        if let Some(tx) = &progress {
            let _ = tx.send(slot.snapshot()).await;
        }
        debug!(
            validation_id,
            compliant = report.compliant_employees,
            violations = report.violation_count,
            cancelled,
            "bulk validation finished"
        );
        Ok(report)
    }

    pub fn cancel(&self, id: ValidationId) -> bool {
        self.registry.cancel(id)
    }
}

/// Preload one batch, then evaluate every employee against the preloaded
/// data on the blocking pool. A batch overrunning its budget times out
/// per employee, not per run.
async fn run_batch(
    gateway: Arc<dyn Gateway>,
    engine: Arc<ComplianceEngine>,
    batch: Vec<String>,
    range: DateRange,
    use_cache: bool,
) -> Vec<Result<ComplianceReport, WfmError>> {
    let work = async {
        let employees = load_profiles_lenient(&gateway, &batch).await;
        let shifts = gateway.load_shifts(range, Some(&batch)).await?;
        let blocks = gateway.load_timetable_blocks(range, Some(&batch)).await?;

        let outcomes = tokio::task::spawn_blocking(move || {
            let now = Utc::now();
            employees
                .into_iter()
                .map(|profile| {
                    let employee = profile?;
                    let data = aggregate_work_data(&employee, &shifts, &blocks);
                    engine.validate_one(&employee, range, &data, use_cache, now)
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| WfmError::Upstream(format!("evaluation pool failed: {e}")))?;
        Ok::<_, WfmError>(outcomes)
    };

    match tokio::time::timeout(BATCH_TIMEOUT, work).await {
        Ok(Ok(outcomes)) => outcomes,
        Ok(Err(e)) => batch.iter().map(|_| Err(e.clone())).collect(),
        Err(_) => batch
            .iter()
            .map(|id| Err(WfmError::Timeout(format!("batch evaluation for {id}"))))
            .collect(),
    }
}

/// Per-employee profile lookups; a missing employee fails that employee
/// only, not the batch.
async fn load_profiles_lenient(
    gateway: &Arc<dyn Gateway>,
    batch: &[String],
) -> Vec<WfmResult<rota_core::employee::Employee>> {
    let mut out = Vec::with_capacity(batch.len());
    for id in batch {
        out.push(
            gateway
                .load_employee_profiles(std::slice::from_ref(id))
                .await
                .map(|mut v| v.remove(0)),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone};
    use rota_core::compliance::NoopCache;
    use rota_core::employee::Employee;
    use rota_core::rules::{RuleCatalog, SharedCatalog};
    use rota_core::shift::Shift;
    use rota_gateway::MemoryGateway;

    fn engine() -> Arc<ComplianceEngine> {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let catalog = Arc::new(SharedCatalog::new(
            RuleCatalog::builtin(now),
            ChronoDuration::hours(24),
        ));
        Arc::new(ComplianceEngine::new(catalog, Box::new(NoopCache)))
    }

    fn range() -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn seeded_gateway(employees: usize) -> Arc<MemoryGateway> {
        let gw = Arc::new(MemoryGateway::new());
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut profiles = Vec::new();
        let mut shifts = Vec::new();
        for i in 0..employees {
            let id = format!("emp_{i:03}");
            profiles.push(Employee::new(&id, format!("Employee {i}")));
            // Every third employee works a 12h day and is non-compliant.
            let end = if i % 3 == 0 {
                NaiveTime::from_hms_opt(21, 0, 0).unwrap()
            } else {
                NaiveTime::from_hms_opt(17, 0, 0).unwrap()
            };
            shifts.push(Shift::new(
                format!("s_{i:03}"),
                &id,
                date,
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end,
            ));
        }
        gw.seed_employees(profiles);
        gw.seed_shifts(shifts);
        gw
    }

    #[test]
    fn batch_plan_follows_population_table() {
        assert_eq!(BatchPlan::for_population(80, 16), BatchPlan { batch_size: 25, max_concurrent: 4 });
        assert_eq!(BatchPlan::for_population(500, 16), BatchPlan { batch_size: 50, max_concurrent: 8 });
        assert_eq!(BatchPlan::for_population(5000, 16), BatchPlan { batch_size: 100, max_concurrent: 12 });
        // Concurrency never exceeds the cores available.
        assert_eq!(BatchPlan::for_population(500, 2).max_concurrent, 2);
    }

    #[tokio::test]
    async fn bulk_run_aggregates_and_reports_progress() {
        let gw = seeded_gateway(60);
        let validator = BulkValidator::new(gw, engine(), Arc::new(ValidationRegistry::new()));
        let ids: Vec<String> = (0..60).map(|i| format!("emp_{i:03}")).collect();
        let (tx, mut rx) = mpsc::channel(16);

        let report = validator
            .validate_employees(ids, range(), false, Some(tx))
            .await
            .unwrap();

        assert_eq!(report.total_employees, 60);
        assert_eq!(
            report.total_employees,
            report.compliant_employees + report.non_compliant_employees + report.errors
        );
        // 0,3,6,... worked 12h: non-compliant count is 20.
        assert_eq!(report.non_compliant_employees, 20);
        assert!(!report.cancelled);

        let mut updates = Vec::new();
        while let Some(u) = rx.recv().await {
            updates.push(u);
        }
        // 60 employees / batches of 25 = 3 batch updates + final.
        assert_eq!(updates.len(), 4);
        assert!(updates.last().unwrap().finished);
        assert_eq!(updates.last().unwrap().processed, 60);
        assert!(updates.windows(2).all(|w| w[0].processed <= w[1].processed));
    }

    #[tokio::test]
    async fn missing_employees_fail_individually() {
        let gw = seeded_gateway(10);
        let validator = BulkValidator::new(gw, engine(), Arc::new(ValidationRegistry::new()));
        let mut ids: Vec<String> = (0..10).map(|i| format!("emp_{i:03}")).collect();
        ids.push("ghost".to_string());

        let report = validator
            .validate_employees(ids, range(), false, None)
            .await
            .unwrap();
        assert_eq!(report.total_employees, 11);
        assert_eq!(report.errors, 1);
    }

    #[tokio::test]
    async fn warm_cache_rerun_hits_every_employee() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let catalog = Arc::new(SharedCatalog::new(
            RuleCatalog::builtin(now),
            ChronoDuration::hours(24),
        ));
        let engine = Arc::new(ComplianceEngine::new(
            catalog,
            Box::new(rota_core::compliance::TtlCache::default()),
        ));
        let gw = seeded_gateway(20);
        let validator = BulkValidator::new(gw, engine, Arc::new(ValidationRegistry::new()));
        let ids: Vec<String> = (0..20).map(|i| format!("emp_{i:03}")).collect();

        let cold = validator
            .validate_employees(ids.clone(), range(), true, None)
            .await
            .unwrap();
        assert_eq!(cold.cache_hit_rate, 0.0);

        let warm = validator
            .validate_employees(ids, range(), true, None)
            .await
            .unwrap();
        assert_eq!(warm.cache_hit_rate, 1.0);
        assert_eq!(warm.violation_count, cold.violation_count);
        assert_eq!(warm.violations_by_kind, cold.violations_by_kind);
    }

    #[tokio::test]
    async fn department_validation_resolves_members() {
        let gw = seeded_gateway(6);
        gw.seed_department(
            "dept_support",
            rota_gateway::memory::Department {
                members: (0..6).map(|i| format!("emp_{i:03}")).collect(),
                managers: vec!["mgr_1".to_string()],
            },
        );
        let validator = BulkValidator::new(gw, engine(), Arc::new(ValidationRegistry::new()));
        let report = validator
            .validate_department("dept_support", range(), false, None)
            .await
            .unwrap();
        assert_eq!(report.total_employees, 6);
    }

    #[tokio::test]
    async fn cancelled_validation_returns_partial_flagged_result() {
        let gw = seeded_gateway(60);
        let registry = Arc::new(ValidationRegistry::new());
        let validator = BulkValidator::new(gw, engine(), registry.clone());
        let ids: Vec<String> = (0..60).map(|i| format!("emp_{i:03}")).collect();

        // Cancel as soon as the first progress update arrives.
        let (tx, mut rx) = mpsc::channel::<ProgressUpdate>(16);
        let registry_for_cancel = registry.clone();
        let canceller = tokio::spawn(async move {
            if let Some(update) = rx.recv().await {
                registry_for_cancel.cancel(update.validation_id);
            }
            while rx.recv().await.is_some() {}
        });

        let report = validator
            .validate_employees(ids, range(), false, Some(tx))
            .await
            .unwrap();
        canceller.await.unwrap();

        // Everything that ran is aggregated; the flag records the cut.
        assert_eq!(
            report.total_employees,
            report.compliant_employees + report.non_compliant_employees + report.errors
        );
        if report.cancelled {
            assert!(report.total_employees <= 60);
        }
    }
}
