//! Alert queue and processing: bounded intake, coalescing-key cooldown,
//! severity-ordered batch delivery grouped by manager.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use rota_core::violation::{Alert, AlertStatus, CoalescingKey};
use rota_gateway::Gateway;

/// Process-local dedup set: at most one alert per coalescing key within
/// the cooldown window. Expired keys are trimmed on admit.
pub struct DedupSet {
    entries: Mutex<HashMap<CoalescingKey, DateTime<Utc>>>,
    cooldown: ChronoDuration,
    dropped: AtomicU64,
}

impl DedupSet {
    pub fn new(cooldown_sec: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cooldown: ChronoDuration::seconds(cooldown_sec as i64),
            dropped: AtomicU64::new(0),
        }
    }

    /// True when the alert may pass; false counts a suppressed duplicate.
    pub fn admit(&self, key: CoalescingKey, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.lock();
        entries.retain(|_, sealed_at| now - *sealed_at < self.cooldown);
        match entries.get(&key) {
            Some(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            None => {
                entries.insert(key, now);
                true
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Bounded alert intake; a full queue drops with a back-pressure counter.
pub struct AlertQueue {
    tx: mpsc::Sender<Alert>,
    rejected: AtomicU64,
}

impl AlertQueue {
    pub fn bounded(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Alert>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Arc::new(Self {
                tx,
                rejected: AtomicU64::new(0),
            }),
            rx,
        )
    }

    pub fn enqueue(&self, alert: Alert) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => true,
            Err(e) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "alert queue full, dropping alert");
                false
            }
        }
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
    pub drain_period: Duration,
    pub batch_size: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            drain_period: Duration::from_secs(60),
            batch_size: 50,
        }
    }
}

/// Drain the queue every period: order by severity, resolve recipients per
/// department, persist as sent. On the stop signal, drain what is left and
/// exit (two-phase shutdown).
pub async fn run_alert_processor(
    mut rx: mpsc::Receiver<Alert>,
    gateway: Arc<dyn Gateway>,
    settings: ProcessorSettings,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(settings.drain_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                drain_batch(&mut rx, &gateway, settings.batch_size).await;
            }
            _ = stop.changed() => {
                // Final drain before exit.
                loop {
                    let drained = drain_batch(&mut rx, &gateway, settings.batch_size).await;
                    if drained == 0 {
                        break;
                    }
                }
                debug!("alert processor drained and stopped");
                return;
            }
        }
    }
}

async fn drain_batch(
    rx: &mut mpsc::Receiver<Alert>,
    gateway: &Arc<dyn Gateway>,
    batch_size: usize,
) -> usize {
    let mut batch: Vec<Alert> = Vec::with_capacity(batch_size);
    while batch.len() < batch_size {
        match rx.try_recv() {
            Ok(alert) => batch.push(alert),
            Err(_) => break,
        }
    }
    if batch.is_empty() {
        return 0;
    }

    // Critical first; equal severities keep detection order.
    batch.sort_by(|a, b| b.severity.cmp(&a.severity));

    // Group per manager so each recipient gets one delivery per drain.
    let mut by_manager: HashMap<String, Vec<Alert>> = HashMap::new();
    for mut alert in batch {
        let managers = match gateway.load_department_managers(&alert.department_id).await {
            Ok(m) if !m.is_empty() => m,
            Ok(_) => vec!["unassigned".to_string()],
            Err(e) => {
                warn!(error = %e, department = %alert.department_id, "manager lookup failed");
                vec!["unassigned".to_string()]
            }
        };
        alert.recipients = managers.clone();
        alert.status = AlertStatus::Sent;
        by_manager
            .entry(managers[0].clone())
            .or_default()
            .push(alert);
    }

    let mut delivered = 0;
    for (manager, alerts) in by_manager {
        match gateway.persist_alerts(&alerts).await {
            Ok(written) => {
                delivered += alerts.len();
                debug!(manager = %manager, written, "alert batch delivered");
            }
            Err(e) => warn!(manager = %manager, error = %e, "alert batch delivery failed"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rota_core::rules::{PenaltyTier, RuleKind};
    use rota_core::violation::{Severity, Violation};
    use rota_gateway::MemoryGateway;

    fn violation(employee: &str, rule: RuleKind, observed: f64) -> Violation {
        Violation::new(
            employee,
            rule,
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap(),
            observed,
            8.0,
            PenaltyTier::Fine,
            "over cap",
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap()
    }

    // Scenario: two identical violations within ten minutes produce one
    // alert and one suppressed duplicate.
    #[test]
    fn cooldown_suppresses_duplicates_within_the_window() {
        let dedup = DedupSet::new(3_600);
        let alert = Alert::from_violation(&violation("emp_1", RuleKind::DailyHours, 11.0), "dept_1");

        assert!(dedup.admit(alert.key(), now()));
        assert!(!dedup.admit(alert.key(), now() + ChronoDuration::minutes(10)));
        assert_eq!(dedup.dropped_count(), 1);

        // Past the cooldown the key is admitted again.
        assert!(dedup.admit(alert.key(), now() + ChronoDuration::minutes(61)));
    }

    #[test]
    fn different_days_do_not_coalesce() {
        let dedup = DedupSet::new(3_600);
        let a = Alert::from_violation(&violation("emp_1", RuleKind::DailyHours, 11.0), "dept_1");
        let mut b = a.clone();
        b.shift_date = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        assert!(dedup.admit(a.key(), now()));
        assert!(dedup.admit(b.key(), now()));
        assert_eq!(dedup.dropped_count(), 0);
    }

    #[tokio::test]
    async fn full_queue_counts_rejections() {
        let (queue, _rx) = AlertQueue::bounded(2);
        let alert = Alert::from_violation(&violation("emp_1", RuleKind::DailyHours, 11.0), "dept_1");
        assert!(queue.enqueue(alert.clone()));
        assert!(queue.enqueue(alert.clone()));
        assert!(!queue.enqueue(alert));
        assert_eq!(queue.rejected_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn processor_delivers_by_severity_and_drains_on_stop() {
        let gw = Arc::new(MemoryGateway::new());
        gw.seed_department(
            "dept_1",
            rota_gateway::memory::Department {
                members: vec![],
                managers: vec!["mgr_1".to_string()],
            },
        );

        let (queue, rx) = AlertQueue::bounded(100);
        let (stop_tx, stop_rx) = watch::channel(false);
        let processor = tokio::spawn(run_alert_processor(
            rx,
            gw.clone() as Arc<dyn Gateway>,
            ProcessorSettings::default(),
            stop_rx,
        ));

        let mut low = Alert::from_violation(&violation("emp_1", RuleKind::BreakQuota, 50.0), "dept_1");
        low.severity = Severity::Low;
        let mut critical = Alert::from_violation(&violation("emp_2", RuleKind::DailyHours, 16.5), "dept_1");
        critical.severity = Severity::Critical;
        queue.enqueue(low);
        queue.enqueue(critical);

        // Stop immediately: the final drain must still deliver both.
        stop_tx.send(true).unwrap();
        processor.await.unwrap();

        assert_eq!(gw.alert_count(), 2);
    }
}
