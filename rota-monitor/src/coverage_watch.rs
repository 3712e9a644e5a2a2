//! Real-time coverage monitoring: a periodic loop that refreshes the live
//! snapshot for one service and emits exactly one event per tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rota_core::coverage::{
    self, CoverageInterval, MonitoringEvent, MonitoringEventKind, ThresholdBreach,
};
use rota_core::error::{WfmError, WfmResult};
use rota_core::interval::{self, DateRange};
use rota_core::telemetry::{ForecastInterval, ThresholdMetric};
use rota_gateway::Gateway;

/// Budget for one tick's gateway round-trips and analysis.
const TICK_TIMEOUT: Duration = Duration::from_secs(15);
const ERROR_BACKOFF: Duration = Duration::from_secs(10);
/// Service-level history samples kept for trend prediction.
const HISTORY_LEN: usize = 20;

#[derive(Debug, Clone, Copy)]
pub struct CoverageWatchSettings {
    pub period: Duration,
}

impl Default for CoverageWatchSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
        }
    }
}

pub struct CoverageWatch {
    gateway: Arc<dyn Gateway>,
    settings: CoverageWatchSettings,
}

impl CoverageWatch {
    pub fn new(gateway: Arc<dyn Gateway>, settings: CoverageWatchSettings) -> Self {
        Self { gateway, settings }
    }

    /// One refresh: join forecast, activity and the live snapshot for the
    /// current interval, evaluate thresholds, record and return the event.
    pub async fn tick(
        &self,
        service_id: &str,
        history: &mut Vec<(DateTime<Utc>, f64)>,
        now: DateTime<Utc>,
    ) -> WfmResult<MonitoringEvent> {
        let current_interval = interval::floor_to_interval(now);
        let services = [service_id.to_string()];
        let range = DateRange::new(
            current_interval - ChronoDuration::hours(12),
            current_interval + ChronoDuration::hours(12),
        )?;

        let snapshot = self.gateway.load_queue_snapshot(service_id).await?;
        let mut forecasts = self.gateway.load_forecast(range, Some(&services)).await?;
        let activity = self.gateway.load_activity(range, None).await?;

        // No forecast for the live interval: fall back to the inline
        // staffing estimate from offered calls.
        if !forecasts.iter().any(|f| f.start == current_interval) {
            let mut estimated = ForecastInterval::new(
                service_id,
                current_interval,
                coverage::erlang_required(
                    snapshot.calls_waiting as f64,
                    300.0,
                ),
            );
            estimated.avg_handle_time_sec = 300.0;
            forecasts.push(estimated);
        }

        let intervals = coverage::analyze_coverage(&forecasts, &activity, Some(&snapshot), now);
        let current = intervals
            .iter()
            .find(|iv| iv.start == current_interval)
            .cloned()
            .ok_or_else(|| {
                WfmError::Upstream(format!("no coverage computed for {service_id}"))
            })?;

        history.push((now, snapshot.current_service_level));
        if history.len() > HISTORY_LEN {
            history.remove(0);
        }

        let breaches = self
            .evaluate_thresholds(service_id, &current, &snapshot.current_service_level, history)
            .await?;

        let event = MonitoringEvent::new(
            service_id,
            now,
            MonitoringEventKind::CoverageTick {
                coverage: current,
                breaches,
            },
        );
        self.gateway.record_monitoring_event(event.clone()).await?;
        Ok(event)
    }

    async fn evaluate_thresholds(
        &self,
        service_id: &str,
        current: &CoverageInterval,
        service_level: &f64,
        history: &[(DateTime<Utc>, f64)],
    ) -> WfmResult<Vec<ThresholdBreach>> {
        let configs = self.gateway.load_thresholds(service_id).await?;
        let mut breaches = Vec::new();
        for cfg in configs.iter().filter(|c| c.auto_alert) {
            let observed = match cfg.metric {
                ThresholdMetric::ServiceLevel => Some(*service_level),
                ThresholdMetric::Coverage if current.coverage_pct.is_finite() => {
                    Some(current.coverage_pct)
                }
                _ => None,
            };
            let Some(observed) = observed else { continue };
            if let Some(breach) = coverage::evaluate_threshold(cfg, observed, history) {
                breaches.push(breach);
            }
        }
        Ok(breaches)
    }

    /// Run the loop until the stop signal; one event per tick goes to the
    /// subscriber and to the gateway's monitoring log.
    pub fn start(
        self: Arc<Self>,
        service_id: String,
        events: mpsc::Sender<MonitoringEvent>,
    ) -> CoverageWatchHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let watch_loop = tokio::spawn(async move {
            let started = MonitoringEvent::new(&service_id, Utc::now(), MonitoringEventKind::MonitorStarted);
            let _ = self.gateway.record_monitoring_event(started).await;
            info!(service = %service_id, "coverage monitoring started");

            let mut history: Vec<(DateTime<Utc>, f64)> = Vec::new();
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.period) => {
                        let tick = self.tick(&service_id, &mut history, Utc::now());
                        match tokio::time::timeout(TICK_TIMEOUT, tick).await {
                            Ok(Ok(event)) => {
                                if events.send(event).await.is_err() {
                                    debug!(service = %service_id, "subscriber gone, stopping");
                                    break;
                                }
                            }
                            Ok(Err(e)) => {
                                warn!(service = %service_id, error = %e, "coverage tick failed, backing off");
                                tokio::time::sleep(ERROR_BACKOFF).await;
                            }
                            Err(_) => {
                                warn!(service = %service_id, "coverage tick timed out, backing off");
                                tokio::time::sleep(ERROR_BACKOFF).await;
                            }
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            let stopped = MonitoringEvent::new(&service_id, Utc::now(), MonitoringEventKind::MonitorStopped);
            let _ = self.gateway.record_monitoring_event(stopped).await;
            info!(service = %service_id, "coverage monitoring stopped");
        });

        CoverageWatchHandle {
            stop: stop_tx,
            task: watch_loop,
        }
    }
}

pub struct CoverageWatchHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CoverageWatchHandle {
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}
