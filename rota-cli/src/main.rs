use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use rota_core::compliance::{ComplianceEngine, NoopCache, TtlCache, aggregate_work_data};
use rota_core::coverage;
use rota_core::interval::DateRange;
use rota_core::optimizer::{
    MultiSkillOptimizer, OperatorProfile, SkillDemand, Strategy, assignment_summary,
    validate_proficiency,
};
use rota_core::planner::{PlanObjective, plan_range};
use rota_core::rules::{RuleCatalog, SharedCatalog};
use rota_core::stats::timetable_statistics;
use rota_gateway::Gateway;
use rota_monitor::{
    BulkValidator, CoverageWatch, CoverageWatchSettings, MonitorSettings, ValidationRegistry,
    ViolationMonitor,
};

mod config;
mod seed;

#[derive(Parser, Debug)]
#[command(
    name = "rota",
    version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("ROTA_BUILD_REV"), ", rules ", env!("ROTA_RULESET_VERSION"), ")"
    ),
    about = "Rota WFM compute core CLI"
)]
struct Cli {
    /// Path to rota.toml (defaults to ROTA_CONFIG or ./rota.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed data directory (overrides the config's data.data_dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a rota.toml with defaults
    ConfigInit,

    /// Validate one employee over a date range
    Validate {
        #[arg(long)]
        employee: String,
        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Exclusive end date (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        /// Reuse cached results when warm
        #[arg(long, default_value_t = false)]
        cached: bool,
    },

    /// Validate a department (or explicit employee list) in batches
    Bulk {
        #[arg(long, conflicts_with = "employees")]
        department: Option<String>,
        /// Comma-separated employee ids
        #[arg(long, value_delimiter = ',')]
        employees: Vec<String>,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },

    /// Generate timetable blocks for every shift on a date
    Timetable {
        #[arg(long)]
        date: NaiveDate,
        /// Template code recorded on the blocks
        #[arg(long, default_value = "default")]
        template: String,
        /// Also shuffle breaks toward forecast coverage
        #[arg(long, default_value_t = false)]
        optimize_coverage: bool,
        /// Persist the generated blocks into the gateway store
        #[arg(long, default_value_t = false)]
        persist: bool,
    },

    /// Run the multi-skill optimizer over an assignment problem file
    Optimize {
        /// JSON file with {"operators": [...], "demands": [...]}
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "priority")]
        strategy: StrategyArg,
    },

    /// Offline coverage analysis for one service on one date
    Coverage {
        #[arg(long)]
        service: String,
        #[arg(long)]
        date: NaiveDate,
    },

    /// Run the violation monitor and coverage watch for a while
    Monitor {
        #[arg(long)]
        service: String,
        #[arg(long, default_value_t = 60)]
        duration_sec: u64,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Priority,
    LoadBalanced,
    CostMinimizing,
    SkillDevelopment,
}

impl From<StrategyArg> for Strategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Priority => Strategy::PriorityBased,
            StrategyArg::LoadBalanced => Strategy::LoadBalanced,
            StrategyArg::CostMinimizing => Strategy::CostMinimizing,
            StrategyArg::SkillDevelopment => Strategy::SkillDevelopment,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AssignmentInput {
    operators: Vec<OperatorProfile>,
    demands: Vec<SkillDemand>,
}

fn day_range(from: NaiveDate, to: NaiveDate) -> Result<DateRange> {
    let start = Utc.from_utc_datetime(&from.and_time(chrono::NaiveTime::MIN));
    let end = Utc.from_utc_datetime(&to.and_time(chrono::NaiveTime::MIN));
    Ok(DateRange::new(start, end)?)
}

fn engine_with(cfg: &config::Config, cached: bool) -> Arc<ComplianceEngine> {
    let catalog = Arc::new(SharedCatalog::new(
        RuleCatalog::builtin(Utc::now()),
        ChronoDuration::seconds(cfg.wfm.compliance.cache_ttl_rules_sec as i64),
    ));
    let cache: Box<dyn rota_core::compliance::ResultCache> = if cached {
        Box::new(TtlCache::new(ChronoDuration::seconds(
            cfg.wfm.compliance.cache_ttl_employee_sec as i64,
        )))
    } else {
        Box::new(NoopCache)
    };
    Arc::new(ComplianceEngine::new(catalog, cache))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    if let Command::ConfigInit = cli.command {
        return config::init_config(&config_path);
    }

    let cfg = config::load_config(&config_path)?;
    let data_dir = cli.data_dir.unwrap_or_else(|| cfg.data.data_dir.clone());
    let gateway = seed::load_gateway(&data_dir, &cfg.data.timezone)
        .with_context(|| format!("seeding from {}", data_dir.display()))?;

    match cli.command {
        Command::ConfigInit => unreachable!("handled above"),

        Command::Validate {
            employee,
            from,
            to,
            cached,
        } => {
            let range = day_range(from, to)?;
            let engine = engine_with(&cfg, cached);
            let ids = [employee.clone()];
            let profile = gateway.load_employee_profiles(&ids).await?.remove(0);
            let shifts = gateway.load_shifts(range, Some(&ids)).await?;
            let blocks = gateway.load_timetable_blocks(range, Some(&ids)).await?;
            let data = aggregate_work_data(&profile, &shifts, &blocks);
            let report = engine.validate_one(&profile, range, &data, cached, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Bulk {
            department,
            employees,
            from,
            to,
        } => {
            let range = day_range(from, to)?;
            let engine = engine_with(&cfg, true);
            let validator = BulkValidator::new(
                gateway.clone(),
                engine,
                Arc::new(ValidationRegistry::new()),
            );

            let (tx, mut rx) = tokio::sync::mpsc::channel::<rota_monitor::progress::ProgressUpdate>(32);
            let progress = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    eprintln!(
                        "progress: {}/{} processed, {} compliant, {} violations, eta {:?}s",
                        update.processed,
                        update.total,
                        update.compliant,
                        update.violations,
                        update.eta_sec.map(|e| e.round())
                    );
                }
            });

            let report = match department {
                Some(dept) => {
                    validator
                        .validate_department(&dept, range, true, Some(tx))
                        .await?
                }
                None if !employees.is_empty() => {
                    validator
                        .validate_employees(employees, range, true, Some(tx))
                        .await?
                }
                None => bail!("pass --department or --employees"),
            };
            progress.await.ok();

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "total_employees": report.total_employees,
                    "compliant_employees": report.compliant_employees,
                    "non_compliant_employees": report.non_compliant_employees,
                    "errors": report.errors,
                    "violation_count": report.violation_count,
                    "violations_by_kind": report.violations_by_kind,
                    "cache_hit_rate": report.cache_hit_rate,
                    "duration_ms": report.duration_ms,
                    "cancelled": report.cancelled,
                }))?
            );
        }

        Command::Timetable {
            date,
            template,
            optimize_coverage,
            persist,
        } => {
            let range = day_range(date, date + ChronoDuration::days(2))?;
            let shifts = gateway.load_shifts(range, None).await?;
            let shifts: Vec<_> = shifts.into_iter().filter(|s| s.date == date).collect();
            if shifts.is_empty() {
                bail!("no shifts on {date}");
            }
            let ids: Vec<String> = shifts.iter().map(|s| s.employee_id.clone()).collect();
            let employees = gateway.load_employee_profiles(&ids).await?;
            let preferences = gateway.load_schedule_preferences(range, &ids).await?;
            let forecasts = gateway.load_forecast(range, None).await?;

            let mut tpl = cfg.wfm.template(&template)?;
            if optimize_coverage {
                tpl.objective = PlanObjective::ServiceLevel;
            }
            let blocks = plan_range(&employees, &shifts, &preferences, &tpl, &forecasts)?;
            let stats = timetable_statistics(&blocks, &tpl);

            if persist {
                let written = gateway.persist_timetable_blocks(&blocks).await?;
                eprintln!("persisted {written} blocks");
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "blocks": blocks,
                    "statistics": stats,
                }))?
            );
        }

        Command::Optimize { input, strategy } => {
            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("read {}", input.display()))?;
            let problem: AssignmentInput =
                serde_json::from_str(&raw).context("parse assignment input")?;
            let optimizer = MultiSkillOptimizer::new(
                problem.operators,
                problem.demands.clone(),
                cfg.wfm.optimizer.settings(),
            )?;
            let result = optimizer.optimize(strategy.into());
            let summary = assignment_summary(&result);
            let violations = validate_proficiency(&result, &problem.demands);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "result": result,
                    "summary": summary,
                    "proficiency_violations": violations,
                }))?
            );
        }

        Command::Coverage { service, date } => {
            let range = day_range(date, date + ChronoDuration::days(1))?;
            let services = [service.clone()];
            let forecasts = gateway.load_forecast(range, Some(&services)).await?;
            if forecasts.is_empty() {
                bail!("no forecast for {service} on {date}");
            }
            let activity = gateway.load_activity(range, None).await?;
            let snapshot = gateway.load_queue_snapshot(&service).await.ok();

            let intervals =
                coverage::analyze_coverage(&forecasts, &activity, snapshot.as_ref(), Utc::now());
            let gaps = coverage::find_gaps(&intervals);
            let cost = coverage::cost_impact(&gaps, None);
            let stats = coverage::coverage_statistics(&intervals);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "intervals": intervals,
                    "gaps": gaps,
                    "cost_impact": cost,
                    "statistics": stats,
                }))?
            );
        }

        Command::Monitor {
            service,
            duration_sec,
        } => {
            let engine = engine_with(&cfg, true);
            let monitor = ViolationMonitor::new(
                gateway.clone(),
                engine,
                MonitorSettings::from(&cfg.wfm.monitor),
            );
            let monitor_handle = monitor.start();

            let watch = Arc::new(CoverageWatch::new(
                gateway.clone(),
                CoverageWatchSettings::default(),
            ));
            let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(64);
            let watch_handle = watch.start(service.clone(), event_tx);

            let printer = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
            });

            tokio::time::sleep(Duration::from_secs(duration_sec)).await;
            watch_handle.stop().await;
            monitor_handle.stop().await;
            printer.await.ok();

            println!(
                "{}",
                serde_json::to_string_pretty(&monitor.stats())?
            );
        }
    }

    Ok(())
}
