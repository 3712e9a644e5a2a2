//! Load seed data files into the in-memory gateway.
//!
//! Layout of a data directory:
//!   employees.json   - Vec<Employee>
//!   shifts.csv       - id,employee_id,date,start,end,status
//!   forecast.csv     - service_id,date,time,required_agents,sl_target,aht_sec
//!   activity.csv     - agent_id,date,time,login_sec,productive_sec,break_sec,group_id
//!   snapshot.json    - QueueSnapshot (optional)
//!   preferences.json - Vec<SchedulePreference> (optional)
//!   departments.json - map of department id to {members, managers} (optional)

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;

use rota_core::employee::Employee;
use rota_core::planner::SchedulePreference;
use rota_core::rules::RuleCatalog;
use rota_core::telemetry::QueueSnapshot;
use rota_gateway::MemoryGateway;
use rota_gateway::memory::Department;
use rota_gateway::parsers::{parse_activity_csv, parse_forecast_csv, parse_shifts_csv};

#[derive(Debug, Deserialize)]
struct DepartmentSeed {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    managers: Vec<String>,
}

pub fn load_gateway(data_dir: &Path, tz: &str) -> Result<Arc<MemoryGateway>> {
    let gw = Arc::new(MemoryGateway::new());
    gw.seed_rules(RuleCatalog::builtin(Utc::now()));

    let employees_path = data_dir.join("employees.json");
    if employees_path.exists() {
        let raw = fs::read_to_string(&employees_path)
            .with_context(|| format!("read {}", employees_path.display()))?;
        let employees: Vec<Employee> =
            serde_json::from_str(&raw).context("parse employees.json")?;
        for e in &employees {
            e.validate().map_err(|err| anyhow::anyhow!("{}: {err}", e.id))?;
        }
        gw.seed_employees(employees);
    }

    let shifts_path = data_dir.join("shifts.csv");
    if shifts_path.exists() {
        gw.seed_shifts(parse_shifts_csv(&shifts_path)?);
    }

    let forecast_path = data_dir.join("forecast.csv");
    if forecast_path.exists() {
        gw.seed_forecast(parse_forecast_csv(&forecast_path, tz)?);
    }

    let activity_path = data_dir.join("activity.csv");
    if activity_path.exists() {
        gw.seed_activity(parse_activity_csv(&activity_path, tz)?);
    }

    let snapshot_path = data_dir.join("snapshot.json");
    if snapshot_path.exists() {
        let raw = fs::read_to_string(&snapshot_path)?;
        let snapshot: QueueSnapshot = serde_json::from_str(&raw).context("parse snapshot.json")?;
        gw.seed_snapshot(snapshot);
    }

    let preferences_path = data_dir.join("preferences.json");
    if preferences_path.exists() {
        let raw = fs::read_to_string(&preferences_path)?;
        let preferences: Vec<SchedulePreference> =
            serde_json::from_str(&raw).context("parse preferences.json")?;
        gw.seed_preferences(preferences);
    }

    let departments_path = data_dir.join("departments.json");
    if departments_path.exists() {
        let raw = fs::read_to_string(&departments_path)?;
        let departments: HashMap<String, DepartmentSeed> =
            serde_json::from_str(&raw).context("parse departments.json")?;
        for (id, seed) in departments {
            gw.seed_department(
                id,
                Department {
                    members: seed.members,
                    managers: seed.managers,
                },
            );
        }
    }

    Ok(gw)
}
