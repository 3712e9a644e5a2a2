//! Parse agent activity interval exports.
//!
//! Expected header: `agent_id,date,time,login_sec,productive_sec,break_sec,group_id`.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use rota_core::telemetry::AgentActivityInterval;
use rota_core::time::local_to_utc;

pub fn parse_activity_csv(path: impl AsRef<Path>, tz: &str) -> Result<Vec<AgentActivityInterval>> {
    let file = std::fs::File::open(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;
    parse_activity_reader(file, tz)
}

pub fn parse_activity_reader(reader: impl Read, tz: &str) -> Result<Vec<AgentActivityInterval>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let (Some(agent_id), Some(date), Some(time)) =
            (record.get(0), record.get(1), record.get(2))
        else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            continue;
        };
        let Ok(start) = local_to_utc(date, time, tz) else {
            continue;
        };
        let parse_sec = |i: usize| {
            record
                .get(i)
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0)
        };

        out.push(AgentActivityInterval {
            agent_id: agent_id.to_string(),
            start,
            login_sec: parse_sec(3),
            productive_sec: parse_sec(4),
            break_sec: parse_sec(5),
            group_id: record.get(6).unwrap_or("group_default").to_string(),
        });
    }
    Ok(out)
}
