//! Parse forecast interval exports.
//!
//! Expected header: `service_id,date,time,required_agents,sl_target,aht_sec`
//! with times local to the given IANA timezone.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use rota_core::telemetry::ForecastInterval;
use rota_core::time::local_to_utc;

pub fn parse_forecast_csv(path: impl AsRef<Path>, tz: &str) -> Result<Vec<ForecastInterval>> {
    let file = std::fs::File::open(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;
    parse_forecast_reader(file, tz)
}

pub fn parse_forecast_reader(reader: impl Read, tz: &str) -> Result<Vec<ForecastInterval>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let (Some(service_id), Some(date), Some(time), Some(required)) =
            (record.get(0), record.get(1), record.get(2), record.get(3))
        else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            continue;
        };
        let Ok(start) = local_to_utc(date, time, tz) else {
            continue;
        };
        let Ok(required_agents) = required.parse::<f64>() else {
            continue;
        };

        let mut interval = ForecastInterval::new(service_id, start, required_agents);
        if let Some(Ok(target)) = record.get(4).map(str::parse::<f64>) {
            interval.service_level_target = target;
        }
        if let Some(Ok(aht)) = record.get(5).map(str::parse::<f64>) {
            interval.avg_handle_time_sec = aht;
        }
        out.push(interval);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_intervals_from_local_times() {
        let csv = "service_id,date,time,required_agents,sl_target,aht_sec\n\
                   svc_1,2026-03-02,12:00,10.5,80,300\n\
                   svc_1,2026-03-02,12:15,9.0,80,300\n";
        let forecast = parse_forecast_reader(csv.as_bytes(), "Europe/Moscow").unwrap();
        assert_eq!(forecast.len(), 2);
        // Moscow noon is 09:00 UTC.
        assert_eq!(forecast[0].start.to_rfc3339(), "2026-03-02T09:00:00+00:00");
        assert_eq!(forecast[0].required_agents, 10.5);
        assert_eq!(forecast[1].avg_handle_time_sec, 300.0);
    }

    #[test]
    fn rows_with_bad_numbers_are_skipped() {
        let csv = "service_id,date,time,required_agents\n\
                   svc_1,2026-03-02,12:00,many\n";
        let forecast = parse_forecast_reader(csv.as_bytes(), "UTC").unwrap();
        assert!(forecast.is_empty());
    }
}
