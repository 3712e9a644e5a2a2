//! Parse shift rosters exported as CSV.
//!
//! Expected header: `id,employee_id,date,start,end,status`
//! with local times like `09:00` and ISO dates.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;

use rota_core::shift::{Shift, ShiftStatus};
use rota_core::time::parse_hm;

fn status_from(raw: &str) -> ShiftStatus {
    match raw.trim().to_lowercase().as_str() {
        "confirmed" => ShiftStatus::Confirmed,
        "published" => ShiftStatus::Published,
        _ => ShiftStatus::Scheduled,
    }
}

pub fn parse_shifts_csv(path: impl AsRef<Path>) -> Result<Vec<Shift>> {
    let file = std::fs::File::open(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;
    parse_shifts_reader(file)
}

pub fn parse_shifts_reader(reader: impl Read) -> Result<Vec<Shift>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let time_like = Regex::new(r"^\d{1,2}:\d{2}$").expect("static pattern");
    let mut shifts = Vec::new();

    for result in rdr.records() {
        let record = result?;
        let (Some(id), Some(employee_id), Some(date), Some(start), Some(end)) = (
            record.get(0),
            record.get(1),
            record.get(2),
            record.get(3),
            record.get(4),
        ) else {
            continue;
        };
        if id.is_empty() || !time_like.is_match(start) || !time_like.is_match(end) {
            continue;
        }
        let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
            continue;
        };
        let (Ok(start), Ok(end)) = (parse_hm(start), parse_hm(end)) else {
            continue;
        };

        let shift = Shift::new(id, employee_id, date, start, end)
            .with_status(status_from(record.get(5).unwrap_or("scheduled")));
        if shift.validate().is_ok() {
            shifts.push(shift);
        }
    }
    Ok(shifts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_rows_and_skips_garbage() {
        let csv = "id,employee_id,date,start,end,status\n\
                   s1,emp_1,2026-03-02,09:00,17:00,published\n\
                   s2,emp_1,2026-03-02,22:00,06:00,confirmed\n\
                   bad,emp_2,not-a-date,09:00,17:00,scheduled\n\
                   s3,emp_2,2026-03-03,9 AM,17:00,scheduled\n";
        let shifts = parse_shifts_reader(csv.as_bytes()).unwrap();
        assert_eq!(shifts.len(), 2);
        assert_eq!(shifts[0].status, ShiftStatus::Published);
        assert!(shifts[1].crosses_midnight());
    }

    #[test]
    fn unaligned_times_are_dropped() {
        let csv = "id,employee_id,date,start,end,status\n\
                   s1,emp_1,2026-03-02,09:10,17:00,published\n";
        let shifts = parse_shifts_reader(csv.as_bytes()).unwrap();
        assert!(shifts.is_empty());
    }
}
