//! Time utilities: timezone-aware boundary parsing for ingestion.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse a local date + "HH:MM" time-of-day in an IANA tz like
/// "Europe/Moscow", returning UTC.
pub fn local_to_utc(date: NaiveDate, time: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;

    let tod = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|e| anyhow::anyhow!("invalid time-of-day '{time}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&date.and_time(tod))
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {date} {time} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

/// Parse a bare "HH:MM" time-of-day.
pub fn parse_hm(time: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|e| anyhow::anyhow!("invalid time-of-day '{time}': {e}"))
}
