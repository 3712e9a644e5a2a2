//! CSV ingestion for seed data: shifts, forecast intervals and agent
//! activity. Each parser skips unparseable rows rather than failing the
//! whole file.

pub mod activity;
pub mod forecast;
pub mod shifts;

pub use activity::parse_activity_csv;
pub use forecast::parse_forecast_csv;
pub use shifts::parse_shifts_csv;
