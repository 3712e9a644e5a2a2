//! rota-monitor: the long-running side of the core — bulk compliance
//! validation, real-time violation monitoring and live coverage watching.
//!
//! Everything here is structured as tasks taking a stop signal; shutdown
//! is a two-phase drain (stop feeding, then flush queues).

pub mod alerts;
pub mod bulk;
pub mod coverage_watch;
pub mod monitor;
pub mod progress;

pub use alerts::{AlertQueue, DedupSet, ProcessorSettings};
pub use bulk::{BatchPlan, BulkValidator, BATCH_TIMEOUT};
pub use coverage_watch::{CoverageWatch, CoverageWatchHandle, CoverageWatchSettings};
pub use monitor::{MonitorHandle, MonitorSettings, MonitorStats, ViolationMonitor};
pub use progress::{ProgressUpdate, ValidationId, ValidationRegistry};
