//! Live operational dashboard engine: tails worker logs and metrics files,
//! folds event records into counters and a bounded timeline, and renders the
//! shared state for an interactive or headless presentation layer.

pub mod config;
pub mod control;
pub mod error;
pub mod format;
pub mod metrics;
pub mod record;
pub mod simulate;
pub mod snapshot;
pub mod status;
pub mod summary;
pub mod tail;

pub use config::{LiveConfig, MonitorConfig};
pub use control::{Command, ControlLoop, Dashboard, DashboardView, SharedDashboard};
pub use error::MonitorError;
pub use metrics::{Bucket, Counters, MetricsAggregator, RecordFeed, Timeline};
pub use record::EventRecord;
pub use simulate::{SimulationConfig, Simulator};
pub use status::{StatusProbe, VpnStatus};
pub use summary::Summary;
pub use tail::{FileTailer, TailLine};
