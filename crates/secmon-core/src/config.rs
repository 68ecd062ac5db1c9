use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOGS_PATTERN: &str = "instance_*.log";
pub const DEFAULT_METRICS_PATTERN: &str = "metrics/*.jsonl";
pub const DEFAULT_STATUS_COMMAND: &str = "piactl";
pub const DEFAULT_REFRESH_MS: u64 = 1000;
pub const DEFAULT_BUCKET_SECS: u32 = 10;

pub const MAX_BUCKETS: usize = 72;
pub const TOP_REGIONS: usize = 6;
pub const TOP_INSTANCES: usize = 6;
pub const REGION_COLUMN_WIDTH: usize = 18;
pub const LOG_BUFFER_LINES: usize = 1000;
pub const LOG_SNAPSHOT_LINES: usize = 200;
pub const SNAPSHOT_TIMELINE_WIDTH: usize = 80;

pub const STATUS_POLL_SECS: u64 = 3;
pub const STATUS_COMMAND_TIMEOUT_MS: u64 = 1500;

pub const REFRESH_STEP_MS: u64 = 100;
pub const MIN_REFRESH_MS: u64 = 200;
pub const MAX_REFRESH_MS: u64 = 5000;
pub const BUCKET_STEP_SECS: u32 = 5;
pub const MIN_BUCKET_SECS: u32 = 1;
pub const MAX_BUCKET_SECS: u32 = 120;

/// Startup configuration handed to the control loop. Built by the binary from
/// flags and environment; carries no parsing concerns of its own.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub logs_pattern: String,
    pub metrics_pattern: String,
    pub refresh: Duration,
    pub bucket_secs: u32,
    pub snapshot_dir: Option<PathBuf>,
    pub quit_after: Option<Duration>,
    pub headless: bool,
    pub simulate: bool,
    pub status_command: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            logs_pattern: DEFAULT_LOGS_PATTERN.to_string(),
            metrics_pattern: DEFAULT_METRICS_PATTERN.to_string(),
            refresh: Duration::from_millis(DEFAULT_REFRESH_MS),
            bucket_secs: DEFAULT_BUCKET_SECS,
            snapshot_dir: None,
            quit_after: None,
            headless: false,
            simulate: false,
            status_command: DEFAULT_STATUS_COMMAND.to_string(),
        }
    }
}

impl MonitorConfig {
    /// Clamp out-of-range values instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        self.refresh = clamp_refresh(self.refresh);
        self.bucket_secs = clamp_bucket(self.bucket_secs);
        if self.quit_after.is_some_and(|d| d.is_zero()) {
            self.quit_after = None;
        }
        if self.status_command.trim().is_empty() {
            self.status_command = DEFAULT_STATUS_COMMAND.to_string();
        }
        self
    }

    pub fn live(&self) -> LiveConfig {
        LiveConfig {
            refresh: clamp_refresh(self.refresh),
            bucket_secs: clamp_bucket(self.bucket_secs),
            paused: false,
        }
    }
}

/// Settings the operator can change while the monitor runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveConfig {
    pub refresh: Duration,
    pub bucket_secs: u32,
    pub paused: bool,
}

impl LiveConfig {
    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn faster(&mut self) {
        let step = Duration::from_millis(REFRESH_STEP_MS);
        self.refresh = clamp_refresh(self.refresh.saturating_sub(step));
    }

    pub fn slower(&mut self) {
        let step = Duration::from_millis(REFRESH_STEP_MS);
        self.refresh = clamp_refresh(self.refresh + step);
    }

    /// Returns true when the width actually changed.
    pub fn bucket_down(&mut self) -> bool {
        let next = clamp_bucket(self.bucket_secs.saturating_sub(BUCKET_STEP_SECS));
        self.replace_bucket(next)
    }

    /// Returns true when the width actually changed.
    pub fn bucket_up(&mut self) -> bool {
        let next = clamp_bucket(self.bucket_secs.saturating_add(BUCKET_STEP_SECS));
        self.replace_bucket(next)
    }

    fn replace_bucket(&mut self, next: u32) -> bool {
        if next == self.bucket_secs {
            return false;
        }
        self.bucket_secs = next;
        true
    }
}

pub fn clamp_refresh(refresh: Duration) -> Duration {
    refresh.clamp(
        Duration::from_millis(MIN_REFRESH_MS),
        Duration::from_millis(MAX_REFRESH_MS),
    )
}

pub fn clamp_bucket(secs: u32) -> u32 {
    secs.clamp(MIN_BUCKET_SECS, MAX_BUCKET_SECS)
}
