//! Shared dashboard state and the background workers that drive it.
//!
//! Every mutation goes through one `Mutex`. Workers do their file and process
//! I/O outside the lock and only take it to fold results in; readers take it
//! just long enough to copy a `DashboardView`.

use crate::config::{
    LiveConfig, MonitorConfig, LOG_BUFFER_LINES, MAX_BUCKETS, SNAPSHOT_TIMELINE_WIDTH,
    STATUS_POLL_SECS,
};
use crate::format::SnapshotText;
use crate::metrics::{Bucket, Counters, MetricsAggregator, RecordFeed};
use crate::record::EventRecord;
use crate::snapshot;
use crate::status::{StatusProbe, VpnStatus};
use crate::tail::{FileTailer, TailLine};
use chrono::Utc;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Live commands, independent of any input device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePause,
    Faster,
    Slower,
    BucketDown,
    BucketUp,
    ClearLogs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandEffect {
    None,
    Shutdown,
    Reschedule,
}

/// Point-in-time copy of everything the presentation layer draws.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub live: LiveConfig,
    pub status: VpnStatus,
    pub counters: Counters,
    pub timeline: Vec<Bucket>,
    pub logs: Vec<String>,
    pub ticks: u64,
    pub dropped_lines: u64,
    /// Records counted in totals but older than the timeline window.
    pub untimed_records: u64,
}

#[derive(Debug)]
pub struct Dashboard {
    live: LiveConfig,
    status: VpnStatus,
    aggregator: MetricsAggregator,
    logs: VecDeque<String>,
    log_capacity: usize,
    ticks: u64,
    dropped_lines: u64,
}

impl Dashboard {
    pub fn new(config: &MonitorConfig) -> Self {
        let live = config.live();
        Self {
            live,
            status: VpnStatus::pending(),
            aggregator: MetricsAggregator::new(live.bucket_secs, MAX_BUCKETS),
            logs: VecDeque::with_capacity(LOG_BUFFER_LINES),
            log_capacity: LOG_BUFFER_LINES,
            ticks: 0,
            dropped_lines: 0,
        }
    }

    pub fn live(&self) -> LiveConfig {
        self.live
    }

    pub fn log_len(&self) -> usize {
        self.logs.len()
    }

    pub fn set_status(&mut self, status: VpnStatus) {
        self.status = status;
    }

    pub fn push_log(&mut self, line: String) {
        if self.logs.len() == self.log_capacity {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    /// Merge one tick's worth of input: log lines first, then records, then
    /// advance the timeline to `now_secs`.
    pub fn apply_tick(
        &mut self,
        lines: Vec<TailLine>,
        records: &[EventRecord],
        dropped_lines: u64,
        now_secs: i64,
    ) {
        for line in lines {
            let name = line.file_name();
            self.push_log(format!("[{name}] {}", line.line));
        }
        for record in records {
            self.aggregator.ingest(record, now_secs);
        }
        self.aggregator.ensure_buckets_to(now_secs);
        self.dropped_lines = dropped_lines;
        self.ticks += 1;
    }

    pub fn apply_command(&mut self, command: Command, now_secs: i64) -> CommandEffect {
        match command {
            Command::Quit => CommandEffect::Shutdown,
            Command::TogglePause => {
                self.live.toggle_pause();
                self.push_log(format!("[tui] paused={}", self.live.paused));
                CommandEffect::None
            }
            Command::Faster | Command::Slower => {
                if command == Command::Faster {
                    self.live.faster();
                } else {
                    self.live.slower();
                }
                self.push_log(format!("[tui] refresh={:.1}s", self.live.refresh.as_secs_f64()));
                CommandEffect::Reschedule
            }
            Command::BucketDown | Command::BucketUp => {
                let changed = if command == Command::BucketDown {
                    self.live.bucket_down()
                } else {
                    self.live.bucket_up()
                };
                if changed {
                    self.aggregator.set_bucket_seconds(self.live.bucket_secs);
                    self.aggregator.ensure_buckets_to(now_secs);
                }
                self.push_log(format!("[tui] bucket={}s", self.live.bucket_secs));
                CommandEffect::None
            }
            Command::ClearLogs => {
                self.logs.clear();
                CommandEffect::None
            }
        }
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            live: self.live,
            status: self.status.clone(),
            counters: self.aggregator.counters().clone(),
            timeline: self.aggregator.timeline().to_vec(),
            logs: self.logs.iter().cloned().collect(),
            ticks: self.ticks,
            dropped_lines: self.dropped_lines,
            untimed_records: self.aggregator.untimed_records(),
        }
    }
}

/// Cloneable handle to the lock-guarded dashboard.
#[derive(Clone, Debug)]
pub struct SharedDashboard {
    inner: Arc<Mutex<Dashboard>>,
}

impl SharedDashboard {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dashboard)),
        }
    }

    /// Run `f` under the lock. A panic in another holder does not wedge the
    /// dashboard; the state is still internally consistent between ticks.
    pub fn with<R>(&self, f: impl FnOnce(&mut Dashboard) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn view(&self) -> DashboardView {
        self.with(|dashboard| dashboard.view())
    }
}

/// The ingest worker's file readers plus anything read but not yet merged.
#[derive(Debug)]
pub struct IngestSources {
    logs: FileTailer,
    feed: RecordFeed,
    held_lines: Vec<TailLine>,
    held_records: Vec<EventRecord>,
}

impl IngestSources {
    pub fn new(logs_pattern: impl Into<String>, metrics_pattern: impl Into<String>) -> Self {
        Self {
            logs: FileTailer::new(logs_pattern),
            feed: RecordFeed::new(metrics_pattern),
            held_lines: Vec::new(),
            held_records: Vec::new(),
        }
    }

    /// One ingest pass. Returns `None` while paused; reads happen outside the
    /// lock and the merge happens inside it.
    pub fn tick(&mut self, dashboard: &SharedDashboard, now_secs: i64) -> Option<DashboardView> {
        if dashboard.with(|d| d.live().paused) {
            return None;
        }
        self.read();
        self.merge(dashboard, now_secs)
    }

    /// Log lines are read before metrics records.
    fn read(&mut self) {
        self.held_lines.extend(self.logs.read_new());
        self.held_records.extend(self.feed.poll());
    }

    /// A pause that landed after `read` keeps the batch held for the next
    /// unpaused tick.
    fn merge(&mut self, dashboard: &SharedDashboard, now_secs: i64) -> Option<DashboardView> {
        let dropped = self.feed.dropped_lines();
        dashboard.with(|d| {
            if d.live().paused {
                return None;
            }
            let lines = std::mem::take(&mut self.held_lines);
            let records = std::mem::take(&mut self.held_records);
            d.apply_tick(lines, &records, dropped, now_secs);
            Some(d.view())
        })
    }
}

/// Owns the shared dashboard, the stop signal, and the worker tasks.
pub struct ControlLoop {
    config: MonitorConfig,
    dashboard: SharedDashboard,
    stop_tx: Arc<watch::Sender<bool>>,
    render_tx: Arc<watch::Sender<u64>>,
    reschedule: Arc<Notify>,
    workers: Vec<JoinHandle<()>>,
}

impl ControlLoop {
    pub fn new(config: MonitorConfig) -> Self {
        let config = config.normalized();
        let dashboard = SharedDashboard::new(Dashboard::new(&config));
        let (stop_tx, _) = watch::channel(false);
        let (render_tx, _) = watch::channel(0);
        Self {
            config,
            dashboard,
            stop_tx: Arc::new(stop_tx),
            render_tx: Arc::new(render_tx),
            reschedule: Arc::new(Notify::new()),
            workers: Vec::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn dashboard(&self) -> SharedDashboard {
        self.dashboard.clone()
    }

    /// Bumped after every completed ingest tick.
    pub fn subscribe_renders(&self) -> watch::Receiver<u64> {
        self.render_tx.subscribe()
    }

    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    pub fn is_stopping(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn request_stop(&self) {
        request_stop(&self.stop_tx, "requested");
    }

    /// Apply a live command. Returns true when the command asks to quit.
    pub fn command(&self, command: Command) -> bool {
        let now = Utc::now().timestamp();
        match self.dashboard.with(|d| d.apply_command(command, now)) {
            CommandEffect::Shutdown => {
                self.request_stop();
                true
            }
            CommandEffect::Reschedule => {
                self.reschedule.notify_one();
                false
            }
            CommandEffect::None => false,
        }
    }

    /// Spawn the ingest, status and (optional) deadline workers.
    pub fn start(&mut self) {
        let ingest = IngestWorker {
            dashboard: self.dashboard.clone(),
            pass: Some(IngestPass {
                dashboard: self.dashboard.clone(),
                sources: IngestSources::new(
                    self.config.logs_pattern.clone(),
                    self.config.metrics_pattern.clone(),
                ),
                snapshot_dir: self.config.snapshot_dir.clone(),
            }),
            render_tx: self.render_tx.clone(),
            reschedule: self.reschedule.clone(),
        };
        self.workers
            .push(tokio::spawn(ingest.run(self.stop_tx.subscribe())));

        let probe = StatusProbe::new(self.config.status_command.clone());
        self.workers.push(tokio::spawn(status_loop(
            self.dashboard.clone(),
            probe,
            self.stop_tx.subscribe(),
        )));

        if let Some(after) = self.config.quit_after {
            self.workers.push(tokio::spawn(deadline_watchdog(
                after,
                self.stop_tx.clone(),
                self.stop_tx.subscribe(),
            )));
        }
        info!(
            event = "control_loop_started",
            logs = %self.config.logs_pattern,
            metrics = %self.config.metrics_pattern,
            refresh_ms = self.config.refresh.as_millis() as u64,
            bucket_secs = self.config.bucket_secs
        );
    }

    /// Resolves once the stop signal has been raised.
    pub async fn stopped(&self) {
        let mut stop = self.stop_tx.subscribe();
        let _ = stop.wait_for(|stopping| *stopping).await;
    }

    /// Raise the stop signal and wait for every worker to finish its tick.
    pub async fn shutdown(mut self) {
        self.request_stop();
        for worker in self.workers.drain(..) {
            if let Err(err) = worker.await {
                debug!(event = "worker_join_failed", error = %err);
            }
        }
        info!(event = "control_loop_stopped");
    }
}

fn request_stop(stop_tx: &watch::Sender<bool>, reason: &str) {
    let raised = stop_tx.send_if_modified(|stopping| {
        if *stopping {
            return false;
        }
        *stopping = true;
        true
    });
    if raised {
        info!(event = "stop_requested", reason);
    }
}

/// Blocking half of a tick: file reads, the merge and snapshot writes.
struct IngestPass {
    dashboard: SharedDashboard,
    sources: IngestSources,
    snapshot_dir: Option<PathBuf>,
}

impl IngestPass {
    fn run(mut self, now_secs: i64) -> (Self, Option<DashboardView>) {
        let view = self.sources.tick(&self.dashboard, now_secs);
        if let (Some(view), Some(dir)) = (&view, &self.snapshot_dir) {
            snapshot::write_snapshots(dir, &SnapshotText::render(view, SNAPSHOT_TIMELINE_WIDTH));
        }
        (self, view)
    }
}

struct IngestWorker {
    dashboard: SharedDashboard,
    pass: Option<IngestPass>,
    render_tx: Arc<watch::Sender<u64>>,
    reschedule: Arc<Notify>,
}

impl IngestWorker {
    async fn run(mut self, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            let period = self.dashboard.with(|d| d.live().refresh);
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = self.reschedule.notified() => continue,
                _ = tokio::time::sleep(period) => {}
            }

            let Some(pass) = self.pass.take() else {
                break;
            };
            let now = Utc::now().timestamp();
            match tokio::task::spawn_blocking(move || pass.run(now)).await {
                Ok((pass, view)) => {
                    self.pass = Some(pass);
                    if let Some(view) = view {
                        self.render_tx.send_replace(view.ticks);
                    }
                }
                Err(err) => {
                    warn!(event = "ingest_pass_failed", error = %err);
                    break;
                }
            }
        }
    }
}

async fn status_loop(
    dashboard: SharedDashboard,
    probe: StatusProbe,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(STATUS_POLL_SECS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        if *stop.borrow_and_update() {
            break;
        }
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let status = probe.poll().await;
                dashboard.with(|d| d.set_status(status));
            }
        }
    }
}

async fn deadline_watchdog(
    after: Duration,
    stop_tx: Arc<watch::Sender<bool>>,
    mut stop: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = tokio::time::sleep(after) => request_stop(&stop_tx, "deadline"),
        _ = stop.wait_for(|stopping| *stopping) => {}
    }
}
