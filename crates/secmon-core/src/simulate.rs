//! Synthetic data for demo mode: appends event records and worker log lines
//! into a scratch directory that the monitor's patterns are pointed at.

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::record::{EventRecord, TIMESTAMP_FORMAT};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

pub const REGIONS: &[&str] = &[
    "us-east",
    "us-west",
    "us-california",
    "us-texas",
    "us-florida",
    "us-new-york",
    "us-chicago",
    "us-atlanta",
    "us-denver",
    "us-seattle",
    "us-las-vegas",
    "us-silicon-valley",
    "us-houston",
    "us-washington-dc",
    "us-ohio",
    "us-michigan",
];

pub const FAILURE_REASONS: &[&str] = &[
    "no_success_text",
    "button_not_found",
    "timeout_exception",
    "generic_exception",
];

const SUCCESS_REASON: &str = "success_text_detected";
const METRICS_FILE: &str = "sim.jsonl";
const TARGET_URL: &str = "https://example.invalid/checkout";

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub dir: PathBuf,
    pub instances: u32,
    pub tick: Duration,
    pub success_rate: f64,
    pub rotate_every: Duration,
    pub seed: Option<u64>,
}

impl SimulationConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            instances: 3,
            tick: Duration::from_secs(1),
            success_rate: 0.7,
            rotate_every: Duration::from_secs(10),
            seed: None,
        }
    }

    pub fn logs_pattern(&self) -> String {
        self.dir.join("instance_*.log").to_string_lossy().to_string()
    }

    pub fn metrics_pattern(&self) -> String {
        self.dir
            .join("metrics")
            .join("*.jsonl")
            .to_string_lossy()
            .to_string()
    }

    /// Point the monitor at the files this simulation writes.
    pub fn redirect(&self, config: &mut MonitorConfig) {
        config.logs_pattern = self.logs_pattern();
        config.metrics_pattern = self.metrics_pattern();
    }
}

pub struct Simulator {
    config: SimulationConfig,
    rng: StdRng,
    attempts: Vec<i64>,
    region: String,
    next_rotate: Option<DateTime<Utc>>,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let region = pick_region(&mut rng, None);
        Self {
            attempts: vec![0; config.instances as usize],
            config,
            rng,
            region,
            next_rotate: None,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.config.dir.join("metrics").join(METRICS_FILE)
    }

    pub fn log_path(&self, instance: u32) -> PathBuf {
        self.config.dir.join(format!("instance_gen{instance}.log"))
    }

    /// One attempt per instance stamped at `now`.
    pub fn step(&mut self, now: DateTime<Utc>) -> Result<Vec<EventRecord>> {
        self.maybe_rotate(now);
        let ts = now.naive_utc().format(TIMESTAMP_FORMAT).to_string();
        let mut records = Vec::with_capacity(self.attempts.len());
        for idx in 0..self.attempts.len() {
            self.attempts[idx] += 1;
            let success = self.rng.gen_bool(self.config.success_rate.clamp(0.0, 1.0));
            let reason = if success {
                SUCCESS_REASON
            } else {
                FAILURE_REASONS
                    .choose(&mut self.rng)
                    .copied()
                    .unwrap_or(FAILURE_REASONS[0])
            };
            records.push(EventRecord {
                ts: ts.clone(),
                instance_id: format!("gen{}", idx + 1),
                attempt: self.attempts[idx],
                success,
                reason: reason.to_string(),
                elapsed_ms: self.rng.gen_range(300..3500),
                proxy: false,
                rotated_on_failure: !success && self.rng.gen_bool(0.3),
                url: TARGET_URL.to_string(),
                batch_region: self.region.clone(),
            });
        }
        self.append(&records)?;
        Ok(records)
    }

    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!(event = "simulation_started", dir = %self.config.dir.display());
        let mut ticker = tokio::time::interval(self.config.tick);
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
                    if let Err(err) = self.step(Utc::now()) {
                        debug!(event = "simulation_write_failed", error = %err);
                    }
                }
            }
        }
        info!(event = "simulation_stopped");
    }

    fn maybe_rotate(&mut self, now: DateTime<Utc>) {
        let period = ChronoDuration::from_std(self.config.rotate_every)
            .unwrap_or_else(|_| ChronoDuration::seconds(10));
        match self.next_rotate {
            None => self.next_rotate = Some(now + period),
            Some(due) if now >= due => {
                self.region = pick_region(&mut self.rng, Some(&self.region));
                self.next_rotate = Some(now + period);
            }
            Some(_) => {}
        }
    }

    fn append(&self, records: &[EventRecord]) -> Result<()> {
        let metrics_path = self.metrics_path();
        if let Some(parent) = metrics_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut metrics = String::new();
        for record in records {
            metrics.push_str(&serde_json::to_string(record)?);
            metrics.push('\n');
        }
        append_text(&metrics_path, &metrics)?;

        for (idx, record) in records.iter().enumerate() {
            let line = format!(
                "{} attempt={} success={} region={} reason={} elapsed_ms={}\n",
                record.ts,
                record.attempt,
                record.success,
                record.batch_region,
                record.reason,
                record.elapsed_ms
            );
            append_text(&self.log_path(idx as u32 + 1), &line)?;
        }
        Ok(())
    }
}

fn pick_region(rng: &mut StdRng, current: Option<&str>) -> String {
    let candidates: Vec<&str> = REGIONS
        .iter()
        .copied()
        .filter(|region| Some(*region) != current)
        .collect();
    candidates
        .choose(rng)
        .copied()
        .unwrap_or(REGIONS[0])
        .to_string()
}

fn append_text(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RecordFeed;
    use crate::tail::FileTailer;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn seeded(dir: &TempDir) -> Simulator {
        let mut config = SimulationConfig::new(dir.path());
        config.seed = Some(7);
        Simulator::new(config)
    }

    #[test]
    fn step_writes_one_record_and_log_line_per_instance() {
        let dir = TempDir::new().expect("tempdir");
        let mut sim = seeded(&dir);
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 1).unwrap();
        let records = sim.step(now).expect("step");
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].instance_id, "gen3");
        assert!(records.iter().all(|r| r.ts == "2025-01-02T10:00:01"));
        assert!(records.iter().all(|r| r.attempt == 1));
        for record in &records {
            if record.success {
                assert_eq!(record.reason, SUCCESS_REASON);
            } else {
                assert!(FAILURE_REASONS.contains(&record.reason.as_str()));
            }
        }

        let config = SimulationConfig::new(dir.path());
        let mut feed = RecordFeed::new(config.metrics_pattern());
        assert_eq!(feed.poll(), records);
        let mut logs = FileTailer::new(config.logs_pattern());
        let lines = logs.read_new();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].file_name(), "instance_gen1.log");
    }

    #[test]
    fn region_rotates_after_period() {
        let dir = TempDir::new().expect("tempdir");
        let mut sim = seeded(&dir);
        let start = Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap();
        let first = sim.region().to_string();
        sim.step(start).expect("step");
        sim.step(start + ChronoDuration::seconds(5)).expect("step");
        assert_eq!(sim.region(), first);
        sim.step(start + ChronoDuration::seconds(10)).expect("step");
        assert_ne!(sim.region(), first);
    }

    #[test]
    fn redirect_points_monitor_at_simulation_dir() {
        let dir = TempDir::new().expect("tempdir");
        let sim = SimulationConfig::new(dir.path());
        let mut config = MonitorConfig::default();
        sim.redirect(&mut config);
        assert!(config.logs_pattern.ends_with("instance_*.log"));
        assert!(config.metrics_pattern.starts_with(&*dir.path().to_string_lossy()));
    }

    #[tokio::test]
    async fn run_stops_on_signal() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = SimulationConfig::new(dir.path());
        config.tick = Duration::from_millis(20);
        let sim = Simulator::new(config);
        let metrics = sim.metrics_path();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sim.run(rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("simulator stops")
            .expect("join");
        assert!(metrics.exists());
    }
}
