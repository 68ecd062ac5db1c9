//! Running counters and the bounded, time-bucketed timeline.

use crate::config::{clamp_bucket, MIN_BUCKET_SECS};
use crate::record::EventRecord;
use crate::tail::FileTailer;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub success: u64,
    pub failure: u64,
}

impl Tally {
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }

    fn record(&mut self, success: bool) {
        if success {
            self.success += 1;
        } else {
            self.failure += 1;
        }
    }
}

/// Grand totals plus per-region and per-instance breakdowns. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub success: u64,
    pub failure: u64,
    pub per_region: BTreeMap<String, Tally>,
    pub per_instance: BTreeMap<String, Tally>,
}

impl Counters {
    pub fn total(&self) -> u64 {
        self.success + self.failure
    }

    pub fn record(&mut self, record: &EventRecord) {
        if record.success {
            self.success += 1;
        } else {
            self.failure += 1;
        }
        self.per_region
            .entry(record.region_label().to_string())
            .or_default()
            .record(record.success);
        self.per_instance
            .entry(record.instance_label().to_string())
            .or_default()
            .record(record.success);
    }

    /// Highest-volume regions first; equal volumes keep name order.
    pub fn top_regions(&self, limit: usize) -> Vec<(String, Tally)> {
        top_by_volume(&self.per_region, limit)
    }

    pub fn top_instances(&self, limit: usize) -> Vec<(String, Tally)> {
        top_by_volume(&self.per_instance, limit)
    }
}

fn top_by_volume(map: &BTreeMap<String, Tally>, limit: usize) -> Vec<(String, Tally)> {
    let mut rows: Vec<(String, Tally)> = map
        .iter()
        .map(|(key, tally)| (key.clone(), *tally))
        .collect();
    rows.sort_by(|a, b| b.1.total().cmp(&a.1.total()));
    rows.truncate(limit);
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Epoch seconds, aligned to the bucket width.
    pub start: i64,
    pub success: u64,
    pub failure: u64,
}

impl Bucket {
    fn empty(start: i64) -> Self {
        Self {
            start,
            success: 0,
            failure: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.success + self.failure
    }
}

/// Buckets kept sorted by `start` with no duplicates and at most
/// `max_buckets` entries; the oldest bucket is evicted first.
#[derive(Debug, Clone)]
pub struct Timeline {
    buckets: VecDeque<Bucket>,
    width_secs: i64,
    max_buckets: usize,
}

impl Timeline {
    pub fn new(width_secs: u32, max_buckets: usize) -> Self {
        let max_buckets = max_buckets.max(1);
        Self {
            buckets: VecDeque::with_capacity(max_buckets + 1),
            width_secs: i64::from(width_secs.max(MIN_BUCKET_SECS)),
            max_buckets,
        }
    }

    pub fn width_secs(&self) -> u32 {
        u32::try_from(self.width_secs).unwrap_or(u32::MAX)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn last(&self) -> Option<&Bucket> {
        self.buckets.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    pub fn to_vec(&self) -> Vec<Bucket> {
        self.buckets.iter().copied().collect()
    }

    pub fn bucket_start(&self, epoch_secs: i64) -> i64 {
        epoch_secs - epoch_secs.rem_euclid(self.width_secs)
    }

    /// Count one event. Returns false when the event is older than the oldest
    /// bucket of a full timeline and therefore has nowhere to go.
    pub fn record(&mut self, epoch_secs: i64, success: bool) -> bool {
        let start = self.bucket_start(epoch_secs);
        let Some(idx) = self.slot(start) else {
            return false;
        };
        let bucket = &mut self.buckets[idx];
        if success {
            bucket.success += 1;
        } else {
            bucket.failure += 1;
        }
        true
    }

    /// Materialize every bucket from the newest one up to the bucket holding
    /// `now_secs`, including empty ones. Never moves backwards.
    pub fn ensure_to(&mut self, now_secs: i64) {
        let target = self.bucket_start(now_secs);
        let Some(last) = self.buckets.back().map(|bucket| bucket.start) else {
            self.buckets.push_back(Bucket::empty(target));
            return;
        };
        if target <= last {
            return;
        }
        // Anything more than a full window behind the target would be evicted anyway.
        let window_span = self.width_secs * self.max_buckets as i64;
        let mut next = (last + self.width_secs).max(target - window_span + self.width_secs);
        while next <= target {
            self.buckets.push_back(Bucket::empty(next));
            self.evict_overflow();
            next += self.width_secs;
        }
    }

    pub fn reset(&mut self, width_secs: u32) {
        self.width_secs = i64::from(width_secs.max(MIN_BUCKET_SECS));
        self.buckets.clear();
    }

    fn slot(&mut self, start: i64) -> Option<usize> {
        match self.buckets.binary_search_by_key(&start, |bucket| bucket.start) {
            Ok(idx) => Some(idx),
            Err(idx) => {
                if idx == 0 && self.buckets.len() >= self.max_buckets {
                    return None;
                }
                self.buckets.insert(idx, Bucket::empty(start));
                if self.evict_overflow() {
                    Some(idx - 1)
                } else {
                    Some(idx)
                }
            }
        }
    }

    fn evict_overflow(&mut self) -> bool {
        let mut evicted = false;
        while self.buckets.len() > self.max_buckets {
            self.buckets.pop_front();
            evicted = true;
        }
        evicted
    }
}

/// Decodes newly appended metrics lines from every file matching a pattern.
/// Owns the metrics-file read offsets.
#[derive(Debug)]
pub struct RecordFeed {
    tailer: FileTailer,
    dropped_lines: u64,
}

impl RecordFeed {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            tailer: FileTailer::new(pattern),
            dropped_lines: 0,
        }
    }

    pub fn dropped_lines(&self) -> u64 {
        self.dropped_lines
    }

    pub fn poll(&mut self) -> Vec<EventRecord> {
        let mut records = Vec::new();
        for tail_line in self.tailer.read_new() {
            match EventRecord::decode(&tail_line.line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    self.dropped_lines += 1;
                    debug!(
                        event = "metrics_line_dropped",
                        path = %tail_line.path.display(),
                        error = %err
                    );
                }
            }
        }
        records
    }
}

/// Folds event records into counters and the timeline.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    counters: Counters,
    timeline: Timeline,
    untimed_records: u64,
}

impl MetricsAggregator {
    pub fn new(bucket_secs: u32, max_buckets: usize) -> Self {
        Self {
            counters: Counters::default(),
            timeline: Timeline::new(clamp_bucket(bucket_secs), max_buckets),
            untimed_records: 0,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn bucket_secs(&self) -> u32 {
        self.timeline.width_secs()
    }

    /// Records counted in totals that fell outside the timeline window.
    pub fn untimed_records(&self) -> u64 {
        self.untimed_records
    }

    pub fn ingest(&mut self, record: &EventRecord, now_secs: i64) {
        self.counters.record(record);
        if !self
            .timeline
            .record(record.epoch_secs_or(now_secs), record.success)
        {
            self.untimed_records += 1;
        }
    }

    /// Read and fold every new complete record from `feed`.
    pub fn update(&mut self, feed: &mut RecordFeed, now_secs: i64) -> usize {
        let records = feed.poll();
        for record in &records {
            self.ingest(record, now_secs);
        }
        records.len()
    }

    pub fn ensure_buckets_to(&mut self, now_secs: i64) {
        self.timeline.ensure_to(now_secs);
    }

    /// Change the bucket width (minimum 1s) and drop the timeline. Counters
    /// are untouched.
    pub fn set_bucket_seconds(&mut self, secs: u32) {
        self.timeline.reset(clamp_bucket(secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_timestamp;

    fn record(ts: &str, success: bool, region: &str, instance: &str) -> EventRecord {
        EventRecord {
            ts: ts.to_string(),
            success,
            batch_region: region.to_string(),
            instance_id: instance.to_string(),
            ..EventRecord::default()
        }
    }

    fn secs(ts: &str) -> i64 {
        parse_timestamp(ts).expect("timestamp")
    }

    #[test]
    fn records_split_into_aligned_buckets() {
        let mut agg = MetricsAggregator::new(10, 72);
        let now = secs("2025-01-02T10:00:20");
        for ts in ["2025-01-02T10:00:01", "2025-01-02T10:00:07", "2025-01-02T10:00:15"] {
            agg.ingest(&record(ts, true, "us-east", "gen1"), now);
        }

        let buckets = agg.timeline().to_vec();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].start, secs("2025-01-02T10:00:00"));
        assert_eq!(buckets[0].total(), 2);
        assert_eq!(buckets[1].start, secs("2025-01-02T10:00:10"));
        assert_eq!(buckets[1].total(), 1);
    }

    #[test]
    fn breakdowns_sum_to_grand_totals() {
        let mut agg = MetricsAggregator::new(10, 72);
        let samples = [
            (true, "us-east", "gen1"),
            (false, "us-east", "gen2"),
            (false, "", "gen1"),
            (true, "us-west", ""),
            (true, "us-west", "gen3"),
        ];
        for (success, region, instance) in samples {
            agg.ingest(&record("2025-01-02T10:00:01", success, region, instance), 0);
        }

        let counters = agg.counters();
        assert_eq!(counters.total(), 5);
        assert_eq!(counters.success, 3);
        assert_eq!(counters.failure, 2);
        let region_sum: u64 = counters.per_region.values().map(Tally::total).sum();
        let instance_sum: u64 = counters.per_instance.values().map(Tally::total).sum();
        assert_eq!(region_sum, 5);
        assert_eq!(instance_sum, 5);
        assert_eq!(counters.per_region["unknown"].failure, 1);
        assert_eq!(counters.per_instance["unknown"].success, 1);
    }

    #[test]
    fn ensure_buckets_materializes_gaps_and_is_idempotent() {
        let mut agg = MetricsAggregator::new(10, 72);
        let base = secs("2025-01-02T10:00:00");
        agg.ingest(&record("2025-01-02T10:00:03", false, "r", "i"), base);

        agg.ensure_buckets_to(base + 35);
        let starts: Vec<i64> = agg.timeline().iter().map(|b| b.start - base).collect();
        assert_eq!(starts, vec![0, 10, 20, 30]);

        let before = agg.timeline().to_vec();
        agg.ensure_buckets_to(base + 39);
        agg.ensure_buckets_to(base + 5);
        assert_eq!(agg.timeline().to_vec(), before);
    }

    #[test]
    fn idle_timeline_ticks_forward_from_empty() {
        let mut agg = MetricsAggregator::new(5, 72);
        agg.ensure_buckets_to(1_000_003);
        assert_eq!(agg.timeline().len(), 1);
        assert_eq!(agg.timeline().last().map(|b| b.start), Some(1_000_000));
        agg.ensure_buckets_to(1_000_011);
        assert_eq!(agg.timeline().len(), 3);
        assert!(agg.timeline().iter().all(|b| b.total() == 0));
    }

    #[test]
    fn overflow_evicts_exactly_the_oldest_bucket() {
        let mut timeline = Timeline::new(1, 3);
        for t in [10, 11, 12] {
            assert!(timeline.record(t, true));
        }
        assert!(timeline.record(13, false));
        let starts: Vec<i64> = timeline.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![11, 12, 13]);
        assert_eq!(timeline.last().map(|b| b.failure), Some(1));
    }

    #[test]
    fn late_records_keep_order_and_never_exceed_the_cap() {
        let mut timeline = Timeline::new(10, 3);
        assert!(timeline.record(30, true));
        assert!(timeline.record(10, true));
        assert!(timeline.record(20, false));
        let starts: Vec<i64> = timeline.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![10, 20, 30]);

        assert!(!timeline.record(0, true));
        assert!(timeline.record(15, true));
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.iter().next().map(|b| b.success), Some(2));

        timeline.ensure_to(10_000);
        assert_eq!(timeline.len(), 3);
        let starts: Vec<i64> = timeline.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![9_980, 9_990, 10_000]);
    }

    #[test]
    fn set_bucket_seconds_clears_timeline_but_keeps_totals() {
        let mut agg = MetricsAggregator::new(10, 72);
        agg.ingest(&record("2025-01-02T10:00:01", true, "r", "i"), 0);
        agg.ingest(&record("2025-01-02T10:00:21", false, "r", "i"), 0);
        assert_eq!(agg.timeline().len(), 2);

        agg.set_bucket_seconds(0);
        assert!(agg.timeline().is_empty());
        assert_eq!(agg.bucket_secs(), 1);
        assert_eq!(agg.counters().success, 1);
        assert_eq!(agg.counters().failure, 1);
    }

    #[test]
    fn unparseable_timestamp_lands_in_current_bucket() {
        let mut agg = MetricsAggregator::new(10, 72);
        agg.ingest(&record("not-a-time", true, "r", "i"), 1_234);
        assert_eq!(agg.timeline().last().map(|b| b.start), Some(1_230));
        assert_eq!(agg.untimed_records(), 0);
    }

    #[test]
    fn top_regions_orders_by_volume_then_name() {
        let mut agg = MetricsAggregator::new(10, 72);
        for (success, region) in [
            (true, "b"),
            (true, "a"),
            (false, "c"),
            (true, "c"),
            (false, "d"),
        ] {
            agg.ingest(&record("2025-01-02T10:00:01", success, region, "i"), 0);
        }
        let top: Vec<String> = agg
            .counters()
            .top_regions(3)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(top, vec!["c", "a", "b"]);
    }
}
