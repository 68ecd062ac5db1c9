//! Plain-text renderings of a dashboard view. Both the interactive widgets and
//! the snapshot files draw from these functions so the two never disagree.

use crate::config::{LOG_SNAPSHOT_LINES, REGION_COLUMN_WIDTH, TOP_REGIONS};
use crate::control::DashboardView;
use crate::metrics::{Bucket, Counters, Tally};

pub const DENSITY_RAMP: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];
pub const SUCCESS_ONLY_GLYPH: char = 'S';
pub const FAILURE_ONLY_GLYPH: char = 'F';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRows {
    pub density: String,
    pub failures: String,
}

impl TimelineRows {
    pub fn to_text(&self) -> String {
        format!("{}\n{}", self.density, self.failures)
    }
}

/// Everything the snapshot files contain, rendered once per tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotText {
    pub header: String,
    pub stats: String,
    pub timeline: String,
    pub logs: String,
}

impl SnapshotText {
    pub fn render(view: &DashboardView, timeline_width: usize) -> Self {
        Self {
            header: header_line(view),
            stats: stats_block(view, TOP_REGIONS),
            timeline: timeline_rows(&view.timeline, timeline_width).to_text(),
            logs: log_excerpt(&view.logs, LOG_SNAPSHOT_LINES),
        }
    }
}

pub fn header_line(view: &DashboardView) -> String {
    let mut header = format!(
        "pia={}:{}:{} | bucket={}s | r={:.1}s",
        view.status.region,
        view.status.state,
        view.status.ip,
        view.live.bucket_secs,
        view.live.refresh.as_secs_f64()
    );
    if view.live.paused {
        header.push_str(" | paused");
    }
    header
}

pub fn stats_block(view: &DashboardView, top_regions: usize) -> String {
    let counters = &view.counters;
    let mut lines = vec![totals_line(counters)];
    if let Some(last) = view.timeline.last() {
        lines.push(format!(
            "Last {}s  S:{} F:{}",
            view.live.bucket_secs, last.success, last.failure
        ));
    }
    lines.push("Regions:".to_string());
    lines.extend(
        counters
            .top_regions(top_regions)
            .iter()
            .map(|(name, tally)| breakdown_row(name, tally)),
    );
    lines.join("\n")
}

pub fn instances_block(counters: &Counters, top_instances: usize) -> String {
    let mut lines = vec!["Instances:".to_string()];
    lines.extend(
        counters
            .top_instances(top_instances)
            .iter()
            .map(|(name, tally)| breakdown_row(name, tally)),
    );
    lines.join("\n")
}

pub fn totals_line(counters: &Counters) -> String {
    format!(
        "Total: {}  Success: {}  Fail: {}",
        counters.total(),
        counters.success,
        counters.failure
    )
}

fn breakdown_row(name: &str, tally: &Tally) -> String {
    format!(
        "  {} S:{:>4} F:{:>4}",
        fit_column(name, REGION_COLUMN_WIDTH),
        tally.success,
        tally.failure
    )
}

/// Truncate or right-pad to exactly `width` characters.
pub fn fit_column(value: &str, width: usize) -> String {
    let mut out: String = value.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

/// Density row plus failure-marker row for the newest buckets that fit in
/// `width` columns. Glyphs scale against the busiest visible bucket.
pub fn timeline_rows(buckets: &[Bucket], width: usize) -> TimelineRows {
    let visible = &buckets[buckets.len().saturating_sub(width)..];
    let max_total = visible
        .iter()
        .map(Bucket::total)
        .max()
        .unwrap_or(0)
        .max(1);
    let steps = (DENSITY_RAMP.len() - 1) as u64;

    let mut density = String::with_capacity(visible.len());
    let mut failures = String::with_capacity(visible.len());
    for bucket in visible {
        let glyph = if bucket.success > 0 && bucket.failure == 0 {
            SUCCESS_ONLY_GLYPH
        } else if bucket.failure > 0 && bucket.success == 0 {
            FAILURE_ONLY_GLYPH
        } else {
            DENSITY_RAMP[(steps * bucket.total() / max_total) as usize]
        };
        density.push(glyph);
        failures.push(if bucket.failure > 0 && bucket.success == 0 {
            FAILURE_ONLY_GLYPH
        } else {
            ' '
        });
    }
    TimelineRows { density, failures }
}

pub fn log_excerpt(logs: &[String], limit: usize) -> String {
    logs[logs.len().saturating_sub(limit)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::control::DashboardView;
    use crate::status::VpnStatus;

    fn bucket(start: i64, success: u64, failure: u64) -> Bucket {
        Bucket {
            start,
            success,
            failure,
        }
    }

    fn view() -> DashboardView {
        DashboardView {
            live: MonitorConfig::default().live(),
            status: VpnStatus::unavailable(),
            counters: Counters::default(),
            timeline: Vec::new(),
            logs: Vec::new(),
            ticks: 0,
            dropped_lines: 0,
            untimed_records: 0,
        }
    }

    #[test]
    fn header_shows_status_bucket_refresh_and_pause() {
        let mut view = view();
        view.status = VpnStatus {
            region: "us-east".to_string(),
            state: "Connected".to_string(),
            ip: "10.0.0.2".to_string(),
        };
        assert_eq!(
            header_line(&view),
            "pia=us-east:Connected:10.0.0.2 | bucket=10s | r=1.0s"
        );
        view.live.paused = true;
        assert!(header_line(&view).ends_with(" | paused"));
    }

    #[test]
    fn stats_block_lists_totals_last_bucket_and_padded_regions() {
        let mut view = view();
        view.counters.success = 3;
        view.counters.failure = 1;
        view.counters.per_region.insert(
            "us-silicon-valley-extended".to_string(),
            Tally {
                success: 1,
                failure: 1,
            },
        );
        view.counters.per_region.insert(
            "us-east".to_string(),
            Tally {
                success: 2,
                failure: 0,
            },
        );
        view.timeline = vec![bucket(0, 1, 0), bucket(10, 2, 1)];

        let expected = [
            "Total: 4  Success: 3  Fail: 1",
            "Last 10s  S:2 F:1",
            "Regions:",
            "  us-east            S:   2 F:   0",
            "  us-silicon-valley- S:   1 F:   1",
        ]
        .join("\n");
        assert_eq!(stats_block(&view, TOP_REGIONS), expected);
    }

    #[test]
    fn timeline_uses_reserved_glyphs_and_scales_mixed_buckets() {
        let rows = timeline_rows(
            &[
                bucket(0, 0, 0),
                bucket(10, 3, 0),
                bucket(20, 0, 2),
                bucket(30, 5, 5),
                bucket(40, 1, 1),
            ],
            80,
        );
        assert_eq!(rows.density, " SF@.");
        assert_eq!(rows.failures, "  F  ");
        assert_eq!(rows.to_text(), " SF@.\n  F  ");
    }

    #[test]
    fn timeline_shows_only_the_newest_buckets_that_fit() {
        let buckets: Vec<Bucket> = (0..10).map(|i| bucket(i * 10, i as u64, 1)).collect();
        let rows = timeline_rows(&buckets, 4);
        assert_eq!(rows.density.chars().count(), 4);
        assert_eq!(rows.density.chars().last(), Some('@'));

        let empty = timeline_rows(&[], 80);
        assert_eq!(empty.to_text(), "\n");
    }

    #[test]
    fn fit_column_handles_multibyte_names() {
        assert_eq!(fit_column("zürich", 8), "zürich  ");
        assert_eq!(fit_column("abcdef", 3), "abc");
    }

    #[test]
    fn log_excerpt_keeps_the_tail() {
        let logs: Vec<String> = (0..5).map(|i| format!("line {i}")).collect();
        assert_eq!(log_excerpt(&logs, 2), "line 3\nline 4");
        assert_eq!(log_excerpt(&logs, 10).lines().count(), 5);
    }
}
