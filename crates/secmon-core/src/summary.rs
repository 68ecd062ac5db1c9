//! Offline totals for a complete metrics file.

use crate::error::Result;
use crate::metrics::{Counters, Tally};
use crate::record::{EventRecord, UNKNOWN_LABEL};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub counters: Counters,
    pub records: u64,
    pub skipped_lines: u64,
}

impl Summary {
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Blank lines are ignored; lines that fail to decode are counted in
    /// `skipped_lines`.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut summary = Self::default();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match EventRecord::decode(&line) {
                Ok(record) => {
                    summary.counters.record(&record);
                    summary.records += 1;
                }
                Err(_) => summary.skipped_lines += 1,
            }
        }
        Ok(summary)
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn instances(&self) -> Vec<(String, Tally)> {
        sorted_unknown_last(&self.counters.per_instance)
    }

    pub fn regions(&self) -> Vec<(String, Tally)> {
        sorted_unknown_last(&self.counters.per_region)
    }

    pub fn report(&self) -> String {
        let mut lines = vec![format!(
            "Overall - success: {}, fail: {}",
            self.counters.success, self.counters.failure
        )];
        for (name, tally) in self.instances() {
            lines.push(format!(
                "Instance {name}: success={} fail={}",
                tally.success, tally.failure
            ));
        }
        for (name, tally) in self.regions() {
            lines.push(format!(
                "Region {name}: success={} fail={}",
                tally.success, tally.failure
            ));
        }
        lines.join("\n")
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from("section,key,value\n");
        out.push_str(&format!("overall,success,{}\n", self.counters.success));
        out.push_str(&format!("overall,fail,{}\n", self.counters.failure));
        for (prefix, rows) in [("instance", self.instances()), ("region", self.regions())] {
            for (name, tally) in rows {
                out.push_str(&format!("{prefix}_{name},success,{}\n", tally.success));
                out.push_str(&format!("{prefix}_{name},fail,{}\n", tally.failure));
            }
        }
        out
    }

    /// Writes next to `input` as `<stem>.summary.csv` and returns the path.
    pub fn write_csv(&self, input: &Path) -> Result<PathBuf> {
        let path = csv_path(input);
        std::fs::write(&path, self.to_csv())?;
        Ok(path)
    }
}

pub fn csv_path(input: &Path) -> PathBuf {
    input.with_extension("summary.csv")
}

fn sorted_unknown_last(map: &BTreeMap<String, Tally>) -> Vec<(String, Tally)> {
    let mut rows: Vec<(String, Tally)> = map
        .iter()
        .map(|(name, tally)| (name.clone(), *tally))
        .collect();
    rows.sort_by_key(|(name, _)| name == UNKNOWN_LABEL);
    rows
}
