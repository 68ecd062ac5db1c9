use crate::error::Result;
use crate::format::SnapshotText;
use std::path::Path;
use tracing::debug;

pub const HEADER_FILE: &str = "header.txt";
pub const STATS_FILE: &str = "stats.txt";
pub const TIMELINE_FILE: &str = "timeline.txt";
pub const LOGS_FILE: &str = "logs.txt";

/// Write every snapshot file under `dir`. Failures are logged and otherwise
/// ignored; a missed snapshot is replaced on the next tick.
pub fn write_snapshots(dir: &Path, text: &SnapshotText) {
    if let Err(err) = try_write_snapshots(dir, text) {
        debug!(event = "snapshot_write_failed", dir = %dir.display(), error = %err);
    }
}

pub fn try_write_snapshots(dir: &Path, text: &SnapshotText) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    write_atomic(&dir.join(HEADER_FILE), &text.header)?;
    write_atomic(&dir.join(STATS_FILE), &text.stats)?;
    write_atomic(&dir.join(TIMELINE_FILE), &text.timeline)?;
    write_atomic(&dir.join(LOGS_FILE), &text.logs)?;
    Ok(())
}

/// Readers polling the directory never see a half-written file.
fn write_atomic(path: &Path, body: &str) -> Result<()> {
    let temp_path = match path.file_name() {
        Some(name) => path.with_file_name(format!(".{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    };
    let mut payload = String::with_capacity(body.len() + 1);
    payload.push_str(body);
    payload.push('\n');
    std::fs::write(&temp_path, payload)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn text() -> SnapshotText {
        SnapshotText {
            header: "pia=n/a:n/a:n/a | bucket=10s | r=1.0s".to_string(),
            stats: "Total: 0  Success: 0  Fail: 0\nRegions:".to_string(),
            timeline: " \n ".to_string(),
            logs: "[a.log] one\n[a.log] two".to_string(),
        }
    }

    #[test]
    fn writes_all_files_with_trailing_newline() {
        let dir = TempDir::new().expect("tempdir");
        let out = dir.path().join("nested").join("snap");
        write_snapshots(&out, &text());

        let read = |name: &str| std::fs::read_to_string(out.join(name)).expect("snapshot file");
        assert_eq!(read(HEADER_FILE), "pia=n/a:n/a:n/a | bucket=10s | r=1.0s\n");
        assert_eq!(read(STATS_FILE), "Total: 0  Success: 0  Fail: 0\nRegions:\n");
        assert_eq!(read(TIMELINE_FILE), " \n \n");
        assert_eq!(read(LOGS_FILE), "[a.log] one\n[a.log] two\n");
        let leftovers = std::fs::read_dir(&out)
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn unwritable_directory_is_ignored() {
        let dir = TempDir::new().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").expect("write blocker");
        assert!(try_write_snapshots(&blocker.join("snap"), &text()).is_err());
        write_snapshots(&blocker.join("snap"), &text());
    }
}
