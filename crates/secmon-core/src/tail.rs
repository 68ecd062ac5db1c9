//! Polling, rotation-aware follower for every file matching a glob pattern.

use crate::error::Result;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Upper bound on bytes pulled from one file in one pass.
const MAX_READ_BYTES: u64 = 4 * 1024 * 1024;
/// An unterminated tail longer than this is emitted as a line anyway.
const MAX_PENDING_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailLine {
    pub path: PathBuf,
    pub line: String,
}

impl TailLine {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }
}

/// Tracks one read offset per matched file. Offsets only move forward unless
/// the file shrank below the recorded offset, which resets it to zero.
#[derive(Debug)]
pub struct FileTailer {
    pattern: String,
    positions: HashMap<PathBuf, u64>,
    pattern_error_logged: bool,
}

impl FileTailer {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            positions: HashMap::new(),
            pattern_error_logged: false,
        }
    }

    pub fn position(&self, path: &Path) -> Option<u64> {
        self.positions.get(path).copied()
    }

    pub fn tracked_files(&self) -> usize {
        self.positions.len()
    }

    /// Every complete line appended to every matching file since the last
    /// call, in sorted file order then offset order.
    pub fn read_new(&mut self) -> Vec<TailLine> {
        let matches = match self.matching_files() {
            Ok(matches) => matches,
            Err(err) => {
                if !self.pattern_error_logged {
                    warn!(event = "tail_pattern_invalid", pattern = %self.pattern, error = %err);
                    self.pattern_error_logged = true;
                }
                return Vec::new();
            }
        };
        self.positions.retain(|path, _| matches.contains(path));

        let mut out = Vec::new();
        for path in matches {
            let offset = self.positions.get(&path).copied().unwrap_or(0);
            match read_complete_lines(&path, offset) {
                Ok(Some(chunk)) => {
                    self.positions.insert(path.clone(), chunk.next_offset);
                    out.extend(chunk.lines.into_iter().map(|line| TailLine {
                        path: path.clone(),
                        line,
                    }));
                }
                Ok(None) => {
                    self.positions.remove(&path);
                }
                Err(err) => {
                    debug!(event = "tail_read_skipped", path = %path.display(), error = %err);
                }
            }
        }
        out
    }

    fn matching_files(&self) -> Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = glob::glob(&self.pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }
}

struct Chunk {
    lines: Vec<String>,
    next_offset: u64,
}

/// `Ok(None)` means the file vanished between globbing and reading.
fn read_complete_lines(path: &Path, offset: u64) -> Result<Option<Chunk>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let size = file.metadata()?.len();
    let start = if size < offset {
        debug!(event = "tail_reset", path = %path.display(), offset, size);
        0
    } else {
        offset
    };
    if size == start {
        return Ok(Some(Chunk {
            lines: Vec::new(),
            next_offset: start,
        }));
    }

    file.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::new();
    file.take((size - start).min(MAX_READ_BYTES))
        .read_to_end(&mut buf)?;

    let consumed = match buf.iter().rposition(|byte| *byte == b'\n') {
        Some(last_newline) => last_newline + 1,
        None if buf.len() >= MAX_PENDING_LINE_BYTES => buf.len(),
        None => 0,
    };
    let complete = &buf[..consumed];
    let mut lines: Vec<String> = if complete.is_empty() {
        Vec::new()
    } else {
        complete.split(|byte| *byte == b'\n').map(decode_line).collect()
    };
    // split() yields a trailing empty segment after the final terminator.
    if complete.last() == Some(&b'\n') {
        lines.pop();
    }

    Ok(Some(Chunk {
        lines,
        next_offset: start + consumed as u64,
    }))
}

fn decode_line(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_suffix('\r').unwrap_or(&text).to_string()
}
