//! Replay files: one JSON [`SyntheticEvent`] per line
//!
//! Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"subsystem":"mmc","path":"/devices/mmc0","params":["MMC_TYPE=SD","MMC_NAME=SDCard"]}
//! {"subsystem":"switch","path":"/devices/virtual/switch/usb_mass_storage","action":"change","params":["SWITCH_NAME=usb_mass_storage","SWITCH_STATE=online"]}
//! ```

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use uevent::SyntheticEvent;

/// A parsed event with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEntry {
    pub line: usize,
    pub event: SyntheticEvent,
}

pub fn parse_replay<R: BufRead>(reader: R) -> Result<Vec<ReplayEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid event on line {}", line_no))?;
        entries.push(ReplayEntry {
            line: line_no,
            event,
        });
    }
    Ok(entries)
}

pub fn read_replay_file(path: &Path) -> Result<Vec<ReplayEntry>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open replay file: {}", path.display()))?;
    parse_replay(BufReader::new(file))
        .with_context(|| format!("Failed to parse replay file: {}", path.display()))
}
