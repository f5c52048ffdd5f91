//! Read-back of the rolling log file for the `/log` command.

use crate::error::{PicamError, Result};
use crate::gateway::truncate_message;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File name prefix of the daily log files in the log directory
pub const LOG_FILE_PREFIX: &str = "picambot.log";

/// Number of lines returned by `/log`
pub const RECENT_LINES: usize = 100;

/// Most recently modified log file in `log_dir`
pub fn newest_log_file(log_dir: &Path) -> Result<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
            newest = Some((modified, entry.path()));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

/// The last `max_lines` lines of the current log file, cut to fit one message
pub fn recent_lines(log_dir: &Path, max_lines: usize) -> Result<String> {
    let path = newest_log_file(log_dir)?.ok_or_else(|| {
        PicamError::system(format!("No log file found in {}", log_dir.display()))
    })?;

    let content = fs::read_to_string(&path)?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    let tail = lines[start..].join("\n");

    Ok(truncate_message(&tail).to_string())
}
