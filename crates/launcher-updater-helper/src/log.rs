//! Log file for the update helper.
//!
//! The helper runs detached, without a terminal, so every line is mirrored
//! into a file named `launcher-updater-helper-<timestamp>.log`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};

static LOG_FILE: Mutex<Option<File>> = Mutex::new(None);

/// Log file path for a helper started at `started` in `dir`.
fn log_path_in(dir: &Path, started: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "launcher-updater-helper-{}.log",
        started.format("%Y%m%d_%H%M%S")
    ))
}

fn format_line(at: DateTime<Local>, message: &str) -> String {
    format!("[{}] {}\n", at.format("%H:%M:%S%.3f"), message)
}

/// Opens the log file in the system temp directory.
///
/// The log stays outside the launcher directory, which the swap rewrites and
/// the cleanup script prunes, so it outlives both the helper and the script.
pub fn init_logging() -> Result<PathBuf, String> {
    let started = Local::now();
    let log_path = log_path_in(&std::env::temp_dir(), started);

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .map_err(|e| format!("Failed to create log file {}: {e}", log_path.display()))?;

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }

    log(&format!(
        "=== Launcher update helper {} ===\nStarted: {}\n",
        env!("CARGO_PKG_VERSION"),
        started.format("%Y-%m-%d %H:%M:%S")
    ));
    Ok(log_path)
}

/// Writes a line to stderr and, once opened, to the log file.
pub fn log(message: &str) {
    let line = format_line(Local::now(), message);
    eprint!("{line}");

    if let Ok(mut guard) = LOG_FILE.lock()
        && let Some(file) = guard.as_mut()
    {
        let _ = file.write_all(line.as_bytes());
        let _ = file.flush();
    }
}

/// Logs `context: error` and returns the same text for the caller's `Err`.
pub fn log_error(context: &str, error: &str) -> String {
    let message = format!("ERROR: {context} - {error}");
    log(&message);
    message
}
