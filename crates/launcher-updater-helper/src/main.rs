//! Launcher update helper
//!
//! A minimal program that replaces the launcher's executable while the
//! launcher is not running. The launcher downloads this helper, starts it
//! with three positional arguments and exits.
//!
//! Process:
//! 1. Wait briefly so the launcher can exit and release its executable
//! 2. Download `{base_url}/launcher_updates/{file_name}` next to the launcher
//! 3. Delete the old launcher
//! 4. Move the download into its place
//! 5. Write and launch a cleanup script, then exit
//!
//! The cleanup script waits for this helper to exit, deletes it and the
//! staging directories, restarts the launcher and deletes itself.

mod cleanup;
mod config;
mod launch;
mod log;
mod swap;

use std::fmt;
use std::process::ExitCode;
use std::time::Duration;

use crate::cleanup::{CleanupPlan, write_script};
use crate::config::HelperConfig;
use crate::launch::spawn_script;
use crate::log::{init_logging, log, log_error};
use crate::swap::{download_launcher, replace_executable};

/// Time given to the launcher to exit.
const STARTUP_DELAY: Duration = Duration::from_secs(2);

/// Time an error stays on screen before the helper exits.
const ERROR_PAUSE: Duration = Duration::from_secs(5);

/// Progress through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Downloading,
    Swapping,
    ScriptLaunched,
    Exited,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Downloading => "downloading",
            Self::Swapping => "swapping",
            Self::ScriptLaunched => "cleanup script launched",
            Self::Exited => "exited",
        };
        f.write_str(label)
    }
}

fn main() -> ExitCode {
    // Anything but the launcher's three arguments is not for us.
    let Some(config) = HelperConfig::from_args(std::env::args().skip(1)) else {
        return ExitCode::SUCCESS;
    };

    match init_logging() {
        Ok(path) => log(&format!("Log file: {:?}", path)),
        Err(e) => eprintln!("[helper] Failed to initialize logging: {}", e),
    }
    log(&format!("Config: {:?}", config));

    match run(&config) {
        Ok(()) => {
            log(&format!("Stage: {}", Stage::Exited));
            ExitCode::SUCCESS
        }
        Err((stage, error)) => {
            log_error(&format!("Launcher update failed while {}", stage), &error);
            std::thread::sleep(ERROR_PAUSE);
            ExitCode::FAILURE
        }
    }
}

fn run(config: &HelperConfig) -> Result<(), (Stage, String)> {
    config.validate().map_err(|e| (Stage::Downloading, e))?;

    log(&format!("Waiting {:?} for the launcher to exit", STARTUP_DELAY));
    std::thread::sleep(STARTUP_DELAY);

    log(&format!("Stage: {}", Stage::Downloading));
    let new_exe = download_launcher(config).map_err(|e| (Stage::Downloading, e))?;

    log(&format!("Stage: {}", Stage::Swapping));
    replace_executable(&new_exe, &config.launcher_path).map_err(|e| (Stage::Swapping, e))?;

    let helper_path = std::env::current_exe()
        .map_err(|e| (Stage::ScriptLaunched, format!("Cannot locate helper: {}", e)))?;
    let plan = CleanupPlan::new(config, helper_path);
    let script = write_script(&plan).map_err(|e| (Stage::ScriptLaunched, e))?;
    spawn_script(&script).map_err(|e| (Stage::ScriptLaunched, e))?;
    log(&format!("Stage: {}", Stage::ScriptLaunched));

    Ok(())
}
