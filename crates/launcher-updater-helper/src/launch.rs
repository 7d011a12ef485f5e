//! Detached launch of the cleanup script.

use std::path::Path;
use std::process::{Command, Stdio};

/// Starts the cleanup script without waiting for it.
pub fn spawn_script(script: &Path) -> Result<(), String> {
    eprintln!("[helper] Launching cleanup script: {:?}", script);

    let mut command = interpreter(script);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(dir) = script.parent().filter(|p| !p.as_os_str().is_empty()) {
        command.current_dir(dir);
    }

    command
        .spawn()
        .map_err(|e| format!("Failed to launch cleanup script: {}", e))?;
    Ok(())
}

#[cfg(windows)]
fn interpreter(script: &Path) -> Command {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    const DETACHED_PROCESS: u32 = 0x0000_0008;

    let mut command = Command::new("cmd");
    command
        .arg("/C")
        .arg(script)
        .creation_flags(CREATE_NO_WINDOW | DETACHED_PROCESS);
    command
}

#[cfg(not(windows))]
fn interpreter(script: &Path) -> Command {
    let mut command = Command::new("/bin/sh");
    command.arg(script);
    command
}
