//! Interactive confirmation of a launcher update.

use std::io::{self, BufRead, IsTerminal, Write};

use launcher_updater::{ConfirmHandoff, LauncherDescriptor, Version};

/// Asks on the terminal. Without a terminal the update is declined.
pub struct TerminalConfirm;

impl ConfirmHandoff for TerminalConfirm {
    fn confirm(&self, current: Version, descriptor: &LauncherDescriptor) -> bool {
        if !io::stdin().is_terminal() {
            tracing::info!("No terminal to confirm the launcher update; skipping it");
            return false;
        }

        eprint!(
            "A new launcher version is available ({current} -> {}). Update now? [y/N] ",
            descriptor.version
        );
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
