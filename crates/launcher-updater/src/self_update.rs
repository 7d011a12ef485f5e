//! Replacement of the launcher's own executable.
//!
//! A running executable cannot overwrite itself, so the launcher downloads a
//! small helper program, starts it detached with three positional arguments
//! and exits. The helper swaps the executable and hands over to a cleanup
//! script that restarts the launcher.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::client::UpdateClient;
use crate::config::UpdaterSettings;
use crate::error::{Result, UpdateError};
use crate::events::EventSink;
use crate::manifest::LauncherDescriptor;
use crate::steps::download::download_file;
use crate::version::Version;

/// Asks the user whether to restart into the helper.
pub trait ConfirmHandoff: Send + Sync {
    /// Returns `true` to hand off to the helper.
    fn confirm(&self, current: Version, descriptor: &LauncherDescriptor) -> bool;
}

/// A fixed answer, for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl ConfirmHandoff for AutoConfirm {
    fn confirm(&self, _current: Version, _descriptor: &LauncherDescriptor) -> bool {
        self.0
    }
}

/// Starts the helper process.
pub trait HelperSpawner: Send + Sync {
    /// Start `helper` with `args` without waiting for it.
    fn spawn(&self, helper: &Path, args: &[String]) -> Result<()>;
}

/// Spawns the helper as a detached OS process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

impl HelperSpawner for ProcessSpawner {
    fn spawn(&self, helper: &Path, args: &[String]) -> Result<()> {
        let mut command = Command::new(helper);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = helper.parent().filter(|p| !p.as_os_str().is_empty()) {
            command.current_dir(dir);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        let child = command.spawn().map_err(|e| {
            UpdateError::SelfUpdate(format!("cannot start {}: {e}", helper.display()))
        })?;
        tracing::info!("Started helper {} (pid {})", helper.display(), child.id());
        Ok(())
    }
}

/// The helper's command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperInvocation {
    /// Update server base URL.
    pub base_url: String,
    /// Executable the helper replaces.
    pub launcher_path: PathBuf,
    /// File name of the new executable under `launcher_updates/`.
    pub file_name: String,
}

impl HelperInvocation {
    /// The three positional arguments, in protocol order.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            self.base_url.clone(),
            self.launcher_path.to_string_lossy().into_owned(),
            self.file_name.clone(),
        ]
    }
}

/// What [`SelfUpdateCoordinator::check_and_maybe_handoff`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The launcher is current.
    UpToDate,
    /// A newer launcher exists but the user declined; the helper was removed.
    Declined,
    /// The helper is running. The caller must exit now.
    HandedOff(HelperInvocation),
}

/// Checks the launcher's own version and starts the helper relay.
pub struct SelfUpdateCoordinator {
    client: UpdateClient,
    helper_file_name: String,
    helper_path: PathBuf,
    launcher_path: PathBuf,
    confirm: Box<dyn ConfirmHandoff>,
    spawner: Box<dyn HelperSpawner>,
}

impl SelfUpdateCoordinator {
    /// Creates a coordinator replacing `launcher_path`.
    pub fn new(
        client: UpdateClient,
        settings: &UpdaterSettings,
        launcher_path: impl Into<PathBuf>,
        confirm: Box<dyn ConfirmHandoff>,
        spawner: Box<dyn HelperSpawner>,
    ) -> Self {
        Self {
            client,
            helper_file_name: settings.helper_file_name.clone(),
            helper_path: settings.helper_path(),
            launcher_path: launcher_path.into(),
            confirm,
            spawner,
        }
    }

    /// Where the helper is downloaded to.
    #[must_use]
    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    /// Compare `current` with the published launcher version and, if it is
    /// older and the user agrees, start the helper.
    pub async fn check_and_maybe_handoff(
        &self,
        current: Version,
        events: &EventSink,
    ) -> Result<HandoffOutcome> {
        let descriptor = self.client.fetch_launcher_descriptor().await?;
        if descriptor.version <= current {
            tracing::info!(
                "Launcher is current ({current}, published {})",
                descriptor.version
            );
            return Ok(HandoffOutcome::UpToDate);
        }

        tracing::info!(
            "Launcher update available: {current} -> {} ({})",
            descriptor.version,
            descriptor.file_name
        );
        events.status("Downloading launcher updater...");
        self.download_helper().await?;

        if !self.confirm.confirm(current, &descriptor) {
            tracing::info!("Launcher update declined");
            self.remove_helper();
            return Ok(HandoffOutcome::Declined);
        }

        let invocation = HelperInvocation {
            base_url: self.client.base_url().to_string(),
            launcher_path: self.launcher_path.clone(),
            file_name: descriptor.file_name.clone(),
        };
        events.status("Restarting to update the launcher...");
        self.spawner.spawn(&self.helper_path, &invocation.args())?;
        Ok(HandoffOutcome::HandedOff(invocation))
    }

    async fn download_helper(&self) -> Result<()> {
        let url = self.client.helper_url(&self.helper_file_name);
        download_file(self.client.http(), &url, &self.helper_path, |_| {})
            .await
            .map_err(|e| UpdateError::SelfUpdate(format!("cannot download helper: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.helper_path, fs::Permissions::from_mode(0o755)).map_err(
                |e| {
                    UpdateError::SelfUpdate(format!(
                        "cannot mark {} executable: {e}",
                        self.helper_path.display()
                    ))
                },
            )?;
        }
        Ok(())
    }

    fn remove_helper(&self) {
        match fs::remove_file(&self.helper_path) {
            Ok(()) => tracing::debug!("Removed {}", self.helper_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Cannot remove {}: {e}", self.helper_path.display()),
        }
    }
}
