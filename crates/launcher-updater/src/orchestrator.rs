//! The game update cycle.
//!
//! One cycle loads the installed version, fetches the manifest, plans the
//! patch chain and then downloads and applies each patch in order,
//! persisting the installed version after every archive. A failure stops the
//! cycle; patches already applied stay applied and the next cycle resumes
//! from the last persisted version.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::client::UpdateClient;
use crate::config::UpdaterSettings;
use crate::error::{Result, UpdateError};
use crate::events::{EventSink, UpdateEvent};
use crate::manifest::PatchId;
use crate::plan::{UpdatePlan, plan};
use crate::state::{InstalledState, InstalledStateStore, Loaded};
use crate::steps::download::{DownloadStreamItem, download_to_file};
use crate::steps::extract::{apply_archive, remove_dir_if_exists, staged_archive_path};
use crate::version::Version;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was already running; nothing was done.
    AlreadyRunning,
    /// The installation was already current.
    UpToDate {
        /// Installed version.
        installed: Version,
    },
    /// Patches were applied.
    Updated {
        /// Version before the cycle.
        from: Version,
        /// Version after the cycle.
        to: Version,
        /// Archives applied, in order.
        applied: Vec<String>,
    },
}

impl CycleOutcome {
    /// The installed version once the cycle finished, if it ran.
    #[must_use]
    pub fn installed(&self) -> Option<Version> {
        match self {
            Self::AlreadyRunning => None,
            Self::UpToDate { installed } => Some(*installed),
            Self::Updated { to, .. } => Some(*to),
        }
    }
}

/// Result of a check without applying anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    /// Installed version.
    pub installed: Version,
    /// Latest published version.
    pub latest: Version,
    /// Patches that a cycle would apply.
    pub plan: UpdatePlan,
}

/// Drives update cycles for one installation.
#[derive(Debug)]
pub struct Orchestrator {
    settings: UpdaterSettings,
    client: UpdateClient,
    store: InstalledStateStore,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Orchestrator {
    /// Creates an orchestrator, resolving the server base URL from the settings.
    pub fn new(settings: UpdaterSettings) -> Result<Self> {
        let base_url = settings.resolve_base_url()?;
        let client = UpdateClient::new(base_url, &settings.user_agent)?;
        Ok(Self::with_client(settings, client))
    }

    /// Creates an orchestrator using an existing client.
    pub fn with_client(settings: UpdaterSettings, client: UpdateClient) -> Self {
        let store = InstalledStateStore::new(settings.state_path(), settings.baseline_version);
        Self {
            settings,
            client,
            store,
            in_flight: AtomicBool::new(false),
        }
    }

    /// The settings in use.
    #[must_use]
    pub fn settings(&self) -> &UpdaterSettings {
        &self.settings
    }

    /// The server client.
    #[must_use]
    pub fn client(&self) -> &UpdateClient {
        &self.client
    }

    /// The installed-state store.
    #[must_use]
    pub fn store(&self) -> &InstalledStateStore {
        &self.store
    }

    /// Whether a cycle is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Remove leftover patch downloads from an earlier run.
    pub fn clean_staging(&self) -> Result<()> {
        let staging = self.settings.staging_path();
        if remove_dir_if_exists(&staging)? {
            tracing::info!("Removed stale staging directory {}", staging.display());
        }
        Ok(())
    }

    /// Fetch the manifest and plan without changing anything on disk.
    pub async fn check(&self) -> Result<UpdateCheck> {
        let installed = self.store.load().installed_version;
        let manifest = self.client.fetch_manifest().await?;
        let plan = plan(installed, &manifest)?;
        Ok(UpdateCheck {
            installed,
            latest: manifest.latest_version,
            plan,
        })
    }

    /// Run one update cycle.
    ///
    /// Returns [`CycleOutcome::AlreadyRunning`] without doing anything if a
    /// cycle is already in flight on this orchestrator. Cancelling `cancel`
    /// interrupts a fetch or download immediately; an extraction stops before
    /// its next archive entry. Either way the cycle ends with
    /// [`UpdateError::Cancelled`], and only after nothing is left writing to
    /// the installation.
    pub async fn run_cycle(
        &self,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome> {
        let Some(_guard) = CycleGuard::acquire(&self.in_flight) else {
            tracing::debug!("Update cycle already in flight; ignoring request");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        let result = self.run_inner(events, cancel).await;

        match &result {
            Ok(outcome) => {
                if let Some(installed) = outcome.installed() {
                    events.emit(UpdateEvent::Succeeded { installed });
                }
            }
            Err(e) => {
                tracing::error!("Update cycle failed: {e}");
                events.emit(UpdateEvent::Failed {
                    message: e.user_message().to_string(),
                });
            }
        }
        result
    }

    async fn run_inner(
        &self,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome> {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        let installed = match self.store.load_detailed() {
            Loaded::Existing(state) => state.installed_version,
            Loaded::FirstRun(state) => {
                events.status("Creating installation record...");
                self.store.save(state)?;
                state.installed_version
            }
        };

        events.status("Checking for updates...");
        let manifest = until_cancelled(cancel, self.client.fetch_manifest()).await?;
        events.emit(UpdateEvent::VersionCheckComplete {
            installed,
            latest: manifest.latest_version,
        });

        let plan = plan(installed, &manifest)?;
        if plan.is_empty() {
            events.status("Game is up to date");
            return Ok(CycleOutcome::UpToDate { installed });
        }

        let total = plan.len();
        let mut applied = Vec::with_capacity(total);
        let mut current = installed;
        for (index, patch) in plan.into_iter().enumerate() {
            events.emit(UpdateEvent::PatchStarted {
                patch: patch.file_name().to_string(),
                index,
                total,
            });
            events.status(format!(
                "Downloading update {} of {}: {}",
                index + 1,
                total,
                patch
            ));
            let archive = until_cancelled(cancel, self.download_patch(&patch, events)).await?;

            events.status(format!("Installing {patch}..."));
            self.apply_patch(&patch, archive.clone(), events, cancel).await?;

            current = patch.version();
            self.store.save(InstalledState {
                installed_version: current,
            })?;
            events.emit(UpdateEvent::PatchApplied {
                patch: patch.file_name().to_string(),
                version: current,
            });

            if let Err(e) = std::fs::remove_file(&archive) {
                tracing::debug!("Cannot remove {}: {e}", archive.display());
            }
            applied.push(patch.file_name().to_string());
        }

        events.status(format!("Updated to {current}"));
        Ok(CycleOutcome::Updated {
            from: installed,
            to: current,
            applied,
        })
    }

    async fn download_patch(&self, patch: &PatchId, events: &EventSink) -> Result<PathBuf> {
        let destination = staged_archive_path(&self.settings.staging_path(), patch.file_name());
        let url = self.client.patch_url(patch.file_name());

        let mut stream = std::pin::pin!(download_to_file(
            self.client.http().clone(),
            url,
            destination
        ));
        while let Some(item) = stream.next().await {
            match item? {
                DownloadStreamItem::Progress(percent) => {
                    events.emit(UpdateEvent::DownloadProgress {
                        patch: patch.file_name().to_string(),
                        percent,
                    });
                }
                DownloadStreamItem::Complete(result) => return Ok(result.path),
            }
        }
        Err(UpdateError::Download {
            file: patch.file_name().to_string(),
            reason: "download ended without completing".to_string(),
        })
    }

    /// Extracts on the blocking pool. The task is always awaited, cancelled or
    /// not, so the cycle guard is held until the last write.
    async fn apply_patch(
        &self,
        patch: &PatchId,
        archive: PathBuf,
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let install_root = self.settings.install_root.clone();
        let sink = events.clone();
        let name = patch.file_name().to_string();
        let task_archive = archive.clone();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            let mut last = None;
            apply_archive(&task_archive, &install_root, &cancel, |progress| {
                let percent = progress.percentage();
                if last != Some(percent) {
                    last = Some(percent);
                    sink.emit(UpdateEvent::ExtractionProgress {
                        patch: name.clone(),
                        percent,
                    });
                }
            })
        })
        .await
        .map_err(|e| UpdateError::Extraction {
            archive,
            reason: format!("extraction task failed: {e}"),
        })??;
        Ok(())
    }

    /// Start the configured game and return its process id.
    pub fn launch_game(&self) -> Result<u32> {
        launch_game(&self.settings)
    }
}

/// Await `future` unless `cancel` fires first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(UpdateError::Cancelled),
        result = future => result,
    }
}

/// Start the game configured in `settings` and return its process id.
///
/// Needs no server access, so it works without a resolvable base URL.
pub fn launch_game(settings: &UpdaterSettings) -> Result<u32> {
    let game = settings
        .game
        .as_ref()
        .ok_or_else(|| UpdateError::Config("no game executable configured".to_string()))?;

    let working_dir = settings.resolve(game.working_dir.as_deref().unwrap_or(Path::new(".")));
    let executable = if game.executable.is_absolute() {
        game.executable.clone()
    } else {
        working_dir.join(&game.executable)
    };

    tracing::info!("Starting {}", executable.display());
    let child = Command::new(&executable)
        .args(&game.args)
        .current_dir(&working_dir)
        .spawn()
        .map_err(|e| UpdateError::Io(format!("cannot start {}: {e}", executable.display())))?;
    Ok(child.id())
}
