//! Progress events emitted during an update cycle.
//!
//! The engine never touches presentation state. It sends [`UpdateEvent`]s
//! through an unbounded channel; a front-end folds them into a
//! [`ProgressModel`] and renders that.

use tokio::sync::mpsc;

use crate::version::Version;

/// Something the front-end may want to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// Human-readable status line.
    Status(String),
    /// The manifest has been fetched and compared with the installation.
    VersionCheckComplete {
        /// Installed version.
        installed: Version,
        /// Latest published version.
        latest: Version,
    },
    /// A patch is about to be downloaded.
    PatchStarted {
        /// Archive name.
        patch: String,
        /// Zero-based position in the plan.
        index: usize,
        /// Number of patches in the plan.
        total: usize,
    },
    /// Download progress of the current patch, 0-100.
    DownloadProgress {
        /// Archive name.
        patch: String,
        /// Percent complete.
        percent: u8,
    },
    /// Extraction progress of the current patch, 0-100.
    ExtractionProgress {
        /// Archive name.
        patch: String,
        /// Percent of entries extracted.
        percent: u8,
    },
    /// A patch was applied and its version persisted.
    PatchApplied {
        /// Archive name.
        patch: String,
        /// Newly installed version.
        version: Version,
    },
    /// The cycle finished and the installation is current.
    Succeeded {
        /// Installed version.
        installed: Version,
    },
    /// The cycle failed.
    Failed {
        /// User-facing message.
        message: String,
    },
}

/// Receiving half handed to the front-end.
pub type EventReceiver = mpsc::UnboundedReceiver<UpdateEvent>;

/// Sending half used by the engine. Sending never blocks.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<UpdateEvent>>,
}

impl EventSink {
    /// Creates a connected sink and its receiver.
    #[must_use]
    pub fn channel() -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event.
    #[must_use]
    pub fn discard() -> Self {
        Self { tx: None }
    }

    /// Send an event. A closed receiver is not an error.
    pub fn emit(&self, event: UpdateEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    /// Send a status line.
    pub fn status(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.emit(UpdateEvent::Status(message));
    }
}

/// Coarse stage of the cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet.
    #[default]
    Idle,
    /// Fetching and comparing versions.
    Checking,
    /// Downloading a patch.
    Downloading,
    /// Extracting a patch.
    Extracting,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// Plain data view of an update cycle, rebuilt from events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressModel {
    /// Current stage.
    pub phase: Phase,
    /// Last status line.
    pub status: String,
    /// Installed version, once known.
    pub installed: Option<Version>,
    /// Latest published version, once known.
    pub latest: Option<Version>,
    /// Patch being processed.
    pub current_patch: Option<String>,
    /// One-based position of the current patch.
    pub patch_number: usize,
    /// Patches in the plan.
    pub patch_total: usize,
    /// Download percent of the current patch.
    pub download_percent: u8,
    /// Extraction percent of the current patch.
    pub extract_percent: u8,
    /// Error shown to the user, if the cycle failed.
    pub error: Option<String>,
}

impl ProgressModel {
    /// Fold one event into the model.
    pub fn apply(&mut self, event: &UpdateEvent) {
        match event {
            UpdateEvent::Status(message) => {
                self.status.clone_from(message);
                if self.phase == Phase::Idle {
                    self.phase = Phase::Checking;
                }
            }
            UpdateEvent::VersionCheckComplete { installed, latest } => {
                self.phase = Phase::Checking;
                self.installed = Some(*installed);
                self.latest = Some(*latest);
            }
            UpdateEvent::PatchStarted {
                patch,
                index,
                total,
            } => {
                self.phase = Phase::Downloading;
                self.current_patch = Some(patch.clone());
                self.patch_number = index + 1;
                self.patch_total = *total;
                self.download_percent = 0;
                self.extract_percent = 0;
            }
            UpdateEvent::DownloadProgress { percent, .. } => {
                self.phase = Phase::Downloading;
                self.download_percent = self.download_percent.max(*percent);
            }
            UpdateEvent::ExtractionProgress { percent, .. } => {
                self.phase = Phase::Extracting;
                self.download_percent = 100;
                self.extract_percent = self.extract_percent.max(*percent);
            }
            UpdateEvent::PatchApplied { version, .. } => {
                self.installed = Some(*version);
                self.extract_percent = 100;
            }
            UpdateEvent::Succeeded { installed } => {
                self.phase = Phase::Completed;
                self.installed = Some(*installed);
                self.download_percent = 100;
                self.extract_percent = 100;
                self.error = None;
            }
            UpdateEvent::Failed { message } => {
                self.phase = Phase::Failed;
                self.error = Some(message.clone());
            }
        }
    }

    /// Whether the cycle has finished, successfully or not.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Completed | Phase::Failed)
    }
}
