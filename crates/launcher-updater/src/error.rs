//! Error types for the update engine.

use std::path::PathBuf;

use thiserror::Error;

/// A version string that is not four dot-separated integers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The string does not have the expected `major.minor.patch.build` shape.
    #[error("malformed version string: {0:?}")]
    MalformedVersion(String),
}

/// The manifest cannot produce a usable plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    /// A newer version is advertised but the manifest lists no patches at all.
    #[error("manifest advertises {latest} but publishes no updates")]
    NoUpdatesPublished {
        /// The advertised latest version.
        latest: String,
    },

    /// A newer version is advertised but no listed patch is newer than the installation.
    #[error("manifest advertises {latest} but no published update is newer than {installed}")]
    LatestUnreachable {
        /// The advertised latest version.
        latest: String,
        /// The installed version.
        installed: String,
    },
}

/// Errors that can occur during an update cycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// A version string could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Transport failure while talking to the update server.
    #[error("network error: {0}")]
    Network(String),

    /// The manifest or launcher descriptor is empty or malformed.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// The manifest is internally inconsistent.
    #[error(transparent)]
    Planning(#[from] PlanningError),

    /// A patch archive could not be downloaded.
    #[error("failed to download {file}: {reason}")]
    Download {
        /// File name or URL being downloaded.
        file: String,
        /// What went wrong.
        reason: String,
    },

    /// A patch archive could not be applied. Entries extracted before the
    /// failure are left in place.
    #[error("failed to apply {archive}: {reason}")]
    Extraction {
        /// The archive being applied.
        archive: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The installed-state file could not be written.
    #[error("failed to {operation} installed state at {path}")]
    Store {
        /// The operation that failed.
        operation: &'static str,
        /// Path of the state file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The local configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The launcher could not hand off to the update helper.
    #[error("self-update error: {0}")]
    SelfUpdate(String),

    /// The cycle was cancelled by the caller.
    #[error("update cancelled")]
    Cancelled,

    /// I/O error outside of the state store.
    #[error("I/O error: {0}")]
    Io(String),
}

impl UpdateError {
    /// Returns a user-friendly error message suitable for display in the UI.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::Network(_) => {
                "Could not reach the update server. Please check your internet connection."
            }
            Self::Manifest(_) | Self::Planning(_) => {
                "The update server returned invalid update information."
            }
            Self::Download { .. } => "An update could not be downloaded. Please try again.",
            Self::Extraction { .. } => {
                "An update could not be applied. Some game files may have been partially updated."
            }
            Self::Store { .. } => "The installed version could not be saved.",
            Self::Config(_) => "The launcher configuration is missing or damaged.",
            Self::SelfUpdate(_) => "The launcher could not update itself.",
            Self::Cancelled => "The update was cancelled.",
            Self::Parse(_) | Self::Io(_) => "An unexpected error occurred.",
        }
    }

    /// Returns whether running the whole cycle again on a later launch may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Manifest(_) | Self::Download { .. } | Self::Cancelled
        )
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<std::io::Error> for UpdateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Manifest(err.to_string())
    }
}

/// Result type alias for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;
