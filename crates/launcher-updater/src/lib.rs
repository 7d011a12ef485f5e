//! Update engine for the game launcher.
//!
//! This crate keeps a game installation current against a remote update
//! server and replaces the launcher's own executable when it is outdated.
//!
//! # Overview
//!
//! The server publishes two JSON documents under a base URL:
//!
//! - `update.json` lists the latest game version and the cumulative patch
//!   archives (`update_<version>.zip`) under `updates/`
//! - `launcher_update.json` names the current launcher build under
//!   `launcher_updates/`
//!
//! The base URL itself is stored on disk in a small obfuscated blob.
//!
//! # Architecture
//!
//! - [`Orchestrator::run_cycle`] - fetch, plan, then download and apply each
//!   patch in order, persisting the installed version after every archive
//! - [`SelfUpdateCoordinator::check_and_maybe_handoff`] - compare the
//!   launcher's own version and start the helper relay
//! - [`plan()`] - pure patch-chain planning
//! - [`EventSink`] / [`ProgressModel`] - progress events for a front-end
//!
//! # Example
//!
//! ```no_run
//! use launcher_updater::{EventSink, Orchestrator, UpdaterSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn update() -> launcher_updater::Result<()> {
//!     let orchestrator = Orchestrator::new(UpdaterSettings::default())?;
//!     orchestrator.clean_staging()?;
//!
//!     let (events, mut rx) = EventSink::channel();
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let outcome = orchestrator
//!         .run_cycle(&events, &CancellationToken::new())
//!         .await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod error;
pub mod events;
pub mod manifest;
pub mod obfuscation;
pub mod plan;
pub mod state;
pub mod version;

// Server access and update steps
pub mod client;
pub mod steps;

// Coordination
pub mod orchestrator;
pub mod self_update;

pub use client::UpdateClient;
pub use config::{GameSettings, UpdaterSettings};
pub use error::{ParseError, PlanningError, Result, UpdateError};
pub use events::{EventReceiver, EventSink, Phase, ProgressModel, UpdateEvent};
pub use manifest::{LauncherDescriptor, PatchId, RemoteManifest};
pub use obfuscation::ObfuscatedBlob;
pub use orchestrator::{CycleOutcome, Orchestrator, UpdateCheck, launch_game};
pub use plan::{UpdatePlan, plan};
pub use self_update::{
    AutoConfirm, ConfirmHandoff, HandoffOutcome, HelperInvocation, HelperSpawner, ProcessSpawner,
    SelfUpdateCoordinator,
};
pub use state::{InstalledState, InstalledStateStore};
pub use steps::download::{DownloadProgress, DownloadStreamItem, format_bytes};
pub use version::Version;

/// Launcher version, from the crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
