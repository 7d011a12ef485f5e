//! Subcommand implementations.

use std::io::{self, IsTerminal};
use std::path::Path;

use anyhow::{Context, Result, bail};
use launcher_updater::obfuscation::{self, ObfuscatedBlob};
use launcher_updater::{
    AutoConfirm, ConfirmHandoff, CycleOutcome, EventSink, HandoffOutcome, Orchestrator,
    ProcessSpawner, SelfUpdateCoordinator, UpdaterSettings, Version, launch_game,
};
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, DecodeBlobArgs, EncodeBlobArgs, RunArgs};
use crate::progress::ProgressRenderer;
use crate::prompt::TerminalConfirm;

/// Default settings file name; a missing default file is not an error.
const DEFAULT_CONFIG: &str = "launcher.toml";

/// What `run` ended with.
#[derive(Debug)]
pub enum RunResult {
    /// The helper is replacing the launcher; exit immediately.
    HandedOff,
    /// The update cycle finished.
    Cycle(CycleOutcome),
}

/// Load settings and apply command-line overrides.
pub fn load_settings(cli: &Cli) -> Result<UpdaterSettings> {
    let mut settings = if cli.config.is_file() {
        UpdaterSettings::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else if cli.config == Path::new(DEFAULT_CONFIG) {
        tracing::debug!("No {DEFAULT_CONFIG}; using default settings");
        UpdaterSettings::default()
    } else {
        bail!("settings file {} not found", cli.config.display());
    };

    if let Some(root) = &cli.install_root {
        settings.install_root.clone_from(root);
    }
    if let Some(url) = &cli.base_url {
        settings.base_url = Some(url.clone());
    }
    Ok(settings)
}

/// Self-update, then update the game, then optionally start it.
pub async fn run_update(settings: UpdaterSettings, args: &RunArgs) -> Result<RunResult> {
    let orchestrator = Orchestrator::new(settings).context("preparing the updater")?;

    if orchestrator.settings().clean_staging_on_start
        && let Err(e) = orchestrator.clean_staging()
    {
        tracing::warn!("Could not clean staging directory: {e}");
    }

    let visible = io::stderr().is_terminal();
    let (events, rx) = EventSink::channel();
    let renderer = tokio::spawn(ProgressRenderer::new(visible).drive(rx));

    if !args.skip_self_update && self_update(&orchestrator, args.yes, &events).await? {
        drop(events);
        let _ = renderer.await;
        return Ok(RunResult::HandedOff);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; stopping the update");
                cancel.cancel();
            }
        })
    };

    let outcome = orchestrator.run_cycle(&events, &cancel).await;
    ctrl_c.abort();
    drop(events);
    let _ = renderer.await;

    let outcome = outcome.map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))?;
    if args.launch {
        let pid = launch_game(orchestrator.settings()).context("starting the game")?;
        tracing::info!("Game started (pid {pid})");
    }
    Ok(RunResult::Cycle(outcome))
}

/// Returns `true` when the helper has taken over.
async fn self_update(orchestrator: &Orchestrator, yes: bool, events: &EventSink) -> Result<bool> {
    let launcher_path = std::env::current_exe().context("locating the launcher executable")?;
    let confirm: Box<dyn ConfirmHandoff> = if yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(TerminalConfirm)
    };
    let coordinator = SelfUpdateCoordinator::new(
        orchestrator.client().clone(),
        orchestrator.settings(),
        launcher_path,
        confirm,
        Box::new(ProcessSpawner),
    );

    match coordinator
        .check_and_maybe_handoff(Version::current(), events)
        .await
    {
        Ok(HandoffOutcome::HandedOff(_)) => Ok(true),
        Ok(HandoffOutcome::Declined | HandoffOutcome::UpToDate) => Ok(false),
        Err(e) => {
            tracing::warn!("Launcher self-update check failed: {e}");
            Ok(false)
        }
    }
}

/// Print the installed version and pending patches.
pub async fn run_check(settings: UpdaterSettings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings).context("preparing the updater")?;
    let check = orchestrator
        .check()
        .await
        .map_err(|e| anyhow::anyhow!("{}: {e}", e.user_message()))?;

    println!("Installed: {}", check.installed);
    println!("Latest:    {}", check.latest);
    if check.plan.is_empty() {
        println!("Up to date");
    } else {
        println!("Pending updates:");
        for name in check.plan.file_names() {
            println!("  {name}");
        }
    }
    Ok(())
}

/// Start the game.
pub fn run_launch(settings: &UpdaterSettings) -> Result<()> {
    let pid = launch_game(settings).context("starting the game")?;
    println!("Game started (pid {pid})");
    Ok(())
}

/// Print the URL stored in a blob.
pub fn run_decode_blob(args: &DecodeBlobArgs) -> Result<()> {
    let blob = ObfuscatedBlob::read(&args.file)?;
    println!("{}", blob.decode());
    Ok(())
}

/// Write a URL into a new blob.
pub fn run_encode_blob(args: &EncodeBlobArgs) -> Result<()> {
    let bytes = obfuscation::encode(&args.url, &obfuscation::header_with_seed(args.seed));
    std::fs::write(&args.file, bytes)
        .with_context(|| format!("writing {}", args.file.display()))?;
    println!("Wrote {}", args.file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let cli = Cli::try_parse_from(["launcher", "check", "--install-root", "/opt/game"]).unwrap();
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.install_root, Path::new("/opt/game"));
        assert!(settings.base_url.is_none());
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let cli =
            Cli::try_parse_from(["launcher", "check", "--config", "/nonexistent/launcher.toml"])
                .unwrap();
        assert!(load_settings(&cli).is_err());
    }

    #[test]
    fn test_config_file_with_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("custom.toml");
        std::fs::write(&config, "base_url = \"http://a/\"\nstate_file = \"state.json\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "launcher",
            "check",
            "--config",
            config.to_str().unwrap(),
            "--base-url",
            "http://b/",
        ])
        .unwrap();
        let settings = load_settings(&cli).unwrap();
        assert_eq!(settings.base_url.as_deref(), Some("http://b/"));
        assert_eq!(settings.state_file, Path::new("state.json"));
    }

    #[test]
    fn test_blob_commands_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lccnct.dta");
        run_encode_blob(&EncodeBlobArgs {
            url: "http://example.test/Launcher/".to_string(),
            file: file.clone(),
            seed: 7,
        })
        .unwrap();

        let blob = ObfuscatedBlob::read(&file).unwrap();
        assert_eq!(blob.decode(), "http://example.test/Launcher/");
        run_decode_blob(&DecodeBlobArgs { file }).unwrap();
    }
}
