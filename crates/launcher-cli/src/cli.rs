//! CLI argument definitions for the launcher.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "launcher",
    version,
    about = "Game launcher - keep the installation current and start the game",
    long_about = "Keep a game installation current against its update server.\n\n\
                  Applies cumulative patch archives in version order, replaces the\n\
                  launcher itself when a newer build is published, and starts the game."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (TOML). Defaults are used when the default file is absent.
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = "launcher.toml",
        global = true
    )]
    pub config: PathBuf,

    /// Game installation root (overrides the settings file).
    #[arg(long = "install-root", value_name = "DIR", global = true)]
    pub install_root: Option<PathBuf>,

    /// Update server base URL (skips the server blob).
    #[arg(long = "base-url", value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Update the launcher and the game.
    Run(RunArgs),

    /// Show the installed version and the patches a run would apply.
    Check,

    /// Start the game without updating.
    Launch,

    /// Print the server URL stored in an obfuscated blob.
    DecodeBlob(DecodeBlobArgs),

    /// Write a server URL into an obfuscated blob.
    EncodeBlob(EncodeBlobArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Start the game once the installation is current.
    #[arg(long = "launch")]
    pub launch: bool,

    /// Accept a launcher update without asking.
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,

    /// Do not check for a newer launcher.
    #[arg(long = "skip-self-update")]
    pub skip_self_update: bool,
}

#[derive(Parser)]
pub struct DecodeBlobArgs {
    /// Blob file to read.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Parser)]
pub struct EncodeBlobArgs {
    /// URL to store.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Blob file to write.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Header seed byte.
    #[arg(long = "seed", default_value_t = 0x5a)]
    pub seed: u8,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
