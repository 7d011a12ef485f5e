//! CLI library components for the game launcher.

pub mod logging;
