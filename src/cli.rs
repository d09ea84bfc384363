// Command-line interface definitions for hyprvoice
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hyprvoice")]
#[command(author, version, about = "Push-to-talk voice typing for Wayland/Hyprland")]
#[command(long_about = "
Hyprvoice turns a push-to-talk keybind into typed text.
A background daemon records your microphone, transcribes the audio through
a hosted or local speech-to-text provider, and injects the result into the
focused application.

SETUP:
  1. Run: hyprvoice configure (set provider and API key)
  2. Start the daemon: hyprvoice serve (or the systemd user service)
  3. Bind a compositor key to: hyprvoice toggle

USAGE:
  Press the keybind to start recording, press again to stop and inject.
  Press once more during transcription to commit early, or run
  `hyprvoice cancel` to abort the current operation.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daemon in the foreground
    Serve,

    /// Toggle recording on/off
    Toggle,

    /// Cancel the current operation
    Cancel,

    /// Show the current pipeline status
    Status,

    /// Show the control protocol version
    Version,

    /// Stop a running daemon
    Stop,

    /// Show the configuration file location
    Configure,
}
