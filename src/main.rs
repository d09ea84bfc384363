//! Hyprvoice binary: daemon plus thin control-bus client
//!
//! `hyprvoice serve` runs the daemon; every other subcommand sends one
//! command byte over the control socket and prints the reply.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use hyprvoice::{bus, config, daemon::Daemon};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("hyprvoice={},warn", log_level))),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve => {
            let daemon = match cli.config {
                Some(path) => Daemon::with_manager(
                    config::Manager::with_path(path)?,
                    bus::socket_path(),
                    bus::pid_path(),
                ),
                None => Daemon::new()?,
            };
            daemon.run().await?;
        }

        Commands::Toggle => client_command(b't').await?,
        Commands::Cancel => client_command(b'c').await?,
        Commands::Status => client_command(b's').await?,
        Commands::Version => client_command(b'v').await?,
        Commands::Stop => client_command(b'q').await?,

        Commands::Configure => {
            let path = match cli.config {
                Some(path) => path,
                None => config::config_path()?,
            };
            // Creates the documented default file on first use
            let loaded = config::load_from(&path)?;
            println!("Config file: {}", path.display());
            println!("Provider:    {}", loaded.transcription.provider);
            println!("Backends:    {}", loaded.injection.backends.join(", "));
            println!();
            println!("Edit the file; a running daemon applies changes automatically.");
        }
    }

    Ok(())
}

/// Send one control command and print the daemon's reply.
/// `ERR` replies and connection failures propagate as nonzero exits.
async fn client_command(cmd: u8) -> anyhow::Result<()> {
    let reply = bus::send_command(cmd).await?;
    println!("{}", reply);
    Ok(())
}
