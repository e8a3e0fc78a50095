// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Switchboard - request management control plane for a multi-channel
//! self-service assistant.
//!
//! This binary hosts the Request Router, Agent Worker, and Integration
//! Dispatcher, individually or all in one process.

mod serve;
mod shutdown;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Switchboard control plane.
#[derive(Parser, Debug)]
#[command(name = "switchboard", version, about, long_about = None)]
struct Cli {
    /// Path to a config file (otherwise the XDG hierarchy is searched).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the Request Router.
    Router,
    /// Run the Agent Worker.
    Worker,
    /// Run the Integration Dispatcher.
    Dispatcher,
    /// Run all three services in one process (development).
    All,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => switchboard_config::load_config_from_path(path),
        None => switchboard_config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    let service = match cli.command {
        Commands::Router => serve::Service::Router,
        Commands::Worker => serve::Service::Worker,
        Commands::Dispatcher => serve::Service::Dispatcher,
        Commands::All => serve::Service::All,
    };

    if let Err(e) = serve::run(service, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
