//! NSync command-line interface.
//!
//! `nsync server` runs the daemon with its REST endpoint; every other
//! command is a thin client of that endpoint.

mod api;
mod cli;
mod client;
mod error;
mod logging;
mod server;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use nsync_kernel::config::default_config_dir;
use nsync_kernel::DaemonConfig;

use cli::{Cli, Command};
use client::Client;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let config = DaemonConfig::load(&config_dir).context("failed to load configuration")?;
    let port = cli.port.unwrap_or(config.port);
    let level = cli.log.clone().unwrap_or_else(|| config.log_level.clone());

    if cli.command == Command::Server {
        logging::init_daemon(&level, cli.verbose, &config.log_path())?;
        return server::run(config, port).await;
    }

    if cli.verbose {
        logging::init_console(&level);
    }
    let client = Client::new(port)?;

    match cli.command {
        Command::Status => {
            let status = client.status().await.context("unable to reach daemon")?;
            println!("Server is running. Uptime: {} minutes", status.uptime_mins);
        }
        Command::Stop => {
            let status = client.shutdown().await.context("unable to stop daemon")?;
            println!("Server stopped. Uptime: {} minutes", status.uptime_mins);
        }
        Command::AddFolder {
            local_uri,
            remote_uri,
        } => {
            let folder = client
                .add_folder(&local_uri, &remote_uri)
                .await
                .context("unable to add folder")?;
            println!("Sync folder created. Uid: {}", folder.uid);
        }
        Command::Folders => {
            let folders = client.folders().await.context("unable to list folders")?;
            if folders.is_empty() {
                println!("No folders registered.");
            }
            for folder in folders {
                println!("{}  {} -> {}", folder.uid, folder.local_uri, folder.remote_uri);
            }
        }
        Command::Server => {}
    }
    Ok(())
}
