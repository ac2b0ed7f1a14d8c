//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// NSync - keep local folders mirrored to remote storage
#[derive(Parser, Debug)]
#[command(name = "nsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// REST port of the daemon [default: from config, 1982]
    #[arg(short, long, global = true, env = "NSYNC_PORT")]
    pub port: Option<u16>,

    /// Log level or filter directives [default: from config, info]
    #[arg(long, global = true)]
    pub log: Option<String>,

    /// Log to the terminal instead of the daemon log file
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration directory [default: platform config dir + nsync]
    #[arg(long, global = true, env = "NSYNC_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the daemon and its REST endpoint
    Server,

    /// Check whether the daemon is running
    Status,

    /// Stop the daemon
    Stop,

    /// Register a folder to be synchronized
    ///
    /// Examples:
    ///   nsync add-folder file:///home/me/docs file:///mnt/backup/docs
    AddFolder {
        /// Local folder URI, e.g. 'file:///home/me/docs'
        local_uri: String,

        /// Remote folder URI, e.g. 'file:///mnt/backup/docs'
        remote_uri: String,
    },

    /// List registered folders
    Folders,
}
