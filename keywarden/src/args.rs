use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keywarden
#[derive(Debug, Parser)]
#[command(name = "keywarden", about = "Client error notifier with permission repair")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "keywarden.toml", env = "KEYWARDEN_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show live errors and the permission each 403 implies
    List {
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Record an error explicitly
    Record {
        message: String,

        /// Record as a warning
        #[arg(long)]
        warning: bool,

        #[arg(long)]
        status: Option<u16>,

        /// Prefixed to the message as `context: message`
        #[arg(long)]
        context: Option<String>,

        /// URL of the failing request
        #[arg(long)]
        url: Option<String>,

        /// Method of the failing request
        #[arg(long, default_value = "GET", requires = "url")]
        method: String,
    },

    /// Dismiss one error
    Dismiss { id: String },

    /// Dismiss every error
    Clear,

    /// Grant the permission a recorded 403 implies
    Fix { id: String },

    /// Send a request to the admin backend; failures are recorded
    Request {
        method: String,
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },

    /// Show the permission a request implies
    Permission {
        method: String,
        url: String,

        #[arg(long, default_value_t = 403)]
        status: u16,
    },

    /// Follow the error store until interrupted
    Watch,
}
