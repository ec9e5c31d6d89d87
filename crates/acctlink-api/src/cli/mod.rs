//! CLI command definitions and dispatch for the `acctlink` binary.
//!
//! Uses clap derive macros for argument parsing. `serve` runs the HTTP API;
//! the other commands inspect the provider catalog and operate the review
//! queue directly against the configured storage.

pub mod provider;
pub mod review;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use review::ReviewCommand;

/// Link external financial accounts and review the resulting connections.
#[derive(Parser)]
#[command(name = "acctlink", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Database URL (defaults to `{data_dir}/acctlink.db`).
    #[arg(long, env = "ACCTLINK_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, env = "ACCTLINK_PORT", default_value = "3000")]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// List the providers accounts can be linked from.
    Providers,

    /// Inspect and decide submitted connections.
    Review {
        #[command(subcommand)]
        command: ReviewCommand,
    },

    /// Show storage backend, review counts and configuration.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
