//! CLI command definitions for the `flowdeck` binary.
//!
//! Uses clap derive macros for argument parsing. The console is a server
//! first: `flowdeck serve` is the main command, `completions` exists for
//! shell integration.

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Workflow console for a DolphinScheduler-compatible upstream.
#[derive(Parser)]
#[command(name = "flowdeck", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (overrides the configured value).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the configured value).
        #[arg(long)]
        host: Option<String>,

        /// Export spans through the OpenTelemetry stdout exporter.
        #[arg(long)]
        otel: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
