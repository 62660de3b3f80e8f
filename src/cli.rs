//! CLI command definitions using clap.
//!
//! Subcommands:
//! - run: drive a loop in a workspace until a stop condition fires
//! - status: report lock ownership and the latest run outcome
//! - stop: ask the loop running in a workspace to stop

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// looprun - an autonomous iteration controller
#[derive(Parser, Debug)]
#[command(name = "looprun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a loop until a stop condition fires
    Run {
        /// Workspace directory (defaults to the current directory)
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Shell command to run each iteration (overrides config)
        #[arg(long)]
        command: Option<String>,

        /// Iteration budget, 0 = unlimited (overrides config)
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Wall-clock budget in seconds, 0 = unlimited (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Cost budget, 0 = unlimited (overrides config)
        #[arg(long)]
        max_cost: Option<f64>,

        /// Token budget, 0 = unlimited (overrides config)
        #[arg(long)]
        max_tokens: Option<u64>,

        /// Consecutive-failure cap, 0 = unlimited (overrides config)
        #[arg(long)]
        max_failures: Option<u32>,

        /// Consecutive "done" confirmations required (overrides config)
        #[arg(long)]
        confirmations: Option<u32>,

        /// Stdout marker counting as a completion confirmation
        #[arg(long)]
        marker: Option<String>,
    },

    /// Report lock ownership and the latest run outcome for a workspace
    Status {
        /// Workspace directory
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
    },

    /// Ask the loop running in a workspace to stop
    Stop {
        /// Workspace directory
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Reason recorded with the stop request
        #[arg(short, long)]
        reason: Option<String>,
    },
}
