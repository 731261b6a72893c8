//! CLI argument definitions using clap
//!
//! Commands:
//! - openattr run --scenario <path> [--config <path>] [--metrics]
//! - openattr explain --scenario <path> [--config <path>] [--analyze] [--json]
//! - openattr cost --subplan <cost> [--selectivity <s>] [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Query execution over open attributes
#[derive(Parser, Debug)]
#[command(name = "openattr")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Enumerate every combination of a scenario and print the rows
    Run {
        /// Path to the scenario file
        #[arg(long)]
        scenario: PathBuf,

        /// Engine configuration; overrides the scenario's own
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the execution counters after the rows
        #[arg(long)]
        metrics: bool,
    },

    /// Show the strategy and cost state of a scenario's pipeline
    Explain {
        /// Path to the scenario file
        #[arg(long)]
        scenario: PathBuf,

        /// Engine configuration; overrides the scenario's own
        #[arg(long)]
        config: Option<PathBuf>,

        /// Execute first so measured selectivities are shown
        #[arg(long)]
        analyze: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the cost estimate of a subplan under an open attribute
    Cost {
        /// Cost of the subplan below the open attribute
        #[arg(long)]
        subplan: f64,

        /// Selectivity of the attribute's restrictions; defaults to the configured one
        #[arg(long)]
        selectivity: Option<f64>,

        /// Cost model: only_s, only_k, both, none; defaults to the configured one
        #[arg(long)]
        model: Option<String>,

        /// Engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
