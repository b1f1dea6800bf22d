//! EntiGraph CLI
//!
//! Command-line tools for inspecting reconciliation scenarios.
//!
//! # Commands
//!
//! - `plan` - Reconcile a scenario and print the resulting save plan
//! - `order` - Print the type and within-type processing order

mod commands;
mod error;
mod scenario;

use clap::{Parser, Subcommand};
use commands::plan::PlanOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EntiGraph command-line reconciliation tools.
#[derive(Parser)]
#[command(name = "entigraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a scenario and print the save plan
    Plan {
        /// Path to the scenario file (JSON)
        scenario: PathBuf,

        /// Reconcile the roots without their reachable graph
        #[arg(short, long)]
        roots_only: bool,

        /// Do not merge duplicate instances
        #[arg(long)]
        no_merge: bool,

        /// Do not compare against persisted values
        #[arg(long)]
        no_compare: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the processing order of a scenario
    Order {
        /// Path to the scenario file (JSON)
        scenario: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Plan {
            scenario,
            roots_only,
            no_merge,
            no_compare,
            format,
        } => {
            let options = PlanOptions {
                roots_only,
                no_merge,
                no_compare,
            };
            commands::plan::run(&scenario, options, &format)?;
        }
        Commands::Order { scenario, format } => {
            commands::order::run(&scenario, &format)?;
        }
        Commands::Version => {
            println!("EntiGraph CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EntiGraph Core v{}", entigraph_core::VERSION);
        }
    }

    Ok(())
}
