//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand};

use crate::commands::ReportKind;

/// erh - Loyalty points analytics
#[derive(Parser)]
#[command(name = "erh")]
#[command(about = "Loyalty-points ledger analytics and segmentation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Pipeline configuration file (TOML)
    ///
    /// Defaults to ~/.local/share/erh/config/pipeline.toml when present,
    /// otherwise the built-in configuration.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every derived table from a ledger and persist it
    Precompute {
        /// Raw ledger CSV
        #[arg(long)]
        ledger: PathBuf,

        /// Loyalty code lookup CSV (LOYAL_CODE, TXN_DESC)
        #[arg(long)]
        lookup: PathBuf,

        /// Output directory for the tables
        #[arg(short, long, default_value = "tables")]
        out: PathBuf,
    },

    /// List persisted tables
    Tables {
        /// Table directory
        #[arg(short, long, default_value = "tables")]
        dir: PathBuf,

        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute a report from a ledger, or serve it from precomputed tables
    #[command(group(
        ArgGroup::new("source")
            .required(true)
            .args(["ledger", "dir"]),
    ))]
    Report {
        /// Report to show
        #[arg(value_enum)]
        kind: ReportKind,

        /// Raw ledger CSV
        #[arg(long, requires = "lookup")]
        ledger: Option<PathBuf>,

        /// Loyalty code lookup CSV (LOYAL_CODE, TXN_DESC)
        #[arg(long, requires = "ledger")]
        lookup: Option<PathBuf>,

        /// Table directory written by `erh precompute`
        #[arg(short, long, conflicts_with_all = ["ledger", "lookup"])]
        dir: Option<PathBuf>,

        /// Year to report on (defaults to the latest year in the ledger)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Show which category a loyalty code falls into
    Classify {
        /// Loyalty codes to classify
        #[arg(required = true)]
        codes: Vec<String>,
    },
}
