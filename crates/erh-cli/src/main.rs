//! erh CLI - Loyalty points analytics
//!
//! Usage:
//!   erh precompute --ledger CSV --lookup CSV --out DIR   Build and persist every table
//!   erh tables --dir DIR                                 List persisted tables
//!   erh report segments --ledger CSV --lookup CSV        On-demand report
//!   erh report segments --dir DIR                        Report from stored tables
//!   erh classify CODE...                                 Show a code's category

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Precompute {
            ledger,
            lookup,
            out,
        } => commands::cmd_precompute(cli.config.as_deref(), &ledger, &lookup, &out),
        Commands::Tables { dir, json } => commands::cmd_tables(&dir, json),
        Commands::Report {
            kind,
            ledger,
            lookup,
            dir,
            year,
        } => {
            let input = commands::ReportInput::from_args(ledger, lookup, dir)?;
            commands::cmd_report(cli.config.as_deref(), kind, &input, year)
        }
        Commands::Classify { codes } => commands::cmd_classify(&codes),
    }
}
