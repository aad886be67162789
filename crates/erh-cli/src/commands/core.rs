//! Shared command utilities

use std::path::Path;

use anyhow::{Context, Result};
use erh_core::import::{read_ledger, read_lookup};
use erh_core::{CleaningReport, Dataset, DatasetBuilder, Lookup, PipelineConfig};

/// Resolve the pipeline configuration (explicit path, user override, built-in)
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => PipelineConfig::load().context("Failed to load config"),
    }
}

/// Read and clean a ledger, plus its code lookup
pub fn load_inputs(
    config: &PipelineConfig,
    ledger: &Path,
    lookup: &Path,
) -> Result<(Dataset, Lookup, CleaningReport)> {
    let raw = read_ledger(ledger)
        .with_context(|| format!("Failed to read ledger {}", ledger.display()))?;
    let lookup = read_lookup(lookup)
        .with_context(|| format!("Failed to read lookup {}", lookup.display()))?;

    let output = DatasetBuilder::new(config)
        .build(raw)
        .context("Failed to build dataset")?;

    Ok((output.dataset, lookup, output.report))
}

/// Print the cleaning report
pub fn print_cleaning_report(report: &CleaningReport) {
    println!("   Rows read:        {:>8}", report.input_rows);
    println!("   Rows kept:        {:>8}", report.kept_rows);
    if report.dropped_rows() > 0 {
        println!("   Dropped:");
        println!("     test entries    {:>8}", report.dropped_test_description);
        println!("     excluded code   {:>8}", report.dropped_excluded_code);
        println!("     bad date        {:>8}", report.dropped_bad_date);
    }
    if report.filled_missing_code > 0 {
        println!("   Missing codes:    {:>8}", report.filled_missing_code);
    }
    if report.coerced_amounts > 0 {
        println!("   Coerced amounts:  {:>8}", report.coerced_amounts);
    }
    let promos = report.reclassified_crypto_week + report.reclassified_lotto;
    if promos > 0 {
        println!(
            "   Promotions:       {:>8} (crypto week {}, lottery {})",
            promos, report.reclassified_crypto_week, report.reclassified_lotto
        );
    }
}
