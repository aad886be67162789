//! Batch mode: precompute and persist every derived table

use std::path::Path;

use anyhow::{Context, Result};
use erh_core::{precompute, Analytics, MemoCache, TableName, TableStore};

use super::{load_config, load_inputs, print_cleaning_report};

pub fn cmd_precompute(
    config_path: Option<&Path>,
    ledger: &Path,
    lookup: &Path,
    out: &Path,
) -> Result<()> {
    let config = load_config(config_path)?;
    let (data, lookup, report) = load_inputs(&config, ledger, lookup)?;

    println!();
    println!("📥 Ledger: {}", ledger.display());
    print_cleaning_report(&report);

    let cache = MemoCache::new();
    let analytics = Analytics::new(&config, &lookup, &cache);
    let tables = precompute(&analytics, &data).context("Failed to compute tables")?;

    let store = TableStore::new(out)?;
    let manifest = store.save(&data, &tables).context("Failed to save tables")?;

    println!();
    println!("💾 Saved {} tables to {}", manifest.tables.len(), out.display());
    println!(
        "   Fingerprint: {}",
        manifest.fingerprint.get(..12).unwrap_or(&manifest.fingerprint)
    );
    let fallback_years: Vec<String> = tables
        .thresholds
        .iter()
        .filter(|t| t.fallback_used)
        .map(|t| t.year.to_string())
        .collect();
    if !fallback_years.is_empty() {
        println!(
            "   ⚠️  Percentile fallback used for: {}",
            fallback_years.join(", ")
        );
    }

    Ok(())
}

pub fn cmd_tables(dir: &Path, json: bool) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Table directory not found: {}", dir.display());
    }
    let store = TableStore::new(dir)?;
    let manifest = store
        .manifest()
        .with_context(|| format!("No precomputed tables in {}", dir.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    println!();
    println!("📦 Tables in {}", dir.display());
    println!("   Fingerprint: {}", manifest.fingerprint);
    println!(
        "   Created:     {}",
        manifest.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("   ─────────────────────────────────────────────");
    println!("   {:30} │ {:>8}", "Table", "Rows");
    println!("   ───────────────────────────────┼──────────");

    for table in TableName::all() {
        match manifest.tables.get(table.as_str()) {
            Some(rows) => println!("   {:30} │ {:>8}", table.as_str(), rows),
            None => println!("   {:30} │ {:>8}", table.as_str(), "missing"),
        }
    }

    Ok(())
}
