//! On-disk table store
//!
//! One CSV file per named table plus a `manifest.json` recording the input
//! fingerprint, creation time and row counts. Every file is written to a
//! temporary file in the store directory and renamed into place.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::precompute::{PrecomputedTables, TableName};

const MANIFEST_FILE: &str = "manifest.json";

/// Metadata written next to the tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Fingerprint of the canonical dataset the tables were built from
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    /// Row count per table name
    pub tables: BTreeMap<String, usize>,
}

/// Directory of persisted derived tables
pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    /// Open a store, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| {
                Error::Store(format!(
                    "Failed to create table directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            info!("Created table directory: {}", dir.display());
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: TableName) -> PathBuf {
        self.dir.join(table.file_name())
    }

    /// Persist the canonical dataset and every derived table
    pub fn save(&self, dataset: &Dataset, tables: &PrecomputedTables) -> Result<Manifest> {
        let mut counts = BTreeMap::new();
        let mut record = |table: TableName, rows: usize| {
            counts.insert(table.as_str().to_string(), rows);
        };

        record(TableName::Transactions, self.write_table(TableName::Transactions, dataset.rows())?);
        record(
            TableName::UserMonthlyPoints,
            self.write_table(TableName::UserMonthlyPoints, &tables.user_monthly_points)?,
        );
        record(
            TableName::MonthlyRewardStats,
            self.write_table(TableName::MonthlyRewardStats, &tables.monthly_reward_stats)?,
        );
        record(
            TableName::PointCutoffCounts,
            self.write_table(TableName::PointCutoffCounts, &tables.point_cutoff_counts)?,
        );
        record(
            TableName::GroupedReward,
            self.write_table(TableName::GroupedReward, &tables.grouped_reward)?,
        );
        record(
            TableName::TransactionSummary,
            self.write_table(TableName::TransactionSummary, &tables.transaction_summary)?,
        );
        record(
            TableName::TransactionSummaryPadded,
            self.write_table(
                TableName::TransactionSummaryPadded,
                &tables.transaction_summary_padded,
            )?,
        );
        record(
            TableName::CodeGroupCodes,
            self.write_table(TableName::CodeGroupCodes, &tables.code_group_codes)?,
        );
        record(
            TableName::MoversMonthly,
            self.write_table(TableName::MoversMonthly, &tables.movers_monthly)?,
        );
        record(
            TableName::MonthlyBucketCounts,
            self.write_table(TableName::MonthlyBucketCounts, &tables.monthly_bucket_counts)?,
        );
        record(
            TableName::CodeAverageByYear,
            self.write_table(TableName::CodeAverageByYear, &tables.code_average_by_year)?,
        );
        record(
            TableName::ReachFrequency,
            self.write_table(TableName::ReachFrequency, &tables.reach_frequency)?,
        );
        record(
            TableName::UserMonths,
            self.write_table(TableName::UserMonths, &tables.user_months)?,
        );
        record(
            TableName::Thresholds,
            self.write_table(TableName::Thresholds, &tables.thresholds)?,
        );
        record(
            TableName::SegmentedUserMonths,
            self.write_table(TableName::SegmentedUserMonths, &tables.segmented_user_months)?,
        );
        record(
            TableName::SegmentMonthlyCounts,
            self.write_table(TableName::SegmentMonthlyCounts, &tables.segment_monthly_counts)?,
        );
        record(
            TableName::SegmentCodeSummary,
            self.write_table(TableName::SegmentCodeSummary, &tables.segment_code_summary)?,
        );
        record(
            TableName::SegmentPoints,
            self.write_table(TableName::SegmentPoints, &tables.segment_points)?,
        );
        record(
            TableName::AchieverProfile,
            self.write_table(TableName::AchieverProfile, &tables.achiever_profile)?,
        );
        record(
            TableName::CodeLookup,
            self.write_table(TableName::CodeLookup, &tables.code_lookup)?,
        );

        let manifest = Manifest {
            fingerprint: dataset.fingerprint().to_string(),
            created_at: Utc::now(),
            tables: counts,
        };
        self.write_manifest(&manifest)?;

        info!(
            "Saved {} tables to {}",
            manifest.tables.len(),
            self.dir.display()
        );
        Ok(manifest)
    }

    /// Read the manifest
    pub fn manifest(&self) -> Result<Manifest> {
        let path = self.dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "No table manifest in {}",
                self.dir.display()
            )));
        }
        let reader = BufReader::new(File::open(&path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn check_fingerprint(&self, expected: Option<&str>) -> Result<Manifest> {
        let manifest = self.manifest()?;
        if let Some(expected) = expected {
            if manifest.fingerprint != expected {
                return Err(Error::Store(format!(
                    "Tables in {} were built from dataset {}, expected {}",
                    self.dir.display(),
                    manifest.fingerprint,
                    expected
                )));
            }
        }
        Ok(manifest)
    }

    /// Load the canonical dataset
    ///
    /// The fingerprint is recomputed from the loaded rows and must match
    /// the manifest.
    pub fn load_dataset(&self) -> Result<Dataset> {
        let manifest = self.manifest()?;
        let dataset = Dataset::from_rows(self.read_table(TableName::Transactions)?);
        if dataset.fingerprint() != manifest.fingerprint {
            return Err(Error::Store(format!(
                "Stored dataset in {} does not match its manifest fingerprint",
                self.dir.display()
            )));
        }
        Ok(dataset)
    }

    /// Load every derived table, optionally checking the dataset fingerprint
    pub fn load(&self, expected_fingerprint: Option<&str>) -> Result<PrecomputedTables> {
        self.check_fingerprint(expected_fingerprint)?;

        Ok(PrecomputedTables {
            user_monthly_points: self.read_table(TableName::UserMonthlyPoints)?,
            monthly_reward_stats: self.read_table(TableName::MonthlyRewardStats)?,
            point_cutoff_counts: self.read_table(TableName::PointCutoffCounts)?,
            grouped_reward: self.read_table(TableName::GroupedReward)?,
            transaction_summary: self.read_table(TableName::TransactionSummary)?,
            transaction_summary_padded: self.read_table(TableName::TransactionSummaryPadded)?,
            code_group_codes: self.read_table(TableName::CodeGroupCodes)?,
            movers_monthly: self.read_table(TableName::MoversMonthly)?,
            monthly_bucket_counts: self.read_table(TableName::MonthlyBucketCounts)?,
            code_average_by_year: self.read_table(TableName::CodeAverageByYear)?,
            reach_frequency: self.read_table(TableName::ReachFrequency)?,
            user_months: self.read_table(TableName::UserMonths)?,
            thresholds: self.read_table(TableName::Thresholds)?,
            segmented_user_months: self.read_table(TableName::SegmentedUserMonths)?,
            segment_monthly_counts: self.read_table(TableName::SegmentMonthlyCounts)?,
            segment_code_summary: self.read_table(TableName::SegmentCodeSummary)?,
            segment_points: self.read_table(TableName::SegmentPoints)?,
            achiever_profile: self.read_table(TableName::AchieverProfile)?,
            code_lookup: self.read_table(TableName::CodeLookup)?,
        })
    }

    /// Write one table atomically, returning its row count
    pub fn write_table<T: Serialize>(&self, table: TableName, rows: &[T]) -> Result<usize> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = csv::Writer::from_writer(&mut tmp);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }

        let path = self.table_path(table);
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(rows.len())
    }

    /// Read one table in stored row order
    pub fn read_table<T: DeserializeOwned>(&self, table: TableName) -> Result<Vec<T>> {
        let path = self.table_path(table);
        if !path.exists() {
            return Err(Error::NotFound(format!("Table {} not found", path.display())));
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
        debug!("Read {} rows from {}", rows.len(), path.display());
        Ok(rows)
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, manifest)?;
        tmp.write_all(b"\n")?;
        tmp.persist(self.dir.join(MANIFEST_FILE))
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Analytics;
    use crate::cache::MemoCache;
    use crate::config::PipelineConfig;
    use crate::models::Lookup;
    use crate::precompute::precompute;
    use crate::test_utils::{dataset, raw, repeated};
    use tempfile::TempDir;

    fn sample() -> Dataset {
        let mut rows = repeated("C1", "10K_TRANSACTION", "JAN", "25", 700, 2);
        rows.push(raw("03-JAN-25", "C2", "12.5", Some("ARD_SEC"), Some("Opening, \"quoted\"")));
        rows.push(raw("04-FEB-25", "C2", "60", None, None));
        dataset(rows)
    }

    #[test]
    fn test_new_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nested").join("tables");
        let store = TableStore::new(&dir).unwrap();
        assert!(store.dir().exists());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = TableStore::new(temp.path()).unwrap();

        let config = PipelineConfig::default();
        let lookup = Lookup::new();
        let cache = MemoCache::new();
        let analytics = Analytics::new(&config, &lookup, &cache);
        let data = sample();
        let tables = precompute(&analytics, &data).unwrap();

        let manifest = store.save(&data, &tables).unwrap();
        assert_eq!(manifest.fingerprint, data.fingerprint());
        assert_eq!(manifest.tables.len(), TableName::all().len());
        assert_eq!(manifest.tables["transactions"], data.len());

        let loaded = store.load(Some(data.fingerprint())).unwrap();
        assert_eq!(loaded, tables);

        let reloaded = store.load_dataset().unwrap();
        assert_eq!(reloaded, data);
    }

    #[test]
    fn test_lookup_persists_with_tables() {
        let temp = TempDir::new().unwrap();
        let store = TableStore::new(temp.path()).unwrap();

        let config = PipelineConfig::default();
        let lookup: Lookup = vec![("ARD_SEC", "Account opening"), ("10K_TRANSACTION", "Card")]
            .into_iter()
            .collect();
        let cache = MemoCache::new();
        let analytics = Analytics::new(&config, &lookup, &cache);
        let data = sample();
        let tables = precompute(&analytics, &data).unwrap();
        let manifest = store.save(&data, &tables).unwrap();
        assert_eq!(manifest.tables["code_lookup"], 2);

        let loaded = store.load(Some(data.fingerprint())).unwrap();
        let rebuilt = Lookup::from_entries(&loaded.code_lookup);
        assert_eq!(rebuilt.describe("ARD_SEC"), "Account opening");
        assert_eq!(rebuilt.sorted_entries(), lookup.sorted_entries());
    }

    #[test]
    fn test_fingerprint_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let store = TableStore::new(temp.path()).unwrap();
        let data = sample();
        store.save(&data, &PrecomputedTables::default()).unwrap();

        let err = store.load(Some("not-the-fingerprint")).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(store.load(None).is_ok());
    }

    #[test]
    fn test_missing_manifest_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = TableStore::new(temp.path()).unwrap();
        assert!(matches!(store.manifest(), Err(Error::NotFound(_))));
        assert!(matches!(store.load(None), Err(Error::NotFound(_))));
    }
}
