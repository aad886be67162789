//! Dataset Builder
//!
//! Turns raw ledger rows into the canonical dataset: sentinel rows are
//! dropped, dates parsed, amounts coerced, descriptions normalized,
//! promotional codes rewritten and every row classified.
//!
//! Rows are never dropped silently. Every drop and rewrite is counted in a
//! [`CleaningReport`] returned next to the dataset.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::classify::classify_code;
use crate::config::{IngestConfig, PipelineConfig};
use crate::error::Result;
use crate::models::{RawTransaction, Transaction};

/// Row counts per cleaning decision
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub kept_rows: usize,
    pub dropped_test_description: usize,
    pub dropped_excluded_code: usize,
    pub dropped_bad_date: usize,
    pub filled_missing_code: usize,
    /// Amounts that were not a plain non-negative integer
    pub coerced_amounts: usize,
    pub reclassified_crypto_week: usize,
    pub reclassified_lotto: usize,
}

impl CleaningReport {
    pub fn dropped_rows(&self) -> usize {
        self.dropped_test_description + self.dropped_excluded_code + self.dropped_bad_date
    }
}

/// The canonical dataset plus the record of how it was cleaned
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub dataset: Dataset,
    pub report: CleaningReport,
}

/// Immutable canonical dataset with a content fingerprint
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    rows: Vec<Transaction>,
    fingerprint: String,
}

impl Dataset {
    /// Wrap canonical rows, fingerprinting their content
    pub fn from_rows(rows: Vec<Transaction>) -> Self {
        let fingerprint = fingerprint_rows(&rows);
        Self { rows, fingerprint }
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Transaction> {
        self.rows
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct calendar years, ascending
    pub fn years(&self) -> Vec<i32> {
        self.rows
            .iter()
            .map(|t| t.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Rows of one year, as a new dataset
    ///
    /// The fingerprint derives from the parent fingerprint and the year, so
    /// two slices of the same parent never share cache entries.
    pub fn for_year(&self, year: i32) -> Dataset {
        let rows: Vec<Transaction> = self
            .rows
            .iter()
            .filter(|t| t.year == year)
            .cloned()
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(self.fingerprint.as_bytes());
        hasher.update(b":year:");
        hasher.update(year.to_string().as_bytes());

        Dataset {
            rows,
            fingerprint: hex::encode(hasher.finalize()),
        }
    }
}

/// SHA-256 over every field of every row, in order
fn fingerprint_rows(rows: &[Transaction]) -> String {
    let mut hasher = Sha256::new();
    for t in rows {
        let post_date = t.post_date.map(|d| d.to_string()).unwrap_or_default();
        let fields = [
            t.txn_date.to_string(),
            post_date,
            t.cust_code.clone(),
            t.amount.to_string(),
            t.loyal_code.clone(),
            t.description.clone(),
            t.jrno.clone(),
            t.operator.clone().unwrap_or_default(),
            t.code_group.as_str().to_string(),
        ];
        for field in &fields {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
    }
    hex::encode(hasher.finalize())
}

/// Parse a ledger date in the configured external format
pub fn parse_ledger_date(s: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), format).ok()
}

/// Coerce a raw amount to non-negative integer points
///
/// Thousands separators and whitespace are ignored. Non-numeric, non-finite
/// and negative values become 0; fractions are truncated. The flag reports
/// whether the input needed coercion.
pub fn coerce_amount(raw: Option<&str>) -> (i64, bool) {
    let Some(raw) = raw else {
        return (0, true);
    };

    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if let Ok(value) = cleaned.parse::<i64>() {
        return if value < 0 { (0, true) } else { (value, false) };
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => (value.trunc() as i64, true),
        _ => (0, true),
    }
}

/// Normalize a description: trim, apply the rewrites, strip periods, lower-case
pub fn normalize_description(raw: &str, config: &IngestConfig) -> String {
    let mut text = raw.trim().to_string();
    for rewrite in &config.description_rewrites {
        text = text.replace(&rewrite.from, &rewrite.to);
    }
    text.replace('.', "").to_lowercase()
}

/// Result of the promotional rewrite on one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Promotion {
    CryptoWeek,
    Lotto,
}

/// Builds the canonical dataset from raw ledger rows
pub struct DatasetBuilder<'a> {
    config: &'a PipelineConfig,
}

impl<'a> DatasetBuilder<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Clean, reclassify and classify every raw row
    pub fn build(&self, raw: Vec<RawTransaction>) -> Result<BuildOutput> {
        let ingest = &self.config.ingest;
        let lotto = RegexBuilder::new(&ingest.lotto_pattern)
            .case_insensitive(true)
            .build()?;
        // Descriptions are lower-cased, so the marker must be too
        let crypto_marker = ingest.crypto_week_marker.to_lowercase();

        let mut report = CleaningReport {
            input_rows: raw.len(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(raw.len());

        for row in raw {
            if let Some(tx) = self.clean_row(row, &crypto_marker, &lotto, &mut report) {
                rows.push(tx);
            }
        }

        report.kept_rows = rows.len();
        log_report(&report);

        Ok(BuildOutput {
            dataset: Dataset::from_rows(rows),
            report,
        })
    }

    fn clean_row(
        &self,
        row: RawTransaction,
        crypto_marker: &str,
        lotto: &Regex,
        report: &mut CleaningReport,
    ) -> Option<Transaction> {
        let ingest = &self.config.ingest;

        if row.txn_desc.as_deref().map(str::trim) == Some(ingest.test_description.as_str()) {
            report.dropped_test_description += 1;
            return None;
        }
        if row.loyal_code.as_deref() == Some(ingest.excluded_code.as_str()) {
            report.dropped_excluded_code += 1;
            return None;
        }

        let mut loyal_code = match row.loyal_code {
            Some(code) => code,
            None => {
                report.filled_missing_code += 1;
                ingest.missing_code.clone()
            }
        };

        let Some(txn_date) = row
            .txn_date
            .as_deref()
            .and_then(|s| parse_ledger_date(s, &ingest.date_format))
        else {
            report.dropped_bad_date += 1;
            return None;
        };
        // Posting-date failures are tolerated
        let post_date = row
            .post_date
            .as_deref()
            .and_then(|s| parse_ledger_date(s, &ingest.date_format));

        let (amount, coerced) = coerce_amount(row.txn_amount.as_deref());
        if coerced {
            report.coerced_amounts += 1;
        }

        let description = normalize_description(row.txn_desc.as_deref().unwrap_or(""), ingest);

        // Crypto week is checked first and shadows the lotto keywords
        let promotion = if description.contains(crypto_marker) {
            Some(Promotion::CryptoWeek)
        } else if lotto.is_match(&description) {
            Some(Promotion::Lotto)
        } else {
            None
        };
        match promotion {
            Some(Promotion::CryptoWeek) => {
                loyal_code = ingest.crypto_week_code.clone();
                report.reclassified_crypto_week += 1;
            }
            Some(Promotion::Lotto) => {
                loyal_code = ingest.lotto_code.clone();
                report.reclassified_lotto += 1;
            }
            None => {}
        }

        let code_group = classify_code(Some(&loyal_code));

        Some(Transaction {
            txn_date,
            post_date,
            cust_code: row.cust_code,
            amount,
            loyal_code,
            description,
            jrno: row.jrno,
            operator: row.operator,
            year: txn_date.year(),
            month_num: txn_date.month(),
            month_name: txn_date.format("%b").to_string().to_uppercase(),
            year_month: txn_date.format("%Y-%m").to_string(),
            code_group,
        })
    }
}

fn log_report(report: &CleaningReport) {
    info!(
        "Built canonical dataset: kept {} of {} rows",
        report.kept_rows, report.input_rows
    );
    let drops = [
        ("test description", report.dropped_test_description),
        ("excluded code", report.dropped_excluded_code),
        ("unparseable date", report.dropped_bad_date),
    ];
    for (reason, count) in drops {
        if count > 0 {
            info!("Dropped {} rows: {}", count, reason);
        }
    }
    debug!(
        "Filled {} missing codes, coerced {} amounts, rewrote {} crypto week and {} lotto rows",
        report.filled_missing_code,
        report.coerced_amounts,
        report.reclassified_crypto_week,
        report.reclassified_lotto
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CodeGroup;
    use crate::test_utils::raw;

    fn build(rows: Vec<RawTransaction>) -> BuildOutput {
        let config = PipelineConfig::default();
        DatasetBuilder::new(&config).build(rows).unwrap()
    }

    #[test]
    fn test_coerce_amount() {
        assert_eq!(coerce_amount(Some("500")), (500, false));
        assert_eq!(coerce_amount(Some(" 1,250 ")), (1250, false));
        assert_eq!(coerce_amount(Some("12.9")), (12, true));
        assert_eq!(coerce_amount(Some("abc")), (0, true));
        assert_eq!(coerce_amount(Some("-40")), (0, true));
        assert_eq!(coerce_amount(Some("NaN")), (0, true));
        assert_eq!(coerce_amount(Some("inf")), (0, true));
        assert_eq!(coerce_amount(None), (0, true));
    }

    #[test]
    fn test_normalize_description() {
        let config = IngestConfig::default();
        assert_eq!(
            normalize_description("  Крипто Вик урамшуулал. ", &config),
            "crypto week урамшуулал"
        );
        assert_eq!(normalize_description("Кривто Вик", &config), "crypto week");
        assert_eq!(normalize_description("A.B.C", &config), "abc");
    }

    #[test]
    fn test_derived_calendar_fields() {
        let out = build(vec![raw("15-APR-25", "C1", "500", Some("10K_TRANSACTION"), None)]);
        let tx = &out.dataset.rows()[0];

        assert_eq!(tx.txn_date, NaiveDate::from_ymd_opt(2025, 4, 15).unwrap());
        assert_eq!(tx.year, 2025);
        assert_eq!(tx.month_num, 4);
        assert_eq!(tx.month_name, "APR");
        assert_eq!(tx.year_month, "2025-04");
        assert_eq!(tx.code_group, CodeGroup::CoreTransactions);
    }

    #[test]
    fn test_sentinel_rows_dropped_and_counted() {
        let out = build(vec![
            raw("01-MAY-25", "C1", "10", Some("10K_TRANSACTION"), Some(" Тест ")),
            raw("01-MAY-25", "C1", "10", Some("LUNAR_RDXQR"), None),
            raw("2025/05/01", "C1", "10", Some("10K_TRANSACTION"), None),
            raw("01-MAY-25", "C1", "10", None, None),
        ]);

        assert_eq!(out.report.input_rows, 4);
        assert_eq!(out.report.kept_rows, 1);
        assert_eq!(out.report.dropped_test_description, 1);
        assert_eq!(out.report.dropped_excluded_code, 1);
        assert_eq!(out.report.dropped_bad_date, 1);
        assert_eq!(out.report.dropped_rows(), 3);
        assert_eq!(out.report.filled_missing_code, 1);

        let kept = &out.dataset.rows()[0];
        assert_eq!(kept.loyal_code, "None");
        assert_eq!(kept.code_group, CodeGroup::Other);
    }

    #[test]
    fn test_bad_post_date_is_tolerated() {
        let mut row = raw("01-MAY-25", "C1", "10", Some("ACO"), None);
        row.post_date = Some("garbage".into());
        let out = build(vec![row]);

        assert_eq!(out.report.kept_rows, 1);
        assert_eq!(out.dataset.rows()[0].post_date, None);
    }

    #[test]
    fn test_lotto_keyword_rewrites_code() {
        let out = build(vec![
            raw("01-MAY-25", "C1", "10", Some("ACO"), Some("ЛОТТО хожил")),
            raw("01-MAY-25", "C1", "10", Some("ACO"), Some("Game 6/42 ticket")),
        ]);

        for tx in out.dataset.rows() {
            assert_eq!(tx.loyal_code, "10K_GET_LOTTO");
            assert_eq!(tx.code_group, CodeGroup::MerchantLifestyle);
        }
        assert_eq!(out.report.reclassified_lotto, 2);
    }

    #[test]
    fn test_crypto_week_beats_lotto_keyword() {
        let out = build(vec![raw(
            "01-MAY-25",
            "C1",
            "10",
            Some("10K_TRANSACTION"),
            Some("Крипто Вик lotto"),
        )]);

        assert_eq!(out.dataset.rows()[0].loyal_code, "ARD_LOTTO");
        assert_eq!(out.report.reclassified_crypto_week, 1);
        assert_eq!(out.report.reclassified_lotto, 0);
    }

    #[test]
    fn test_crypto_week_marker_matches_any_case() {
        let mut config = PipelineConfig::default();
        config.ingest.crypto_week_marker = "Crypto Week".to_string();

        let out = DatasetBuilder::new(&config)
            .build(vec![raw(
                "01-MAY-25",
                "C1",
                "10",
                Some("ACO"),
                Some("CRYPTO WEEK bonus"),
            )])
            .unwrap();

        assert_eq!(out.dataset.rows()[0].loyal_code, "ARD_LOTTO");
        assert_eq!(out.report.reclassified_crypto_week, 1);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = build(vec![raw("01-MAY-25", "C1", "10", Some("ACO"), None)]).dataset;
        let b = build(vec![raw("01-MAY-25", "C1", "10", Some("ACO"), None)]).dataset;
        let c = build(vec![raw("01-MAY-25", "C1", "11", Some("ACO"), None)]).dataset;

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_for_year_slices_and_refingerprints() {
        let dataset = build(vec![
            raw("01-DEC-24", "C1", "10", Some("ACO"), None),
            raw("01-JAN-25", "C1", "10", Some("ACO"), None),
            raw("02-JAN-25", "C2", "10", Some("ACO"), None),
        ])
        .dataset;

        assert_eq!(dataset.years(), vec![2024, 2025]);

        let y2025 = dataset.for_year(2025);
        assert_eq!(y2025.len(), 2);
        assert_ne!(y2025.fingerprint(), dataset.fingerprint());
        assert_ne!(y2025.fingerprint(), dataset.for_year(2024).fingerprint());
        assert_eq!(y2025.fingerprint(), dataset.for_year(2025).fingerprint());
    }

    #[test]
    fn test_invalid_lotto_pattern_is_an_error() {
        let mut config = PipelineConfig::default();
        config.ingest.lotto_pattern = "(unclosed".into();
        let result = DatasetBuilder::new(&config).build(vec![]);
        assert!(matches!(result, Err(crate::error::Error::Regex(_))));
    }
}
