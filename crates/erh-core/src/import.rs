//! CSV readers for the raw loyalty ledger and the code lookup table
//!
//! Readers only map columns to fields. Cleaning (date parsing, amount
//! coercion, reclassification) belongs to the dataset builder.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Lookup, RawTransaction};

const REQUIRED_LEDGER_COLUMNS: &[&str] = &["TXN_DATE", "CUST_CODE", "TXN_AMOUNT", "JRNO"];
const REQUIRED_LOOKUP_COLUMNS: &[&str] = &["LOYAL_CODE", "TXN_DESC"];

/// Header name → column index, with names trimmed
fn header_index(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect()
}

/// Fail fast when a required column is absent
fn require_columns(
    index: &HashMap<String, usize>,
    required: &[&str],
    table: &str,
) -> Result<()> {
    for column in required {
        if !index.contains_key(*column) {
            return Err(Error::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

/// Value of a column, with empty cells treated as missing
fn optional_field(record: &StringRecord, col: Option<usize>) -> Option<String> {
    col.and_then(|i| record.get(i))
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}

/// Parse a raw ledger CSV
///
/// Required columns: TXN_DATE, CUST_CODE, TXN_AMOUNT, JRNO.
/// Optional columns: POST_DATE, LOYAL_CODE, TXN_DESC, OPERATOR.
pub fn parse_ledger<R: Read>(reader: R) -> Result<Vec<RawTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let index = header_index(rdr.headers()?);
    require_columns(&index, REQUIRED_LEDGER_COLUMNS, "ledger")?;

    let col = |name: &str| index.get(name).copied();
    let (txn_date, post_date, cust_code, txn_amount) = (
        col("TXN_DATE"),
        col("POST_DATE"),
        col("CUST_CODE"),
        col("TXN_AMOUNT"),
    );
    let (loyal_code, txn_desc, jrno, operator) = (
        col("LOYAL_CODE"),
        col("TXN_DESC"),
        col("JRNO"),
        col("OPERATOR"),
    );

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;

        rows.push(RawTransaction {
            txn_date: optional_field(&record, txn_date),
            post_date: optional_field(&record, post_date),
            cust_code: optional_field(&record, cust_code)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            txn_amount: optional_field(&record, txn_amount),
            loyal_code: optional_field(&record, loyal_code),
            // Descriptions keep their whitespace; the builder trims them
            txn_desc: txn_desc
                .and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            jrno: optional_field(&record, jrno).unwrap_or_default(),
            operator: optional_field(&record, operator),
        });
    }

    debug!("Parsed {} ledger rows", rows.len());
    Ok(rows)
}

/// Parse a ledger CSV file
pub fn read_ledger(path: &Path) -> Result<Vec<RawTransaction>> {
    let file = File::open(path)?;
    parse_ledger(file)
}

/// Parse a lookup CSV with LOYAL_CODE and TXN_DESC columns
///
/// Descriptions are capitalized; the first row for a code wins.
pub fn parse_lookup<R: Read>(reader: R) -> Result<Lookup> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let index = header_index(rdr.headers()?);
    require_columns(&index, REQUIRED_LOOKUP_COLUMNS, "lookup")?;
    let code_col = index["LOYAL_CODE"];
    let desc_col = index["TXN_DESC"];

    let mut lookup = Lookup::new();
    for result in rdr.records() {
        let record = result?;
        let Some(code) = record.get(code_col).filter(|s| !s.is_empty()) else {
            continue;
        };
        lookup.insert(code, record.get(desc_col).unwrap_or(""));
    }

    debug!("Loaded {} lookup descriptions", lookup.len());
    Ok(lookup)
}

/// Parse a lookup CSV file
pub fn read_lookup(path: &Path) -> Result<Lookup> {
    let file = File::open(path)?;
    parse_lookup(file)
}
