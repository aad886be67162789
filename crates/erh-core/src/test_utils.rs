//! Test utilities for building raw ledgers and canonical datasets
//!
//! Available to unit tests and, through the `test-utils` feature, to other
//! crates' tests.

use crate::config::PipelineConfig;
use crate::dataset::{Dataset, DatasetBuilder};
use crate::models::RawTransaction;

/// A raw ledger row with the fields most tests care about
pub fn raw(
    date: &str,
    cust: &str,
    amount: &str,
    code: Option<&str>,
    desc: Option<&str>,
) -> RawTransaction {
    RawTransaction {
        txn_date: Some(date.to_string()),
        post_date: None,
        cust_code: cust.to_string(),
        txn_amount: Some(amount.to_string()),
        loyal_code: code.map(str::to_string),
        txn_desc: desc.map(str::to_string),
        jrno: format!("{}-{}-{}", cust, date, amount),
        operator: None,
    }
}

/// Build a canonical dataset with the default configuration
pub fn dataset(rows: Vec<RawTransaction>) -> Dataset {
    let config = PipelineConfig::default();
    DatasetBuilder::new(&config)
        .build(rows)
        .expect("default configuration builds")
        .dataset
}

/// `count` rows of `amount` points for one customer and code, on consecutive days
pub fn repeated(
    cust: &str,
    code: &str,
    month: &str,
    year: &str,
    amount: i64,
    count: u32,
) -> Vec<RawTransaction> {
    (1..=count)
        .map(|day| {
            raw(
                &format!("{:02}-{}-{}", day, month, year),
                cust,
                &amount.to_string(),
                Some(code),
                None,
            )
        })
        .collect()
}

/// Ledger CSV text with the standard header
pub fn ledger_csv(rows: &[(&str, &str, &str, &str, &str)]) -> String {
    let mut csv = String::from("TXN_DATE,POST_DATE,CUST_CODE,TXN_AMOUNT,LOYAL_CODE,TXN_DESC,JRNO,OPERATOR\n");
    for (i, (date, cust, amount, code, desc)) in rows.iter().enumerate() {
        csv.push_str(&format!(
            "{},,{},{},{},{},J{},\n",
            date, cust, amount, code, desc, i
        ));
    }
    csv
}

/// Lookup CSV text for the codes used across tests
pub fn lookup_csv() -> &'static str {
    "LOYAL_CODE,TXN_DESC
10K_TRANSACTION,TRANSACTION REWARD
ARD_SEC,SECURITIES ACCOUNT OPENING
10K_GET_LOTTO,lottery purchase
10K_PURCH_INSUR,insurance purchase
"
}
