//! erh Core Library
//!
//! Loyalty-points analytics pipeline:
//! - Code classifier mapping loyalty codes to business categories
//! - Dataset builder (cleaning, promotional reclassification, classification)
//! - Aggregation engine for monthly, per-code and per-category tables
//! - Segmentation engine (quartile thresholds and the segment cascade)
//! - Memo cache, on-demand query façade and batch precompute with a table store

pub mod aggregate;
pub mod analytics;
pub mod cache;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod error;
pub mod import;
pub mod models;
pub mod precompute;
pub mod segment;
pub mod store;

/// Test utilities for building ledgers and datasets
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analytics::Analytics;
pub use cache::{CacheKey, CacheStats, MemoCache};
pub use classify::{classify_code, explain_code, CodeRule, CODE_RULES};
pub use config::{PipelineConfig, ReportConfig, ThresholdConfig};
pub use dataset::{BuildOutput, CleaningReport, Dataset, DatasetBuilder};
pub use error::{Error, Result};
pub use models::*;
pub use precompute::{precompute, PrecomputedTables, TableName};
pub use segment::{assign_segment, compute_thresholds, percentile, SegmentRule, SEGMENT_RULES};
pub use store::{Manifest, TableStore};
