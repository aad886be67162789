//! Pipeline configuration
//!
//! Cleaning sentinels, reward thresholds and report parameters.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override (explicit path, or ~/.local/share/erh/config/pipeline.toml)
//! 2. Fall back to embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/pipeline.toml");

/// Literal text replacement applied to raw descriptions
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DescriptionRewrite {
    pub from: String,
    pub to: String,
}

/// Settings for the Dataset Builder
#[derive(Debug, Clone, PartialEq)]
pub struct IngestConfig {
    pub date_format: String,
    pub test_description: String,
    pub excluded_code: String,
    pub missing_code: String,
    pub crypto_week_marker: String,
    pub crypto_week_code: String,
    pub lotto_pattern: String,
    pub lotto_code: String,
    pub description_rewrites: Vec<DescriptionRewrite>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            date_format: "%d-%b-%y".to_string(),
            test_description: "Тест".to_string(),
            excluded_code: "LUNAR_RDXQR".to_string(),
            missing_code: "None".to_string(),
            crypto_week_marker: "crypto week".to_string(),
            crypto_week_code: "ARD_LOTTO".to_string(),
            lotto_pattern: "lotto|6/42|лотто".to_string(),
            lotto_code: "10K_GET_LOTTO".to_string(),
            description_rewrites: vec![
                DescriptionRewrite {
                    from: "Крипто Вик".to_string(),
                    to: "Crypto Week".to_string(),
                },
                DescriptionRewrite {
                    from: "Кривто Вик".to_string(),
                    to: "Crypto Week".to_string(),
                },
            ],
        }
    }
}

/// Reward threshold and percentile policy
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    /// Monthly points needed to reach the reward
    pub reach_points: i64,
    /// User-months with at most this many transactions are inactive
    pub inactive_max_transactions: u64,
    /// Percentile value used when a sub-population is empty
    pub empty_percentile_fallback: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            reach_points: 1000,
            inactive_max_transactions: 1,
            empty_percentile_fallback: 0.0,
        }
    }
}

/// Parameters of the derived report tables
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub point_cutoffs: Vec<i64>,
    pub growth_min_active_months: usize,
    pub growth_min_pct: f64,
    pub growth_min_last: i64,
    pub growth_top_n: usize,
    pub profile_excluded_code: Option<String>,
    pub pad_epsilon: f64,
    pub discount_points: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            point_cutoffs: vec![400, 500, 600, 700, 800, 900],
            growth_min_active_months: 6,
            growth_min_pct: 20.0,
            growth_min_last: 100_000,
            growth_top_n: 4,
            profile_excluded_code: Some("10K_PURCH_INSUR".to_string()),
            pad_epsilon: 1e-6,
            discount_points: 500,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub ingest: IngestConfig,
    pub thresholds: ThresholdConfig,
    pub reports: ReportConfig,
}

impl PipelineConfig {
    /// Load configuration using the default resolution order
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load configuration from an explicit override path
    ///
    /// A path that does not exist falls back to the embedded defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// The embedded default configuration text
    pub fn default_toml() -> &'static str {
        DEFAULT_CONFIG
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("erh").join("config").join("pipeline.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<PipelineConfig> {
    let candidate = match override_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };

    let content = match candidate {
        Some(path) if path.exists() => fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    ingest: Option<RawIngest>,
    thresholds: Option<RawThresholds>,
    reports: Option<RawReports>,
}

#[derive(Debug, Deserialize)]
struct RawIngest {
    date_format: Option<String>,
    test_description: Option<String>,
    excluded_code: Option<String>,
    missing_code: Option<String>,
    crypto_week_marker: Option<String>,
    crypto_week_code: Option<String>,
    lotto_pattern: Option<String>,
    lotto_code: Option<String>,
    description_rewrites: Option<Vec<DescriptionRewrite>>,
}

#[derive(Debug, Deserialize)]
struct RawThresholds {
    reach_points: Option<i64>,
    inactive_max_transactions: Option<u64>,
    empty_percentile_fallback: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawReports {
    point_cutoffs: Option<Vec<i64>>,
    growth_min_active_months: Option<usize>,
    growth_min_pct: Option<f64>,
    growth_min_last: Option<i64>,
    growth_top_n: Option<usize>,
    profile_excluded_code: Option<String>,
    pad_epsilon: Option<f64>,
    discount_points: Option<i64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<PipelineConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = PipelineConfig::default();

    if let Some(ingest) = raw.ingest {
        let target = &mut config.ingest;
        if let Some(v) = ingest.date_format {
            target.date_format = v;
        }
        if let Some(v) = ingest.test_description {
            target.test_description = v;
        }
        if let Some(v) = ingest.excluded_code {
            target.excluded_code = v;
        }
        if let Some(v) = ingest.missing_code {
            target.missing_code = v;
        }
        if let Some(v) = ingest.crypto_week_marker {
            target.crypto_week_marker = v.to_lowercase();
        }
        if let Some(v) = ingest.crypto_week_code {
            target.crypto_week_code = v;
        }
        if let Some(v) = ingest.lotto_pattern {
            target.lotto_pattern = v;
        }
        if let Some(v) = ingest.lotto_code {
            target.lotto_code = v;
        }
        if let Some(v) = ingest.description_rewrites {
            target.description_rewrites = v;
        }
    }

    if let Some(thresholds) = raw.thresholds {
        let target = &mut config.thresholds;
        if let Some(v) = thresholds.reach_points {
            target.reach_points = v;
        }
        if let Some(v) = thresholds.inactive_max_transactions {
            target.inactive_max_transactions = v;
        }
        if let Some(v) = thresholds.empty_percentile_fallback {
            target.empty_percentile_fallback = v;
        }
    }

    if let Some(reports) = raw.reports {
        let target = &mut config.reports;
        if let Some(v) = reports.point_cutoffs {
            target.point_cutoffs = v;
        }
        if let Some(v) = reports.growth_min_active_months {
            target.growth_min_active_months = v;
        }
        if let Some(v) = reports.growth_min_pct {
            target.growth_min_pct = v;
        }
        if let Some(v) = reports.growth_min_last {
            target.growth_min_last = v;
        }
        if let Some(v) = reports.growth_top_n {
            target.growth_top_n = v;
        }
        if let Some(v) = reports.profile_excluded_code {
            // An empty string disables the exclusion
            target.profile_excluded_code = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = reports.pad_epsilon {
            target.pad_epsilon = v;
        }
        if let Some(v) = reports.discount_points {
            target.discount_points = v;
        }
    }

    if config.thresholds.reach_points <= 0 {
        return Err(Error::Config("thresholds.reach_points must be positive".into()));
    }

    Ok(config)
}
