//! Report command implementations
//!
//! A report reads its tables through a [`ReportSource`]: either computed on
//! demand from a ledger through the cached analytics façade, or read back
//! from a directory written by `erh precompute`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use erh_core::{
    aggregate, compute_thresholds, Analytics, AverageProfileEntry, BucketCount, CodeGroup,
    Dataset, GroupedReward, GrowthMover, Lookup, MemoCache, MonthlyRewardStat, PipelineConfig,
    PrecomputedTables, ReachFrequency, Segment, SegmentCodeSummary, SegmentedUserMonth,
    TableStore, ThresholdScenario, ThresholdSet,
};

use super::{load_config, load_inputs, truncate};

/// Report kinds available on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    Summary,
    Segments,
    Movers,
    Buckets,
    Reach,
    Profile,
    Scenario,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Segments => "segments",
            Self::Movers => "movers",
            Self::Buckets => "buckets",
            Self::Reach => "reach",
            Self::Profile => "profile",
            Self::Scenario => "scenario",
        }
    }

    pub fn all() -> &'static [ReportKind] {
        &[
            Self::Summary,
            Self::Segments,
            Self::Movers,
            Self::Buckets,
            Self::Reach,
            Self::Profile,
            Self::Scenario,
        ]
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a report reads its data from
#[derive(Debug, Clone, PartialEq)]
pub enum ReportInput {
    /// Raw ledger plus code lookup, computed on demand
    Ledger { ledger: PathBuf, lookup: PathBuf },
    /// Directory written by `erh precompute`
    Store(PathBuf),
}

impl ReportInput {
    /// Resolve the report source flags; `--dir` wins over a ledger pair
    pub fn from_args(
        ledger: Option<PathBuf>,
        lookup: Option<PathBuf>,
        dir: Option<PathBuf>,
    ) -> Result<Self> {
        match (ledger, lookup, dir) {
            (_, _, Some(dir)) => Ok(Self::Store(dir)),
            (Some(ledger), Some(lookup), None) => Ok(Self::Ledger { ledger, lookup }),
            _ => anyhow::bail!("Pass --ledger with --lookup, or --dir"),
        }
    }
}

/// Year-scoped tables a report is rendered from
pub trait ReportSource {
    fn config(&self) -> &PipelineConfig;

    /// Lookup description of a loyalty code
    fn describe(&self, code: &str) -> String;

    fn reward_stats(&self, year: i32) -> Result<Vec<MonthlyRewardStat>>;
    fn grouped_reward(&self, year: i32) -> Result<Vec<GroupedReward>>;
    fn thresholds(&self, year: i32) -> Result<ThresholdSet>;
    fn segmented(&self, year: i32) -> Result<Vec<SegmentedUserMonth>>;
    fn segment_code_summary(&self, year: i32) -> Result<Vec<SegmentCodeSummary>>;
    fn growth_movers(&self, year: i32) -> Result<Vec<GrowthMover>>;
    fn bucket_counts(&self, year: i32) -> Result<Vec<BucketCount>>;
    fn reach_frequency(&self, year: i32) -> Result<Vec<ReachFrequency>>;
    fn average_profile(&self, year: i32) -> Result<Vec<AverageProfileEntry>>;
    fn threshold_scenario(&self, year: i32) -> Result<ThresholdScenario>;
}

/// Tables computed from a ledger through the analytics cache
///
/// Year-local tables are computed on the cached one-year slice. Reward
/// stats use the full ledger since a user is new only against all history.
pub struct LedgerSource<'a> {
    analytics: Analytics<'a>,
    data: &'a Dataset,
}

impl<'a> LedgerSource<'a> {
    pub fn new(analytics: Analytics<'a>, data: &'a Dataset) -> Self {
        Self { analytics, data }
    }

    fn slice(&self, year: i32) -> Result<Arc<Dataset>> {
        Ok(self.analytics.year_dataset(self.data, year)?)
    }
}

impl ReportSource for LedgerSource<'_> {
    fn config(&self) -> &PipelineConfig {
        self.analytics.config()
    }

    fn describe(&self, code: &str) -> String {
        self.analytics.lookup().describe(code)
    }

    fn reward_stats(&self, year: i32) -> Result<Vec<MonthlyRewardStat>> {
        let stats = self.analytics.monthly_reward_stats(self.data)?;
        Ok(stats
            .iter()
            .filter(|r| in_year(&r.year_month, year))
            .cloned()
            .collect())
    }

    fn grouped_reward(&self, year: i32) -> Result<Vec<GroupedReward>> {
        let slice = self.slice(year)?;
        Ok(self.analytics.grouped_reward(&slice)?.to_vec())
    }

    fn thresholds(&self, year: i32) -> Result<ThresholdSet> {
        let slice = self.slice(year)?;
        Ok(self.analytics.thresholds(&slice, year)?.as_ref().clone())
    }

    fn segmented(&self, year: i32) -> Result<Vec<SegmentedUserMonth>> {
        let slice = self.slice(year)?;
        Ok(self.analytics.segmented_user_months(&slice, year)?.to_vec())
    }

    fn segment_code_summary(&self, year: i32) -> Result<Vec<SegmentCodeSummary>> {
        let slice = self.slice(year)?;
        Ok(self.analytics.segment_code_summary(&slice)?.to_vec())
    }

    fn growth_movers(&self, year: i32) -> Result<Vec<GrowthMover>> {
        let slice = self.slice(year)?;
        Ok(self.analytics.growth_movers(&slice, year)?.to_vec())
    }

    fn bucket_counts(&self, year: i32) -> Result<Vec<BucketCount>> {
        let slice = self.slice(year)?;
        Ok(self.analytics.monthly_bucket_counts(&slice)?.to_vec())
    }

    fn reach_frequency(&self, year: i32) -> Result<Vec<ReachFrequency>> {
        let slice = self.slice(year)?;
        Ok(self.analytics.reach_frequency(&slice)?.to_vec())
    }

    fn average_profile(&self, year: i32) -> Result<Vec<AverageProfileEntry>> {
        let slice = self.slice(year)?;
        Ok(self.analytics.average_achiever_profile(&slice, year)?.to_vec())
    }

    fn threshold_scenario(&self, year: i32) -> Result<ThresholdScenario> {
        let slice = self.slice(year)?;
        Ok(self.analytics.threshold_scenario(&slice, year)?.as_ref().clone())
    }
}

/// Tables read back from a precompute directory
///
/// Year-parameterized views the store does not hold are derived from the
/// stored base tables with the current configuration.
pub struct StoredSource {
    config: PipelineConfig,
    tables: PrecomputedTables,
    lookup: Lookup,
}

impl StoredSource {
    pub fn new(config: PipelineConfig, tables: PrecomputedTables) -> Self {
        let lookup = Lookup::from_entries(&tables.code_lookup);
        Self {
            config,
            tables,
            lookup,
        }
    }
}

impl ReportSource for StoredSource {
    fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn describe(&self, code: &str) -> String {
        self.lookup.describe(code)
    }

    fn reward_stats(&self, year: i32) -> Result<Vec<MonthlyRewardStat>> {
        Ok(self
            .tables
            .monthly_reward_stats
            .iter()
            .filter(|r| in_year(&r.year_month, year))
            .cloned()
            .collect())
    }

    fn grouped_reward(&self, year: i32) -> Result<Vec<GroupedReward>> {
        Ok(self
            .tables
            .grouped_reward
            .iter()
            .filter(|r| in_year(&r.year_month, year))
            .cloned()
            .collect())
    }

    fn thresholds(&self, year: i32) -> Result<ThresholdSet> {
        let stored = self.tables.thresholds.iter().find(|t| t.year == year);
        Ok(match stored {
            Some(thresholds) => thresholds.clone(),
            None => compute_thresholds(
                year,
                &self.tables.user_months,
                self.config.thresholds.empty_percentile_fallback,
            ),
        })
    }

    fn segmented(&self, year: i32) -> Result<Vec<SegmentedUserMonth>> {
        Ok(self
            .tables
            .segmented_user_months
            .iter()
            .filter(|um| um.year == year)
            .cloned()
            .collect())
    }

    fn segment_code_summary(&self, year: i32) -> Result<Vec<SegmentCodeSummary>> {
        Ok(self
            .tables
            .segment_code_summary
            .iter()
            .filter(|row| row.year == year)
            .cloned()
            .collect())
    }

    fn growth_movers(&self, year: i32) -> Result<Vec<GrowthMover>> {
        Ok(aggregate::growth_movers(
            &self.tables.movers_monthly,
            year,
            &self.config.reports,
        ))
    }

    fn bucket_counts(&self, year: i32) -> Result<Vec<BucketCount>> {
        Ok(self
            .tables
            .monthly_bucket_counts
            .iter()
            .filter(|b| b.year == year)
            .cloned()
            .collect())
    }

    fn reach_frequency(&self, year: i32) -> Result<Vec<ReachFrequency>> {
        Ok(self
            .tables
            .reach_frequency
            .iter()
            .filter(|r| r.year == year)
            .cloned()
            .collect())
    }

    fn average_profile(&self, year: i32) -> Result<Vec<AverageProfileEntry>> {
        Ok(aggregate::average_achiever_profile(
            &self.tables.achiever_profile,
            year,
            &self.lookup,
        ))
    }

    fn threshold_scenario(&self, year: i32) -> Result<ThresholdScenario> {
        Ok(aggregate::threshold_scenario(
            &self.tables.user_months,
            year,
            self.config.thresholds.reach_points,
            self.config.reports.discount_points,
        ))
    }
}

pub fn cmd_report(
    config_path: Option<&Path>,
    kind: ReportKind,
    input: &ReportInput,
    year: Option<i32>,
) -> Result<()> {
    let config = load_config(config_path)?;

    match input {
        ReportInput::Ledger { ledger, lookup } => {
            let (data, lookup, _) = load_inputs(&config, ledger, lookup)?;
            let Some(year) = year.or_else(|| data.years().last().copied()) else {
                println!();
                println!("   No transactions in {}.", ledger.display());
                return Ok(());
            };

            let cache = MemoCache::new();
            let source = LedgerSource::new(Analytics::new(&config, &lookup, &cache), &data);
            render_report(&source, kind, year)
        }
        ReportInput::Store(dir) => {
            if !dir.is_dir() {
                anyhow::bail!("Table directory not found: {}", dir.display());
            }
            let store = TableStore::new(dir)?;
            let data = store
                .load_dataset()
                .with_context(|| format!("No precomputed tables in {}", dir.display()))?;
            let tables = store
                .load(Some(data.fingerprint()))
                .with_context(|| format!("Failed to load tables from {}", dir.display()))?;
            let Some(year) = year.or_else(|| data.years().last().copied()) else {
                println!();
                println!("   No transactions in {}.", dir.display());
                return Ok(());
            };

            let source = StoredSource::new(config, tables);
            render_report(&source, kind, year)
        }
    }
}

fn render_report(source: &dyn ReportSource, kind: ReportKind, year: i32) -> Result<()> {
    let result = match kind {
        ReportKind::Summary => report_summary(source, year),
        ReportKind::Segments => report_segments(source, year),
        ReportKind::Movers => report_movers(source, year),
        ReportKind::Buckets => report_buckets(source, year),
        ReportKind::Reach => report_reach(source, year),
        ReportKind::Profile => report_profile(source, year),
        ReportKind::Scenario => report_scenario(source, year),
    };
    result.with_context(|| format!("Failed to compute {} report", kind))
}

fn in_year(year_month: &str, year: i32) -> bool {
    year_month.starts_with(&format!("{}-", year))
}

fn report_summary(source: &dyn ReportSource, year: i32) -> Result<()> {
    let stats = source.reward_stats(year)?;
    let grouped = source.grouped_reward(year)?;
    let reach = source.config().thresholds.reach_points;

    println!();
    println!("📊 Monthly Rewards ({})", year);
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:8} │ {:>12} │ {:>6} │ {:>7} │ {:>7} │ {:>4}",
        "Month",
        "Points",
        "Users",
        format!("≥{}", reach),
        "%",
        "New"
    );
    println!("   ─────────┼──────────────┼────────┼─────────┼─────────┼──────");

    for row in &stats {
        println!(
            "   {:8} │ {:>12} │ {:>6} │ {:>7} │ {:>6.2}% │ {:>4}",
            row.year_month,
            row.total_points,
            row.total_users,
            row.num_user_passed_1000,
            row.percentage,
            row.total_new_users
        );
    }
    if stats.is_empty() {
        println!("   No activity in {}.", year);
        return Ok(());
    }

    let mut by_group: BTreeMap<CodeGroup, i64> = BTreeMap::new();
    for row in &grouped {
        *by_group.entry(row.code_group).or_default() += row.total_amount;
    }
    let total: i64 = by_group.values().sum();

    println!();
    println!("🏷️  Points by Category");
    for (group, amount) in &by_group {
        let share = if total > 0 {
            *amount as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        println!("   {:26} │ {:>12} │ {:>5.1}%", group.as_str(), amount, share);
    }

    Ok(())
}

fn report_segments(source: &dyn ReportSource, year: i32) -> Result<()> {
    let thresholds = source.thresholds(year)?;
    let segmented = source.segmented(year)?;
    let summary = source.segment_code_summary(year)?;

    println!();
    println!("👥 Segments ({})", year);
    println!(
        "   Thresholds: txn q75 {:.2}, days q75 {:.2}, achiever txn q25 {:.2}",
        thresholds.txn_q75, thresholds.days_q75, thresholds.achievers_txn_q25
    );
    if thresholds.fallback_used {
        println!("   ⚠️  An empty population used the fallback percentile");
    }
    println!("   ─────────────────────────────────────────────────────────────");

    if segmented.is_empty() {
        println!("   No user-months in {}.", year);
        return Ok(());
    }

    let mut counts: BTreeMap<Segment, (u64, i64)> = BTreeMap::new();
    for um in segmented.iter() {
        let entry = counts.entry(um.segment).or_default();
        entry.0 += 1;
        entry.1 += um.total_points;
    }
    let total = segmented.len() as f64;

    println!("   {:22} │ {:>8} │ {:>6} │ {:>12}", "Segment", "Months", "%", "Points");
    println!("   ───────────────────────┼──────────┼────────┼──────────────");
    for (segment, (months, points)) in &counts {
        println!(
            "   {:22} │ {:>8} │ {:>5.1}% │ {:>12}",
            segment.as_str(),
            months,
            *months as f64 / total * 100.0,
            points
        );
    }

    println!();
    println!("🔝 Top Codes per Segment");
    for segment in Segment::all() {
        let top: Vec<_> = summary
            .iter()
            .filter(|row| row.segment == *segment)
            .take(3)
            .collect();
        if top.is_empty() {
            continue;
        }
        println!("   {}", segment);
        for row in top {
            println!(
                "     {:30} │ {:>12}",
                truncate(&row.desc, 30),
                row.txn_amount
            );
        }
    }

    Ok(())
}

fn report_movers(source: &dyn ReportSource, year: i32) -> Result<()> {
    let movers = source.growth_movers(year)?;
    let params = &source.config().reports;

    println!();
    println!("📈 Growth Movers ({})", year);
    println!(
        "   Active > {} months, growth > {}%, last month > {}",
        params.growth_min_active_months, params.growth_min_pct, params.growth_min_last
    );
    println!("   ─────────────────────────────────────────────────────────────");

    if movers.is_empty() {
        println!("   No codes qualify.");
        return Ok(());
    }

    println!(
        "   {:30} │ {:>12} │ {:>12} │ {:>8}",
        "Code", "First", "Last", "Growth"
    );
    println!("   ───────────────────────────────┼──────────────┼──────────────┼─────────");
    for mover in movers.iter() {
        println!(
            "   {:30} │ {:>12} │ {:>12} │ {:>7.1}%",
            truncate(&source.describe(&mover.loyal_code), 30),
            mover.first,
            mover.last,
            mover.pct_increase
        );
    }

    Ok(())
}

fn report_buckets(source: &dyn ReportSource, year: i32) -> Result<()> {
    let rows = source.bucket_counts(year)?;

    println!();
    println!("🪣 Point Buckets ({})", year);
    println!("   ─────────────────────────────────────────────────────────────");

    if rows.is_empty() {
        println!("   No activity in {}.", year);
        return Ok(());
    }

    println!("   {:8} │ {:9} │ {:>7} │ {:>7}", "Month", "Bucket", "Users", "%");
    println!("   ─────────┼───────────┼─────────┼─────────");
    let mut last_month = "";
    for row in &rows {
        let month = if row.year_month == last_month {
            ""
        } else {
            row.year_month.as_str()
        };
        last_month = row.year_month.as_str();
        println!(
            "   {:8} │ {:9} │ {:>7} │ {:>6.2}%",
            month,
            row.point_bucket.as_str(),
            row.counts,
            row.percent
        );
    }

    Ok(())
}

fn report_reach(source: &dyn ReportSource, year: i32) -> Result<()> {
    let rows = source.reach_frequency(year)?;
    let threshold = source.config().thresholds.reach_points;

    println!();
    println!("🎯 Reach Frequency ({}, ≥{} points)", year, threshold);
    println!("   ─────────────────────────────────────────────────────────────");

    if rows.is_empty() {
        println!("   Nobody reached the threshold in {}.", year);
        return Ok(());
    }

    println!("   {:>7} │ {:>7} │ {:>8}", "Months", "Users", "Total");
    println!("   ────────┼─────────┼──────────");
    for row in &rows {
        println!(
            "   {:>7} │ {:>7} │ {:>8}",
            row.times_reached, row.number_of_users, row.total
        );
    }

    Ok(())
}

fn report_profile(source: &dyn ReportSource, year: i32) -> Result<()> {
    let profile = source.average_profile(year)?;

    println!();
    println!("🏆 Average Achiever Profile ({})", year);
    println!("   Points per 1000 earned, by code");
    println!("   ─────────────────────────────────────────────────────────────");

    if profile.is_empty() {
        println!("   No achievers in {}.", year);
        return Ok(());
    }

    for entry in profile.iter() {
        println!(
            "   {:36} │ {:>8.1}",
            truncate(&entry.desc, 36),
            entry.normalized_points
        );
    }

    Ok(())
}

fn report_scenario(source: &dyn ReportSource, year: i32) -> Result<()> {
    let scenario = source.threshold_scenario(year)?;

    println!();
    println!(
        "🔀 Threshold Scenario ({}): {} vs {} points",
        year, scenario.current_threshold, scenario.discounted_threshold
    );
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   User-months:        {:>8}", scenario.total_user_months);
    println!(
        "   Reach {:>6}:       {:>8} ({:.2}%)",
        scenario.current_threshold, scenario.current_success, scenario.current_rate
    );
    println!(
        "   Reach {:>6}:       {:>8} ({:.2}%)",
        scenario.discounted_threshold, scenario.discounted_success, scenario.discounted_rate
    );
    println!("   Lift:               {:>+8.2} pp", scenario.lift);

    if !scenario.newly_qualifying.is_empty() {
        println!();
        println!("   Newly qualifying by bucket:");
        for bucket in &scenario.newly_qualifying {
            println!("     {:9} │ {:>7}", bucket.point_bucket.as_str(), bucket.counts);
        }
    }

    Ok(())
}
