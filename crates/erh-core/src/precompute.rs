//! Batch precompute mode
//!
//! Builds every named derived table through [`Analytics`], so the batch
//! tables are exactly what the on-demand queries return.

use std::sync::Arc;

use tracing::info;

use crate::analytics::Analytics;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::models::*;

/// Names of the persisted tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableName {
    Transactions,
    UserMonthlyPoints,
    MonthlyRewardStats,
    PointCutoffCounts,
    GroupedReward,
    TransactionSummary,
    TransactionSummaryPadded,
    CodeGroupCodes,
    MoversMonthly,
    MonthlyBucketCounts,
    CodeAverageByYear,
    ReachFrequency,
    UserMonths,
    Thresholds,
    SegmentedUserMonths,
    SegmentMonthlyCounts,
    SegmentCodeSummary,
    SegmentPoints,
    AchieverProfile,
    CodeLookup,
}

impl TableName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::UserMonthlyPoints => "user_monthly_points",
            Self::MonthlyRewardStats => "monthly_reward_stats",
            Self::PointCutoffCounts => "point_cutoff_counts",
            Self::GroupedReward => "grouped_reward",
            Self::TransactionSummary => "transaction_summary",
            Self::TransactionSummaryPadded => "transaction_summary_padded",
            Self::CodeGroupCodes => "code_group_codes",
            Self::MoversMonthly => "movers_monthly",
            Self::MonthlyBucketCounts => "monthly_bucket_counts",
            Self::CodeAverageByYear => "code_average_by_year",
            Self::ReachFrequency => "reach_frequency",
            Self::UserMonths => "user_months",
            Self::Thresholds => "thresholds",
            Self::SegmentedUserMonths => "segmented_user_months",
            Self::SegmentMonthlyCounts => "segment_monthly_counts",
            Self::SegmentCodeSummary => "segment_code_summary",
            Self::SegmentPoints => "segment_points",
            Self::AchieverProfile => "achiever_profile",
            Self::CodeLookup => "code_lookup",
        }
    }

    pub fn all() -> &'static [TableName] {
        &[
            Self::Transactions,
            Self::UserMonthlyPoints,
            Self::MonthlyRewardStats,
            Self::PointCutoffCounts,
            Self::GroupedReward,
            Self::TransactionSummary,
            Self::TransactionSummaryPadded,
            Self::CodeGroupCodes,
            Self::MoversMonthly,
            Self::MonthlyBucketCounts,
            Self::CodeAverageByYear,
            Self::ReachFrequency,
            Self::UserMonths,
            Self::Thresholds,
            Self::SegmentedUserMonths,
            Self::SegmentMonthlyCounts,
            Self::SegmentCodeSummary,
            Self::SegmentPoints,
            Self::AchieverProfile,
            Self::CodeLookup,
        ]
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.as_str())
    }
}

impl std::str::FromStr for TableName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|t| t.as_str() == s.trim())
            .copied()
            .ok_or_else(|| format!("Unknown table: {}", s))
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Every derived table, across all years of the dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecomputedTables {
    pub user_monthly_points: Vec<UserMonthlyPoints>,
    pub monthly_reward_stats: Vec<MonthlyRewardStat>,
    pub point_cutoff_counts: Vec<CutoffCount>,
    pub grouped_reward: Vec<GroupedReward>,
    pub transaction_summary: Vec<TransactionSummary>,
    pub transaction_summary_padded: Vec<PaddedTransactionSummary>,
    pub code_group_codes: Vec<CodeGroupCode>,
    pub movers_monthly: Vec<MoverMonthly>,
    pub monthly_bucket_counts: Vec<BucketCount>,
    pub code_average_by_year: Vec<CodeAverage>,
    pub reach_frequency: Vec<ReachFrequency>,
    pub user_months: Vec<UserMonth>,
    pub thresholds: Vec<ThresholdSet>,
    pub segmented_user_months: Vec<SegmentedUserMonth>,
    pub segment_monthly_counts: Vec<SegmentMonthlyCount>,
    pub segment_code_summary: Vec<SegmentCodeSummary>,
    pub segment_points: Vec<SegmentPoints>,
    pub achiever_profile: Vec<ProfileEntry>,
    /// Code descriptions the tables were built with
    pub code_lookup: Vec<LookupEntry>,
}

impl PrecomputedTables {
    /// Row count of a table; `Transactions` is not part of this set
    pub fn row_count(&self, table: TableName) -> Option<usize> {
        let count = match table {
            TableName::Transactions => return None,
            TableName::UserMonthlyPoints => self.user_monthly_points.len(),
            TableName::MonthlyRewardStats => self.monthly_reward_stats.len(),
            TableName::PointCutoffCounts => self.point_cutoff_counts.len(),
            TableName::GroupedReward => self.grouped_reward.len(),
            TableName::TransactionSummary => self.transaction_summary.len(),
            TableName::TransactionSummaryPadded => self.transaction_summary_padded.len(),
            TableName::CodeGroupCodes => self.code_group_codes.len(),
            TableName::MoversMonthly => self.movers_monthly.len(),
            TableName::MonthlyBucketCounts => self.monthly_bucket_counts.len(),
            TableName::CodeAverageByYear => self.code_average_by_year.len(),
            TableName::ReachFrequency => self.reach_frequency.len(),
            TableName::UserMonths => self.user_months.len(),
            TableName::Thresholds => self.thresholds.len(),
            TableName::SegmentedUserMonths => self.segmented_user_months.len(),
            TableName::SegmentMonthlyCounts => self.segment_monthly_counts.len(),
            TableName::SegmentCodeSummary => self.segment_code_summary.len(),
            TableName::SegmentPoints => self.segment_points.len(),
            TableName::AchieverProfile => self.achiever_profile.len(),
            TableName::CodeLookup => self.code_lookup.len(),
        };
        Some(count)
    }
}

fn owned<T: Clone>(table: Arc<Vec<T>>) -> Vec<T> {
    Arc::unwrap_or_clone(table)
}

/// Compute every named table for the dataset
pub fn precompute(analytics: &Analytics, data: &Dataset) -> Result<PrecomputedTables> {
    info!(
        "Precomputing derived tables for {} rows ({} years)",
        data.len(),
        data.years().len()
    );

    let tables = PrecomputedTables {
        user_monthly_points: owned(analytics.user_monthly_points(data)?),
        monthly_reward_stats: owned(analytics.monthly_reward_stats(data)?),
        point_cutoff_counts: owned(analytics.point_cutoff_counts(data)?),
        grouped_reward: owned(analytics.grouped_reward(data)?),
        transaction_summary: owned(analytics.transaction_summary(data)?),
        transaction_summary_padded: owned(analytics.transaction_summary_padded(data)?),
        code_group_codes: owned(analytics.code_group_codes(data)?),
        movers_monthly: owned(analytics.movers_monthly(data)?),
        monthly_bucket_counts: owned(analytics.monthly_bucket_counts(data)?),
        code_average_by_year: owned(analytics.code_average_by_year(data)?),
        reach_frequency: owned(analytics.reach_frequency(data)?),
        user_months: owned(analytics.user_months(data)?),
        thresholds: analytics.all_thresholds(data)?,
        segmented_user_months: owned(analytics.all_segmented_user_months(data)?),
        segment_monthly_counts: owned(analytics.segment_monthly_counts(data)?),
        segment_code_summary: owned(analytics.segment_code_summary(data)?),
        segment_points: owned(analytics.segment_points(data)?),
        achiever_profile: owned(analytics.achiever_profile(data)?),
        code_lookup: analytics.lookup().entries(),
    };

    for year in tables.thresholds.iter().filter(|t| t.fallback_used) {
        info!("Year {} used the empty-population percentile fallback", year.year);
    }
    Ok(tables)
}
