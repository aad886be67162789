//! On-demand query façade
//!
//! [`Analytics`] wraps every aggregation and segmentation operation in the
//! injected [`MemoCache`]. Results are keyed by the dataset fingerprint plus
//! the scalar parameters that shape them, so a repeated query returns the
//! stored table instead of recomputing it.
//!
//! The batch precompute mode calls the same methods, which keeps the two
//! modes identical by construction.

use std::any::Any;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::aggregate;
use crate::cache::{CacheKey, MemoCache};
use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::models::*;
use crate::segment;

/// Cached access to every derived table
pub struct Analytics<'a> {
    config: &'a PipelineConfig,
    lookup: &'a Lookup,
    cache: &'a MemoCache,
    lookup_tag: String,
}

impl<'a> Analytics<'a> {
    pub fn new(config: &'a PipelineConfig, lookup: &'a Lookup, cache: &'a MemoCache) -> Self {
        let mut hasher = Sha256::new();
        for (code, desc) in lookup.sorted_entries() {
            hasher.update(code.as_bytes());
            hasher.update([0x1f]);
            hasher.update(desc.as_bytes());
            hasher.update([0x1e]);
        }
        let lookup_tag = hex::encode(hasher.finalize())[..16].to_string();

        Self {
            config,
            lookup,
            cache,
            lookup_tag,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    pub fn lookup(&self) -> &Lookup {
        self.lookup
    }

    fn cached<T, F>(
        &self,
        operation: &'static str,
        params: String,
        data: &Dataset,
        compute: F,
    ) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        self.cache
            .get_or_try_insert_with(CacheKey::new(operation, params, data.fingerprint()), compute)
    }

    /// Parameters shaping user-month rows
    fn reach_params(&self) -> String {
        let t = &self.config.thresholds;
        format!("reach={},inactive={}", t.reach_points, t.inactive_max_transactions)
    }

    /// Parameters shaping thresholds and every segment table built on them
    fn segment_params(&self) -> String {
        format!(
            "{},fallback={}",
            self.reach_params(),
            self.config.thresholds.empty_percentile_fallback
        )
    }

    /// Parameters shaping the achiever profile
    fn profile_params(&self) -> String {
        let excluded = self.config.reports.profile_excluded_code.as_deref();
        format!("{},excluded={}", self.reach_params(), excluded.unwrap_or(""))
    }

    // -------------------------------------------------------------------------
    // Dataset slices
    // -------------------------------------------------------------------------

    /// Rows of one year, cached per parent dataset
    pub fn year_dataset(&self, data: &Dataset, year: i32) -> Result<Arc<Dataset>> {
        self.cached("for_year", format!("year={}", year), data, || {
            Ok(data.for_year(year))
        })
    }

    // -------------------------------------------------------------------------
    // User and monthly totals
    // -------------------------------------------------------------------------

    pub fn user_months(&self, data: &Dataset) -> Result<Arc<Vec<UserMonth>>> {
        self.cached("user_month_stats", self.reach_params(), data, || {
            Ok(aggregate::user_month_stats(data.rows(), &self.config.thresholds))
        })
    }

    pub fn user_monthly_points(&self, data: &Dataset) -> Result<Arc<Vec<UserMonthlyPoints>>> {
        let reach = self.config.thresholds.reach_points;
        self.cached("user_monthly_points", format!("reach={}", reach), data, || {
            Ok(aggregate::user_monthly_points(data.rows(), reach))
        })
    }

    pub fn monthly_reward_stats(&self, data: &Dataset) -> Result<Arc<Vec<MonthlyRewardStat>>> {
        let points = self.user_monthly_points(data)?;
        let reach = self.config.thresholds.reach_points;
        self.cached("monthly_reward_stats", format!("reach={}", reach), data, || {
            Ok(aggregate::monthly_reward_stats(&points))
        })
    }

    pub fn point_cutoff_counts(&self, data: &Dataset) -> Result<Arc<Vec<CutoffCount>>> {
        let points = self.user_monthly_points(data)?;
        let cutoffs = &self.config.reports.point_cutoffs;
        let reach = self.config.thresholds.reach_points;
        let params = format!("cutoffs={:?},reach={}", cutoffs, reach);
        self.cached("point_cutoff_counts", params, data, || {
            Ok(aggregate::point_cutoff_counts(&points, cutoffs, reach))
        })
    }

    // -------------------------------------------------------------------------
    // Categories and codes
    // -------------------------------------------------------------------------

    pub fn grouped_reward(&self, data: &Dataset) -> Result<Arc<Vec<GroupedReward>>> {
        self.cached("grouped_reward", String::new(), data, || {
            Ok(aggregate::grouped_reward(data.rows()))
        })
    }

    pub fn transaction_summary(&self, data: &Dataset) -> Result<Arc<Vec<TransactionSummary>>> {
        let params = format!("lookup={}", self.lookup_tag);
        self.cached("transaction_summary", params, data, || {
            Ok(aggregate::transaction_summary(data.rows(), self.lookup))
        })
    }

    pub fn transaction_summary_padded(
        &self,
        data: &Dataset,
    ) -> Result<Arc<Vec<PaddedTransactionSummary>>> {
        let summary = self.transaction_summary(data)?;
        let epsilon = self.config.reports.pad_epsilon;
        let params = format!("lookup={},eps={}", self.lookup_tag, epsilon);
        self.cached("transaction_summary_padded", params, data, || {
            Ok(aggregate::transaction_summary_padded(&summary, epsilon))
        })
    }

    pub fn code_group_codes(&self, data: &Dataset) -> Result<Arc<Vec<CodeGroupCode>>> {
        self.cached("code_group_codes", String::new(), data, || {
            Ok(aggregate::code_group_codes(data.rows()))
        })
    }

    pub fn movers_monthly(&self, data: &Dataset) -> Result<Arc<Vec<MoverMonthly>>> {
        let missing = &self.config.ingest.missing_code;
        self.cached("movers_monthly", format!("missing={}", missing), data, || {
            Ok(aggregate::movers_monthly(data.rows(), missing))
        })
    }

    pub fn growth_movers(&self, data: &Dataset, year: i32) -> Result<Arc<Vec<GrowthMover>>> {
        let movers = self.movers_monthly(data)?;
        let r = &self.config.reports;
        let params = format!(
            "year={},missing={},months={},pct={},last={},top={}",
            year,
            self.config.ingest.missing_code,
            r.growth_min_active_months,
            r.growth_min_pct,
            r.growth_min_last,
            r.growth_top_n
        );
        self.cached("growth_movers", params, data, || {
            Ok(aggregate::growth_movers(&movers, year, r))
        })
    }

    pub fn code_average_by_year(&self, data: &Dataset) -> Result<Arc<Vec<CodeAverage>>> {
        let params = format!("lookup={}", self.lookup_tag);
        self.cached("code_average_by_year", params, data, || {
            Ok(aggregate::code_average_by_year(data.rows(), self.lookup))
        })
    }

    // -------------------------------------------------------------------------
    // Point distribution and reach
    // -------------------------------------------------------------------------

    pub fn monthly_bucket_counts(&self, data: &Dataset) -> Result<Arc<Vec<BucketCount>>> {
        let user_months = self.user_months(data)?;
        self.cached("monthly_bucket_counts", self.reach_params(), data, || {
            Ok(aggregate::monthly_bucket_counts(&user_months))
        })
    }

    pub fn reach_frequency(&self, data: &Dataset) -> Result<Arc<Vec<ReachFrequency>>> {
        let user_months = self.user_months(data)?;
        self.cached("reach_frequency", self.reach_params(), data, || {
            Ok(aggregate::reach_frequency(&user_months))
        })
    }

    pub fn achiever_profile(&self, data: &Dataset) -> Result<Arc<Vec<ProfileEntry>>> {
        let user_months = self.user_months(data)?;
        let excluded = self.config.reports.profile_excluded_code.as_deref();
        self.cached("achiever_profile", self.profile_params(), data, || {
            Ok(aggregate::achiever_profile(data.rows(), &user_months, excluded))
        })
    }

    pub fn average_achiever_profile(
        &self,
        data: &Dataset,
        year: i32,
    ) -> Result<Arc<Vec<AverageProfileEntry>>> {
        let profile = self.achiever_profile(data)?;
        let params = format!("year={},{},lookup={}", year, self.profile_params(), self.lookup_tag);
        self.cached("average_achiever_profile", params, data, || {
            Ok(aggregate::average_achiever_profile(&profile, year, self.lookup))
        })
    }

    pub fn threshold_scenario(&self, data: &Dataset, year: i32) -> Result<Arc<ThresholdScenario>> {
        let user_months = self.user_months(data)?;
        let current = self.config.thresholds.reach_points;
        let discounted = self.config.reports.discount_points;
        let params = format!("year={},current={},discounted={}", year, current, discounted);
        self.cached("threshold_scenario", params, data, || {
            Ok(aggregate::threshold_scenario(&user_months, year, current, discounted))
        })
    }

    // -------------------------------------------------------------------------
    // Segmentation
    // -------------------------------------------------------------------------

    pub fn thresholds(&self, data: &Dataset, year: i32) -> Result<Arc<ThresholdSet>> {
        let user_months = self.user_months(data)?;
        let fallback = self.config.thresholds.empty_percentile_fallback;
        let params = format!("year={},{}", year, self.segment_params());
        self.cached("thresholds", params, data, || {
            Ok(segment::compute_thresholds(year, &user_months, fallback))
        })
    }

    /// Threshold sets of every year, ascending
    pub fn all_thresholds(&self, data: &Dataset) -> Result<Vec<ThresholdSet>> {
        data.years()
            .into_iter()
            .map(|year| self.thresholds(data, year).map(|t| t.as_ref().clone()))
            .collect()
    }

    pub fn segmented_user_months(
        &self,
        data: &Dataset,
        year: i32,
    ) -> Result<Arc<Vec<SegmentedUserMonth>>> {
        let user_months = self.user_months(data)?;
        let thresholds = self.thresholds(data, year)?;
        let params = format!("year={},{}", year, self.segment_params());
        self.cached("segment_user_months", params, data, || {
            Ok(segment::segment_user_months(&user_months, &thresholds))
        })
    }

    /// Segmented user-months of every year, concatenated in year order
    pub fn all_segmented_user_months(&self, data: &Dataset) -> Result<Arc<Vec<SegmentedUserMonth>>> {
        self.cached("segment_user_months_all", self.segment_params(), data, || {
            let mut all = Vec::new();
            for year in data.years() {
                all.extend(self.segmented_user_months(data, year)?.iter().cloned());
            }
            Ok(all)
        })
    }

    pub fn segment_monthly_counts(&self, data: &Dataset) -> Result<Arc<Vec<SegmentMonthlyCount>>> {
        let segmented = self.all_segmented_user_months(data)?;
        self.cached("segment_monthly_counts", self.segment_params(), data, || {
            Ok(segment::segment_monthly_counts(&segmented))
        })
    }

    pub fn segment_code_summary(&self, data: &Dataset) -> Result<Arc<Vec<SegmentCodeSummary>>> {
        let segmented = self.all_segmented_user_months(data)?;
        let params = format!("{},lookup={}", self.segment_params(), self.lookup_tag);
        self.cached("segment_code_summary", params, data, || {
            Ok(segment::segment_code_summary(data.rows(), &segmented, self.lookup))
        })
    }

    pub fn segment_points(&self, data: &Dataset) -> Result<Arc<Vec<SegmentPoints>>> {
        let segmented = self.all_segmented_user_months(data)?;
        self.cached("segment_points_by_month", self.segment_params(), data, || {
            Ok(segment::segment_points_by_month(&segmented))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::precompute::{precompute, PrecomputedTables};
    use crate::test_utils::{dataset, raw, repeated};

    fn sample() -> Dataset {
        let mut rows = repeated("C1", "10K_TRANSACTION", "JAN", "25", 300, 4);
        rows.extend(repeated("C2", "ARD_SEC", "JAN", "25", 100, 2));
        rows.push(raw("01-FEB-25", "C3", "40", Some("ACO"), None));
        rows.push(raw("01-DEC-24", "C1", "40", Some("ACO"), None));
        dataset(rows)
    }

    #[test]
    fn test_repeated_queries_hit_cache() {
        let config = PipelineConfig::default();
        let lookup = Lookup::new();
        let cache = MemoCache::new();
        let analytics = Analytics::new(&config, &lookup, &cache);
        let data = sample();

        let first = analytics.user_months(&data).unwrap();
        let second = analytics.user_months(&data).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_cached_equals_fresh_computation() {
        let config = PipelineConfig::default();
        let lookup = Lookup::new();
        let cache = MemoCache::new();
        let analytics = Analytics::new(&config, &lookup, &cache);
        let data = sample();

        // Warm the cache, then compare against direct calls
        analytics.segment_code_summary(&data).unwrap();
        let cached = analytics.segment_code_summary(&data).unwrap();

        let user_months = aggregate::user_month_stats(data.rows(), &config.thresholds);
        let mut fresh_segments = Vec::new();
        for year in data.years() {
            let t = segment::compute_thresholds(year, &user_months, 0.0);
            fresh_segments.extend(segment::segment_user_months(&user_months, &t));
        }
        let fresh = segment::segment_code_summary(data.rows(), &fresh_segments, &lookup);

        assert_eq!(*cached, fresh);
    }

    #[test]
    fn test_year_parameter_separates_entries() {
        let config = PipelineConfig::default();
        let lookup = Lookup::new();
        let cache = MemoCache::new();
        let analytics = Analytics::new(&config, &lookup, &cache);
        let data = sample();

        let t2024 = analytics.thresholds(&data, 2024).unwrap();
        let t2025 = analytics.thresholds(&data, 2025).unwrap();
        assert_eq!(t2024.year, 2024);
        assert_eq!(t2025.year, 2025);
        assert!(t2024.fallback_used);
        assert_eq!(analytics.all_thresholds(&data).unwrap().len(), 2);
    }

    #[test]
    fn test_lookup_changes_cache_key() {
        let config = PipelineConfig::default();
        let cache = MemoCache::new();
        let data = sample();

        let plain = Lookup::new();
        let described: Lookup = vec![("ARD_SEC", "securities")].into_iter().collect();

        let a = Analytics::new(&config, &plain, &cache)
            .transaction_summary(&data)
            .unwrap();
        let b = Analytics::new(&config, &described, &cache)
            .transaction_summary(&data)
            .unwrap();

        assert!(a.iter().any(|r| r.desc == "ARD_SEC"));
        assert!(b.iter().any(|r| r.desc == "Securities"));
    }

    #[test]
    fn test_fallback_changes_segment_cache_key() {
        // No achievers in 2025, so the achiever quartile is the fallback
        let mut rows = repeated("C2", "ARD_SEC", "MAR", "25", 100, 2);
        rows.extend(repeated("C4", "ARD_SEC", "MAR", "25", 100, 3));
        let data = dataset(rows);
        let lookup = Lookup::new();

        let zero = PipelineConfig::default();
        let mut hundred = PipelineConfig::default();
        hundred.thresholds.empty_percentile_fallback = 100.0;

        let cache = MemoCache::new();
        let warm = Analytics::new(&zero, &lookup, &cache)
            .segmented_user_months(&data, 2025)
            .unwrap();
        assert!(warm.iter().all(|s| s.segment == Segment::HighEffort));

        let shared = Analytics::new(&hundred, &lookup, &cache)
            .segmented_user_months(&data, 2025)
            .unwrap();
        let cold_cache = MemoCache::new();
        let cold = Analytics::new(&hundred, &lookup, &cold_cache)
            .segmented_user_months(&data, 2025)
            .unwrap();

        assert_eq!(shared, cold);
        let segments: Vec<Segment> = shared.iter().map(|s| s.segment).collect();
        assert_eq!(segments, vec![Segment::Explorer, Segment::Consistent]);

        let shared_summary = Analytics::new(&hundred, &lookup, &cache)
            .segment_code_summary(&data)
            .unwrap();
        assert!(shared_summary.iter().all(|r| r.segment != Segment::HighEffort));
    }

    type Snapshot = (
        PrecomputedTables,
        Vec<(Vec<GrowthMover>, Vec<AverageProfileEntry>, ThresholdScenario)>,
    );

    /// Every table and per-year view for one configuration
    fn snapshot(config: &PipelineConfig, cache: &MemoCache, data: &Dataset) -> Snapshot {
        let lookup = Lookup::new();
        let analytics = Analytics::new(config, &lookup, cache);
        let per_year = data
            .years()
            .into_iter()
            .map(|year| {
                (
                    analytics.growth_movers(data, year).unwrap().as_ref().clone(),
                    analytics
                        .average_achiever_profile(data, year)
                        .unwrap()
                        .as_ref()
                        .clone(),
                    analytics.threshold_scenario(data, year).unwrap().as_ref().clone(),
                )
            })
            .collect();
        (precompute(&analytics, data).unwrap(), per_year)
    }

    fn tweak(
        name: &'static str,
        apply: fn(&mut PipelineConfig),
    ) -> (&'static str, fn(&mut PipelineConfig)) {
        (name, apply)
    }

    #[test]
    fn test_config_parameters_change_cache_keys() {
        let tweaks = [
            tweak("reach_points", |c| c.thresholds.reach_points = 150),
            tweak("inactive_max_transactions", |c| {
                c.thresholds.inactive_max_transactions = 0
            }),
            tweak("empty_percentile_fallback", |c| {
                c.thresholds.empty_percentile_fallback = 100.0
            }),
            tweak("point_cutoffs", |c| c.reports.point_cutoffs = vec![100]),
            tweak("discount_points", |c| c.reports.discount_points = 200),
            tweak("profile_excluded_code", |c| {
                c.reports.profile_excluded_code = Some("10K_TRANSACTION".to_string())
            }),
            tweak("pad_epsilon", |c| c.reports.pad_epsilon = 0.5),
            tweak("growth gates", |c| {
                c.reports.growth_min_active_months = 0;
                c.reports.growth_min_pct = -1.0;
                c.reports.growth_min_last = 0;
            }),
        ];

        let data = sample();
        let base = PipelineConfig::default();

        for (name, apply) in tweaks {
            let mut changed = base.clone();
            apply(&mut changed);

            let shared = MemoCache::new();
            let before = snapshot(&base, &shared, &data);
            let after = snapshot(&changed, &shared, &data);
            let cold = snapshot(&changed, &MemoCache::new(), &data);

            assert_ne!(before, after, "{} does not affect the sample", name);
            assert_eq!(after, cold, "{} returned a stale cached table", name);
        }
    }
}
