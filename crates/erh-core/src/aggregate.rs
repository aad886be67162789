//! Aggregation Engine
//!
//! Stateless group-and-summarize operations over the canonical dataset.
//! Every function is pure, and every output has a fixed order (sorted group
//! keys, ties broken by code or customer) so reruns produce identical tables.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::config::{ReportConfig, ThresholdConfig};
use crate::models::*;

/// Round to 2 decimals
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100`, or 0 when the whole is empty
pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

#[derive(Default)]
struct UserMonthAcc<'a> {
    month_num: u32,
    month_name: &'a str,
    total_points: i64,
    transaction_count: u64,
    codes: HashSet<&'a str>,
    days: HashSet<chrono::NaiveDate>,
}

/// Per (year, customer, month) totals with reach and inactivity flags
///
/// Sorted by year, customer, month.
pub fn user_month_stats(transactions: &[Transaction], thresholds: &ThresholdConfig) -> Vec<UserMonth> {
    let mut groups: BTreeMap<(i32, &str, &str), UserMonthAcc> = BTreeMap::new();

    for t in transactions {
        let acc = groups
            .entry((t.year, t.cust_code.as_str(), t.year_month.as_str()))
            .or_default();
        acc.month_num = t.month_num;
        acc.month_name = &t.month_name;
        acc.total_points += t.amount;
        acc.transaction_count += 1;
        acc.codes.insert(&t.loyal_code);
        acc.days.insert(t.txn_date);
    }

    groups
        .into_iter()
        .map(|((year, cust, year_month), acc)| UserMonth {
            year,
            cust_code: cust.to_string(),
            year_month: year_month.to_string(),
            month_num: acc.month_num,
            month_name: acc.month_name.to_string(),
            total_points: acc.total_points,
            transaction_count: acc.transaction_count,
            unique_loyal_codes: acc.codes.len() as u64,
            active_days: acc.days.len() as u64,
            reached_threshold: acc.total_points >= thresholds.reach_points,
            inactive: acc.transaction_count <= thresholds.inactive_max_transactions,
        })
        .collect()
}

/// Per (customer, month) point totals with bucket and first-month flags
///
/// A customer's first month is the earliest month they appear in within the
/// given transactions. Sorted by customer, month.
pub fn user_monthly_points(transactions: &[Transaction], reach_points: i64) -> Vec<UserMonthlyPoints> {
    let mut totals: BTreeMap<(&str, &str), (u32, i64)> = BTreeMap::new();
    for t in transactions {
        let entry = totals
            .entry((t.cust_code.as_str(), t.year_month.as_str()))
            .or_insert((t.month_num, 0));
        entry.1 += t.amount;
    }

    // Keys are sorted by customer then month, so the first month seen wins
    let mut first_month: HashMap<&str, &str> = HashMap::new();
    for (cust, year_month) in totals.keys() {
        first_month.entry(cust).or_insert(year_month);
    }

    totals
        .iter()
        .map(|(&(cust, year_month), &(month_num, points))| UserMonthlyPoints {
            cust_code: cust.to_string(),
            year_month: year_month.to_string(),
            month_num,
            user_total_point: points,
            point_bucket: PointBucket::from_points(points),
            user_reached_1000: points >= reach_points,
            is_first_month: first_month.get(cust) == Some(&year_month),
        })
        .collect()
}

/// Program-wide totals per month, sorted by month
pub fn monthly_reward_stats(points: &[UserMonthlyPoints]) -> Vec<MonthlyRewardStat> {
    let mut months: BTreeMap<&str, MonthlyRewardStat> = BTreeMap::new();

    for p in points {
        let stat = months
            .entry(p.year_month.as_str())
            .or_insert_with(|| MonthlyRewardStat {
                year_month: p.year_month.clone(),
                total_points: 0,
                total_users: 0,
                num_user_passed_1000: 0,
                num_user_fail_1000: 0,
                percentage: 0.0,
                total_new_users: 0,
            });
        stat.total_points += p.user_total_point;
        stat.total_users += 1;
        if p.user_reached_1000 {
            stat.num_user_passed_1000 += 1;
        }
        if p.is_first_month {
            stat.total_new_users += 1;
        }
    }

    months
        .into_values()
        .map(|mut stat| {
            stat.num_user_fail_1000 = stat.total_users - stat.num_user_passed_1000;
            stat.percentage = round2(percent(
                stat.num_user_passed_1000 as f64,
                stat.total_users as f64,
            ));
            stat
        })
        .collect()
}

/// Under-threshold user-months at or above each cutoff, per month
///
/// Rows come grouped by cutoff in the given order, then sorted by month.
/// Months with no qualifying user-month have no row.
pub fn point_cutoff_counts(
    points: &[UserMonthlyPoints],
    cutoffs: &[i64],
    reach_points: i64,
) -> Vec<CutoffCount> {
    let under: Vec<&UserMonthlyPoints> = points
        .iter()
        .filter(|p| p.user_total_point < reach_points)
        .collect();

    let mut out = Vec::new();
    for &cutoff in cutoffs {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for p in under.iter().filter(|p| p.user_total_point >= cutoff) {
            *counts.entry(p.year_month.as_str()).or_default() += 1;
        }
        out.extend(counts.into_iter().map(|(year_month, counts)| CutoffCount {
            year_month: year_month.to_string(),
            cutoff: format!("{}+", cutoff),
            counts,
        }));
    }
    out
}

/// Points per category per month, sorted by month then category
pub fn grouped_reward(transactions: &[Transaction]) -> Vec<GroupedReward> {
    let mut totals: BTreeMap<(&str, CodeGroup), i64> = BTreeMap::new();
    for t in transactions {
        *totals.entry((t.year_month.as_str(), t.code_group)).or_default() += t.amount;
    }

    totals
        .into_iter()
        .map(|((year_month, code_group), total_amount)| GroupedReward {
            code_group,
            year_month: year_month.to_string(),
            total_amount,
        })
        .collect()
}

/// Frequency, reach and points per (code, month, category)
///
/// Sorted by code, month, category.
pub fn transaction_summary(transactions: &[Transaction], lookup: &Lookup) -> Vec<TransactionSummary> {
    struct Acc<'a> {
        year: i32,
        freq: u64,
        users: HashSet<&'a str>,
        amount: i64,
    }

    let mut groups: BTreeMap<(&str, &str, CodeGroup), Acc> = BTreeMap::new();
    for t in transactions {
        let acc = groups
            .entry((t.loyal_code.as_str(), t.year_month.as_str(), t.code_group))
            .or_insert_with(|| Acc {
                year: t.year,
                freq: 0,
                users: HashSet::new(),
                amount: 0,
            });
        acc.freq += 1;
        acc.users.insert(&t.cust_code);
        acc.amount += t.amount;
    }

    groups
        .into_iter()
        .map(|((code, year_month, group), acc)| TransactionSummary {
            loyal_code: code.to_string(),
            year_month: year_month.to_string(),
            group,
            transaction_freq: acc.freq,
            total_users: acc.users.len() as u64,
            total_amount: acc.amount,
            desc: lookup.describe(code),
            year: acc.year,
        })
        .collect()
}

/// Placeholder code for pad rows
pub const PAD_CODE: &str = "__PAD__";
/// Placeholder description for pad rows
pub const PAD_DESC: &str = "—";

/// Transaction summary with a row for every observed (month, category) pair
///
/// Pairs with no activity get one pad row whose numeric columns hold
/// `epsilon`. Sorted by month; within a month, categories keep their
/// first-appearance order.
pub fn transaction_summary_padded(
    summary: &[TransactionSummary],
    epsilon: f64,
) -> Vec<PaddedTransactionSummary> {
    let mut months: Vec<&str> = Vec::new();
    let mut groups: Vec<CodeGroup> = Vec::new();
    for row in summary {
        if !months.contains(&row.year_month.as_str()) {
            months.push(&row.year_month);
        }
        if !groups.contains(&row.group) {
            groups.push(row.group);
        }
    }
    months.sort_unstable();

    let mut by_cell: HashMap<(&str, CodeGroup), Vec<&TransactionSummary>> = HashMap::new();
    for row in summary {
        by_cell
            .entry((row.year_month.as_str(), row.group))
            .or_default()
            .push(row);
    }

    let mut out = Vec::new();
    for &month in &months {
        for &group in &groups {
            match by_cell.get(&(month, group)) {
                Some(rows) => out.extend(rows.iter().map(|r| PaddedTransactionSummary {
                    year_month: r.year_month.clone(),
                    group,
                    loyal_code: r.loyal_code.clone(),
                    transaction_freq: r.transaction_freq as f64,
                    total_users: r.total_users as f64,
                    total_amount: r.total_amount as f64,
                    desc: r.desc.clone(),
                    year: r.year,
                })),
                None => out.push(PaddedTransactionSummary {
                    year_month: month.to_string(),
                    group,
                    loyal_code: PAD_CODE.to_string(),
                    transaction_freq: epsilon,
                    total_users: epsilon,
                    total_amount: epsilon,
                    desc: PAD_DESC.to_string(),
                    year: month
                        .get(..4)
                        .and_then(|y| y.parse().ok())
                        .unwrap_or_default(),
                }),
            }
        }
    }
    out
}

/// Codes seen in each category
///
/// Sorted by category; codes keep their first-appearance order.
pub fn code_group_codes(transactions: &[Transaction]) -> Vec<CodeGroupCode> {
    let mut groups: BTreeMap<CodeGroup, Vec<&str>> = BTreeMap::new();
    let mut seen: HashSet<(CodeGroup, &str)> = HashSet::new();

    for t in transactions {
        if seen.insert((t.code_group, t.loyal_code.as_str())) {
            groups.entry(t.code_group).or_default().push(&t.loyal_code);
        }
    }

    groups
        .into_iter()
        .flat_map(|(code_group, codes)| {
            codes.into_iter().map(move |code| CodeGroupCode {
                code_group,
                loyal_code: code.to_string(),
            })
        })
        .collect()
}

/// Points per (year, code, month number), without the missing-code placeholder
pub fn movers_monthly(transactions: &[Transaction], missing_code: &str) -> Vec<MoverMonthly> {
    let mut totals: BTreeMap<(i32, &str, u32), i64> = BTreeMap::new();
    for t in transactions.iter().filter(|t| t.loyal_code != missing_code) {
        *totals
            .entry((t.year, t.loyal_code.as_str(), t.month_num))
            .or_default() += t.amount;
    }

    totals
        .into_iter()
        .map(|((year, code, month_num), txn_amount)| MoverMonthly {
            year,
            loyal_code: code.to_string(),
            month_num,
            txn_amount,
        })
        .collect()
}

/// Codes with the strongest first-to-last month growth in a year
///
/// Only codes active in more than `growth_min_active_months` distinct months
/// qualify. Codes whose first month is not positive are skipped.
pub fn growth_movers(movers: &[MoverMonthly], year: i32, params: &ReportConfig) -> Vec<GrowthMover> {
    // Keyed by code; month order comes from the sorted input
    let mut series: BTreeMap<&str, Vec<&MoverMonthly>> = BTreeMap::new();
    for m in movers.iter().filter(|m| m.year == year) {
        series.entry(m.loyal_code.as_str()).or_default().push(m);
    }

    let mut out: Vec<GrowthMover> = series
        .into_iter()
        .filter_map(|(code, mut months)| {
            months.sort_by_key(|m| m.month_num);
            let active = months.iter().map(|m| m.month_num).collect::<BTreeSet<_>>().len();
            if active <= params.growth_min_active_months {
                return None;
            }

            let first = months.first()?.txn_amount;
            let last = months.last()?.txn_amount;
            if first <= 0 {
                return None;
            }

            let pct_increase = (last - first) as f64 / first as f64 * 100.0;
            (pct_increase > params.growth_min_pct && last > params.growth_min_last).then(|| {
                GrowthMover {
                    loyal_code: code.to_string(),
                    first,
                    last,
                    pct_increase,
                }
            })
        })
        .collect();

    out.sort_by(|a, b| b.pct_increase.total_cmp(&a.pct_increase));
    out.truncate(params.growth_top_n);
    out
}

/// User-months per point bucket per month, with each bucket's share
///
/// Only buckets with at least one user-month appear. Sorted by year, month,
/// bucket.
pub fn monthly_bucket_counts(user_months: &[UserMonth]) -> Vec<BucketCount> {
    let mut counts: BTreeMap<(i32, &str, PointBucket), u64> = BTreeMap::new();
    let mut month_totals: HashMap<(i32, &str), u64> = HashMap::new();

    for um in user_months {
        let bucket = PointBucket::from_points(um.total_points);
        *counts.entry((um.year, um.year_month.as_str(), bucket)).or_default() += 1;
        *month_totals.entry((um.year, um.year_month.as_str())).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((year, year_month, point_bucket), counts)| {
            let total = month_totals.get(&(year, year_month)).copied().unwrap_or(0);
            BucketCount {
                year,
                year_month: year_month.to_string(),
                point_bucket,
                counts,
                percent: round2(percent(counts as f64, total as f64)),
            }
        })
        .collect()
}

/// Yearly points, transaction count, average and share per code
pub fn code_average_by_year(transactions: &[Transaction], lookup: &Lookup) -> Vec<CodeAverage> {
    let mut totals: BTreeMap<(i32, &str), (i64, u64)> = BTreeMap::new();
    let mut year_totals: HashMap<i32, i64> = HashMap::new();

    for t in transactions {
        let entry = totals.entry((t.year, t.loyal_code.as_str())).or_default();
        entry.0 += t.amount;
        entry.1 += 1;
        *year_totals.entry(t.year).or_default() += t.amount;
    }

    totals
        .into_iter()
        .map(|((year, code), (amount, count))| {
            let year_total = year_totals.get(&year).copied().unwrap_or(0);
            CodeAverage {
                year,
                loyal_code: code.to_string(),
                txn_amount: amount,
                jrno: count,
                avg: round2(amount as f64 / count as f64),
                percentage: round2(percent(amount as f64, year_total as f64)),
                desc: lookup.describe(code),
            }
        })
        .collect()
}

/// For each k, how many users reached the threshold in exactly k months
pub fn reach_frequency(user_months: &[UserMonth]) -> Vec<ReachFrequency> {
    let mut per_user: HashMap<(i32, &str), u64> = HashMap::new();
    for um in user_months.iter().filter(|um| um.reached_threshold) {
        *per_user.entry((um.year, um.cust_code.as_str())).or_default() += 1;
    }

    let mut freq: BTreeMap<(i32, u64), u64> = BTreeMap::new();
    for ((year, _), times) in per_user {
        *freq.entry((year, times)).or_default() += 1;
    }

    freq.into_iter()
        .map(|((year, times_reached), number_of_users)| ReachFrequency {
            year,
            times_reached,
            number_of_users,
            total: times_reached * number_of_users,
        })
        .collect()
}

/// Per-code share of every achiever user-month, scaled to 1000
///
/// Shares are taken against the full monthly total, so dropping
/// `excluded_code` leaves the remaining shares untouched.
pub fn achiever_profile(
    transactions: &[Transaction],
    user_months: &[UserMonth],
    excluded_code: Option<&str>,
) -> Vec<ProfileEntry> {
    let achievers: HashSet<(i32, &str, u32)> = user_months
        .iter()
        .filter(|um| um.reached_threshold)
        .map(|um| (um.year, um.cust_code.as_str(), um.month_num))
        .collect();

    let mut monthly_totals: HashMap<(i32, &str, u32), i64> = HashMap::new();
    let mut per_code: BTreeMap<(i32, &str, u32, &str), i64> = BTreeMap::new();

    for t in transactions {
        let key = (t.year, t.cust_code.as_str(), t.month_num);
        if !achievers.contains(&key) {
            continue;
        }
        *monthly_totals.entry(key).or_default() += t.amount;
        *per_code
            .entry((t.year, t.cust_code.as_str(), t.month_num, t.loyal_code.as_str()))
            .or_default() += t.amount;
    }

    per_code
        .into_iter()
        .filter(|((_, _, _, code), _)| Some(*code) != excluded_code)
        .filter_map(|((year, cust, month_num, code), amount)| {
            let total = *monthly_totals.get(&(year, cust, month_num))?;
            (total > 0).then(|| ProfileEntry {
                year,
                cust_code: cust.to_string(),
                month_num,
                loyal_code: code.to_string(),
                normalized_points: amount as f64 / total as f64 * 1000.0,
            })
        })
        .collect()
}

/// How the average achiever of a year earns the threshold
///
/// Averages every code's normalized points over all achiever user-months
/// of the year (a month without the code counts as 0), then rescales the
/// profile to sum to 1000. Sorted by points descending.
pub fn average_achiever_profile(
    profile: &[ProfileEntry],
    year: i32,
    lookup: &Lookup,
) -> Vec<AverageProfileEntry> {
    let mut user_months: HashSet<(&str, u32)> = HashSet::new();
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();

    for p in profile.iter().filter(|p| p.year == year) {
        user_months.insert((p.cust_code.as_str(), p.month_num));
        *sums.entry(p.loyal_code.as_str()).or_default() += p.normalized_points;
    }

    if user_months.is_empty() {
        return Vec::new();
    }

    let n = user_months.len() as f64;
    let means: Vec<(&str, f64)> = sums.into_iter().map(|(code, sum)| (code, sum / n)).collect();
    let grand_total: f64 = means.iter().map(|(_, mean)| mean).sum();

    let mut out: Vec<AverageProfileEntry> = means
        .into_iter()
        .map(|(code, mean)| AverageProfileEntry {
            loyal_code: code.to_string(),
            normalized_points: if grand_total > 0.0 {
                mean / grand_total * 1000.0
            } else {
                0.0
            },
            desc: lookup.describe(code),
        })
        .collect();

    out.sort_by(|a, b| b.normalized_points.total_cmp(&a.normalized_points));
    out
}

/// Current versus discounted reward threshold over one year's user-months
pub fn threshold_scenario(
    user_months: &[UserMonth],
    year: i32,
    current_threshold: i64,
    discounted_threshold: i64,
) -> ThresholdScenario {
    let mut total = 0u64;
    let mut current_success = 0u64;
    let mut discounted_success = 0u64;
    let mut newly: BTreeMap<PointBucket, u64> = BTreeMap::new();

    for um in user_months.iter().filter(|um| um.year == year) {
        total += 1;
        let passes_current = um.total_points >= current_threshold;
        let passes_discounted = um.total_points >= discounted_threshold;
        if passes_current {
            current_success += 1;
        }
        if passes_discounted {
            discounted_success += 1;
        }
        if passes_discounted && !passes_current {
            *newly.entry(PointBucket::from_points(um.total_points)).or_default() += 1;
        }
    }

    let current_rate = percent(current_success as f64, total as f64);
    let discounted_rate = percent(discounted_success as f64, total as f64);

    ThresholdScenario {
        year,
        current_threshold,
        discounted_threshold,
        total_user_months: total,
        current_success,
        discounted_success,
        current_rate: round2(current_rate),
        discounted_rate: round2(discounted_rate),
        lift: round2(discounted_rate - current_rate),
        newly_qualifying: newly
            .into_iter()
            .map(|(point_bucket, counts)| ScenarioBucket { point_bucket, counts })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{dataset, raw, repeated};

    fn defaults() -> (ThresholdConfig, ReportConfig) {
        (ThresholdConfig::default(), ReportConfig::default())
    }

    #[test]
    fn test_user_month_stats() {
        let (thresholds, _) = defaults();
        let data = dataset(vec![
            raw("01-APR-25", "C1", "600", Some("10K_TRANSACTION"), None),
            raw("01-APR-25", "C1", "300", Some("ARD_SEC"), None),
            raw("03-APR-25", "C1", "200", Some("10K_TRANSACTION"), None),
            raw("05-APR-25", "C2", "50", Some("ACO"), None),
        ]);

        let rows = user_month_stats(data.rows(), &thresholds);
        assert_eq!(rows.len(), 2);

        let c1 = &rows[0];
        assert_eq!(c1.cust_code, "C1");
        assert_eq!(c1.total_points, 1100);
        assert_eq!(c1.transaction_count, 3);
        assert_eq!(c1.unique_loyal_codes, 2);
        assert_eq!(c1.active_days, 2);
        assert_eq!(c1.month_name, "APR");
        assert!(c1.reached_threshold);
        assert!(!c1.inactive);

        let c2 = &rows[1];
        assert!(c2.inactive);
        assert!(!c2.reached_threshold);
    }

    #[test]
    fn test_monthly_reward_stats_counts_new_users() {
        let data = dataset(vec![
            raw("01-APR-25", "C1", "1200", Some("ACO"), None),
            raw("01-APR-25", "C2", "100", Some("ACO"), None),
            raw("01-MAY-25", "C1", "100", Some("ACO"), None),
            raw("01-MAY-25", "C3", "100", Some("ACO"), None),
            raw("02-MAY-25", "C3", "100", Some("ACO"), None),
        ]);

        let points = user_monthly_points(data.rows(), 1000);
        let stats = monthly_reward_stats(&points);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].year_month, "2025-04");
        assert_eq!(stats[0].total_points, 1300);
        assert_eq!(stats[0].total_users, 2);
        assert_eq!(stats[0].num_user_passed_1000, 1);
        assert_eq!(stats[0].num_user_fail_1000, 1);
        assert_eq!(stats[0].percentage, 50.0);
        assert_eq!(stats[0].total_new_users, 2);

        assert_eq!(stats[1].total_users, 2);
        assert_eq!(stats[1].total_new_users, 1);
        assert_eq!(stats[1].percentage, 0.0);
    }

    #[test]
    fn test_point_cutoff_counts_only_under_threshold() {
        let data = dataset(vec![
            raw("01-APR-25", "C1", "450", Some("ACO"), None),
            raw("01-APR-25", "C2", "950", Some("ACO"), None),
            raw("01-APR-25", "C3", "1500", Some("ACO"), None),
        ]);
        let points = user_monthly_points(data.rows(), 1000);
        let counts = point_cutoff_counts(&points, &[400, 900], 1000);

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].cutoff, "400+");
        assert_eq!(counts[0].counts, 2);
        assert_eq!(counts[1].cutoff, "900+");
        assert_eq!(counts[1].counts, 1);
    }

    #[test]
    fn test_transaction_summary_and_padding() {
        let lookup: Lookup = vec![("10K_TRANSACTION", "TRANSACTION REWARD")]
            .into_iter()
            .collect();
        let data = dataset(vec![
            raw("01-APR-25", "C1", "100", Some("10K_TRANSACTION"), None),
            raw("02-APR-25", "C1", "100", Some("10K_TRANSACTION"), None),
            raw("02-APR-25", "C2", "100", Some("10K_TRANSACTION"), None),
            raw("01-MAY-25", "C1", "300", Some("ARD_SEC"), None),
        ]);

        let summary = transaction_summary(data.rows(), &lookup);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].loyal_code, "10K_TRANSACTION");
        assert_eq!(summary[0].transaction_freq, 3);
        assert_eq!(summary[0].total_users, 2);
        assert_eq!(summary[0].total_amount, 300);
        assert_eq!(summary[0].desc, "Transaction reward");
        assert_eq!(summary[1].desc, "ARD_SEC");

        let padded = transaction_summary_padded(&summary, 1e-6);
        // 2 months x 2 categories
        assert_eq!(padded.len(), 4);
        let pads: Vec<_> = padded.iter().filter(|p| p.loyal_code == PAD_CODE).collect();
        assert_eq!(pads.len(), 2);
        assert!(pads.iter().all(|p| p.total_amount == 1e-6 && p.desc == PAD_DESC));
        assert!(padded.windows(2).all(|w| w[0].year_month <= w[1].year_month));
        assert!(padded.iter().all(|p| p.year == 2025));
    }

    #[test]
    fn test_code_group_codes_first_appearance() {
        let data = dataset(vec![
            raw("01-APR-25", "C1", "1", Some("CARD_CHARGE"), None),
            raw("01-APR-25", "C1", "1", Some("ACO"), None),
            raw("01-APR-25", "C1", "1", Some("CARD_CHARGE"), None),
            raw("01-APR-25", "C1", "1", Some("10K_TRANSACTION"), None),
        ]);

        let map = code_group_codes(data.rows());
        let pairs: Vec<_> = map
            .iter()
            .map(|m| (m.code_group, m.loyal_code.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (CodeGroup::CoreTransactions, "10K_TRANSACTION"),
                (CodeGroup::FinancialTransactions, "CARD_CHARGE"),
                (CodeGroup::FinancialTransactions, "ACO"),
            ]
        );
    }

    fn mover_series(code: &str, amounts: &[i64]) -> Vec<MoverMonthly> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, &txn_amount)| MoverMonthly {
                year: 2025,
                loyal_code: code.to_string(),
                month_num: i as u32 + 1,
                txn_amount,
            })
            .collect()
    }

    #[test]
    fn test_growth_movers_gates() {
        let (_, params) = defaults();
        let mut movers = Vec::new();
        // 7 months, +100%, last above the floor
        movers.extend(mover_series("GROWING", &[100_000, 1, 1, 1, 1, 1, 200_000]));
        // Huge growth but only 3 active months
        movers.extend(mover_series("SHORT", &[1, 1, 900_000]));
        // 7 months, growth too small
        movers.extend(mover_series("FLAT", &[100_000, 1, 1, 1, 1, 1, 110_000]));
        // 7 months, zero first month
        movers.extend(mover_series("ZERO", &[0, 1, 1, 1, 1, 1, 500_000]));
        // 7 months, +400% but last below the floor
        movers.extend(mover_series("SMALL", &[10_000, 1, 1, 1, 1, 1, 50_000]));

        let out = growth_movers(&movers, 2025, &params);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].loyal_code, "GROWING");
        assert_eq!(out[0].first, 100_000);
        assert_eq!(out[0].last, 200_000);
        assert_eq!(out[0].pct_increase, 100.0);

        assert!(growth_movers(&movers, 2024, &params).is_empty());
    }

    #[test]
    fn test_growth_movers_top_n_descending() {
        let (_, params) = defaults();
        let mut movers = Vec::new();
        for (i, code) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            let last = 200_000 + i as i64 * 100_000;
            movers.extend(mover_series(code, &[100_000, 1, 1, 1, 1, 1, 1, last]));
        }

        let out = growth_movers(&movers, 2025, &params);
        let codes: Vec<_> = out.iter().map(|m| m.loyal_code.as_str()).collect();
        assert_eq!(codes, vec!["E", "D", "C", "B"]);
    }

    #[test]
    fn test_movers_monthly_skips_missing_code() {
        let data = dataset(vec![
            raw("01-APR-25", "C1", "10", None, None),
            raw("01-APR-25", "C1", "10", Some("ACO"), None),
            raw("09-APR-25", "C2", "5", Some("ACO"), None),
        ]);
        let movers = movers_monthly(data.rows(), "None");
        assert_eq!(movers.len(), 1);
        assert_eq!(movers[0].txn_amount, 15);
        assert_eq!(movers[0].month_num, 4);
    }

    #[test]
    fn test_bucket_counts_cover_every_user_month() {
        let (thresholds, _) = defaults();
        let data = dataset(vec![
            raw("01-APR-25", "C1", "10", Some("ACO"), None),
            raw("01-APR-25", "C2", "60", Some("ACO"), None),
            raw("01-APR-25", "C3", "70", Some("ACO"), None),
            raw("01-APR-25", "C4", "5000", Some("ACO"), None),
        ]);
        let user_months = user_month_stats(data.rows(), &thresholds);
        let buckets = monthly_bucket_counts(&user_months);

        let total: u64 = buckets.iter().map(|b| b.counts).sum();
        assert_eq!(total, 4);
        let shares: f64 = buckets.iter().map(|b| b.percent).sum();
        assert!((shares - 100.0).abs() < 0.1);

        let b50 = buckets
            .iter()
            .find(|b| b.point_bucket == PointBucket::B50)
            .unwrap();
        assert_eq!(b50.counts, 2);
        assert_eq!(b50.percent, 50.0);
    }

    #[test]
    fn test_code_average_by_year() {
        let data = dataset(vec![
            raw("01-APR-25", "C1", "100", Some("ACO"), None),
            raw("02-APR-25", "C1", "200", Some("ACO"), None),
            raw("02-APR-25", "C1", "700", Some("ARD_SEC"), None),
        ]);
        let lookup = Lookup::new();
        let rows = code_average_by_year(data.rows(), &lookup);

        assert_eq!(rows[0].loyal_code, "ACO");
        assert_eq!(rows[0].txn_amount, 300);
        assert_eq!(rows[0].jrno, 2);
        assert_eq!(rows[0].avg, 150.0);
        assert_eq!(rows[0].percentage, 30.0);
        assert_eq!(rows[1].percentage, 70.0);
    }

    #[test]
    fn test_reach_frequency() {
        let (thresholds, _) = defaults();
        let mut rows = Vec::new();
        rows.extend(repeated("C1", "ACO", "JAN", "25", 500, 2));
        rows.extend(repeated("C1", "ACO", "FEB", "25", 500, 2));
        rows.extend(repeated("C2", "ACO", "JAN", "25", 1000, 1));
        rows.extend(repeated("C3", "ACO", "JAN", "25", 10, 1));
        let data = dataset(rows);

        let user_months = user_month_stats(data.rows(), &thresholds);
        let freq = reach_frequency(&user_months);

        assert_eq!(freq.len(), 2);
        assert_eq!((freq[0].times_reached, freq[0].number_of_users, freq[0].total), (1, 1, 1));
        assert_eq!((freq[1].times_reached, freq[1].number_of_users, freq[1].total), (2, 1, 2));
    }

    #[test]
    fn test_achiever_profile_and_average() {
        let (thresholds, _) = defaults();
        let data = dataset(vec![
            // C1: 75% transaction, 25% insurance
            raw("01-APR-25", "C1", "750", Some("10K_TRANSACTION"), None),
            raw("02-APR-25", "C1", "250", Some("10K_PURCH_INSUR"), None),
            // C2: all account opening
            raw("01-APR-25", "C2", "1000", Some("ARD_SEC"), None),
            // C3 is not an achiever
            raw("01-APR-25", "C3", "500", Some("ARD_SEC"), None),
        ]);
        let user_months = user_month_stats(data.rows(), &thresholds);
        let profile = achiever_profile(data.rows(), &user_months, Some("10K_PURCH_INSUR"));

        assert_eq!(profile.len(), 2);
        assert!(profile.iter().all(|p| p.loyal_code != "10K_PURCH_INSUR"));
        let c1 = profile.iter().find(|p| p.cust_code == "C1").unwrap();
        assert_eq!(c1.normalized_points, 750.0);

        let average = average_achiever_profile(&profile, 2025, &Lookup::new());
        let total: f64 = average.iter().map(|a| a.normalized_points).sum();
        assert!((total - 1000.0).abs() < 1e-9);
        // means: ARD_SEC 500, 10K_TRANSACTION 375
        assert_eq!(average[0].loyal_code, "ARD_SEC");
        assert!((average[0].normalized_points - 500.0 / 875.0 * 1000.0).abs() < 1e-9);

        assert!(average_achiever_profile(&profile, 2019, &Lookup::new()).is_empty());
    }

    #[test]
    fn test_threshold_scenario() {
        let (thresholds, _) = defaults();
        let data = dataset(vec![
            raw("01-APR-25", "C1", "1200", Some("ACO"), None),
            raw("01-APR-25", "C2", "650", Some("ACO"), None),
            raw("01-APR-25", "C3", "520", Some("ACO"), None),
            raw("01-APR-25", "C4", "100", Some("ACO"), None),
        ]);
        let user_months = user_month_stats(data.rows(), &thresholds);
        let scenario = threshold_scenario(&user_months, 2025, 1000, 500);

        assert_eq!(scenario.total_user_months, 4);
        assert_eq!(scenario.current_success, 1);
        assert_eq!(scenario.discounted_success, 3);
        assert_eq!(scenario.current_rate, 25.0);
        assert_eq!(scenario.discounted_rate, 75.0);
        assert_eq!(scenario.lift, 50.0);
        assert_eq!(
            scenario.newly_qualifying,
            vec![
                ScenarioBucket { point_bucket: PointBucket::B500, counts: 1 },
                ScenarioBucket { point_bucket: PointBucket::B600, counts: 1 },
            ]
        );
    }

    #[test]
    fn test_aggregations_are_idempotent() {
        let (thresholds, _) = defaults();
        let data = dataset(vec![
            raw("01-APR-25", "C1", "100", Some("ACO"), None),
            raw("01-MAY-25", "C2", "900", Some("ARD_SEC"), None),
        ]);
        let lookup = Lookup::new();

        assert_eq!(
            user_month_stats(data.rows(), &thresholds),
            user_month_stats(data.rows(), &thresholds)
        );
        assert_eq!(
            transaction_summary(data.rows(), &lookup),
            transaction_summary(data.rows(), &lookup)
        );
        assert_eq!(grouped_reward(data.rows()), grouped_reward(data.rows()));
    }
}
