//! Segmentation Engine
//!
//! Quartile thresholds over one year's user-months, and the six-way
//! behavioral segment cascade. Segments are assigned by successive
//! overrides: start at `Irregular Participant`, then apply every matching
//! rule of [`SEGMENT_RULES`] in order, so the last match wins. The effective
//! precedence is Inactive > Achiever > High Effort > Explorer/Consistent.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::models::*;

/// Percentile with linear interpolation between closest ranks
///
/// Position is `(n - 1) * q` over the sorted values. `None` when empty.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;

    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

fn column(population: &[&UserMonth], value: impl Fn(&UserMonth) -> f64) -> Vec<f64> {
    population.iter().map(|um| value(um)).collect()
}

/// Percentile statistics for one year
///
/// Quartiles of the under-threshold active population (not reached, not
/// inactive) plus the achievers' lower quartiles. Empty populations take
/// `fallback`, and the year is flagged.
pub fn compute_thresholds(year: i32, user_months: &[UserMonth], fallback: f64) -> ThresholdSet {
    let rows: Vec<&UserMonth> = user_months.iter().filter(|um| um.year == year).collect();

    let under: Vec<&UserMonth> = rows
        .iter()
        .copied()
        .filter(|um| !um.reached_threshold && !um.inactive)
        .collect();
    let achievers: Vec<&UserMonth> = rows
        .iter()
        .copied()
        .filter(|um| um.reached_threshold)
        .collect();

    let under_txn = column(&under, |um| um.transaction_count as f64);
    let under_days = column(&under, |um| um.active_days as f64);
    let under_points = column(&under, |um| um.total_points as f64);
    let achiever_txn = column(&achievers, |um| um.transaction_count as f64);
    let achiever_points = column(&achievers, |um| um.total_points as f64);

    if under.is_empty() {
        warn!(
            "No under-threshold user-months in {}; using fallback percentile {}",
            year, fallback
        );
    }
    if achievers.is_empty() {
        warn!(
            "No achiever user-months in {}; using fallback percentile {}",
            year, fallback
        );
    }
    let quantile = |values: &[f64], q: f64| percentile(values, q).unwrap_or(fallback);

    let thresholds = ThresholdSet {
        year,
        txn_q25: quantile(&under_txn, 0.25),
        txn_q75: quantile(&under_txn, 0.75),
        days_q25: quantile(&under_days, 0.25),
        days_q75: quantile(&under_days, 0.75),
        points_q25: quantile(&under_points, 0.25),
        points_q75: quantile(&under_points, 0.75),
        achievers_txn_q25: quantile(&achiever_txn, 0.25),
        achievers_points_q25: quantile(&achiever_points, 0.25),
        fallback_used: under.is_empty() || achievers.is_empty(),
    };

    debug!(
        "Thresholds {}: txn q75 {}, days q75 {}, achiever txn q25 {}",
        year, thresholds.txn_q75, thresholds.days_q75, thresholds.achievers_txn_q25
    );
    thresholds
}

/// A segment override and the condition that triggers it
pub struct SegmentRule {
    pub segment: Segment,
    pub matches: fn(&UserMonth, &ThresholdSet) -> bool,
}

fn is_consistent(um: &UserMonth, t: &ThresholdSet) -> bool {
    um.transaction_count as f64 >= t.txn_q75 && um.active_days as f64 > t.days_q75
}

fn is_explorer(um: &UserMonth, t: &ThresholdSet) -> bool {
    (um.transaction_count as f64) < t.txn_q75 && um.active_days as f64 <= t.days_q75
}

fn is_high_effort(um: &UserMonth, t: &ThresholdSet) -> bool {
    um.transaction_count as f64 >= t.achievers_txn_q25
}

fn is_achiever(um: &UserMonth, _: &ThresholdSet) -> bool {
    um.reached_threshold
}

fn is_inactive(um: &UserMonth, _: &ThresholdSet) -> bool {
    um.inactive
}

/// Segment to start from before any override
pub const DEFAULT_SEGMENT: Segment = Segment::IrregularParticipant;

/// Overrides in application order (last match wins)
pub const SEGMENT_RULES: &[SegmentRule] = &[
    SegmentRule {
        segment: Segment::Consistent,
        matches: is_consistent,
    },
    SegmentRule {
        segment: Segment::Explorer,
        matches: is_explorer,
    },
    SegmentRule {
        segment: Segment::HighEffort,
        matches: is_high_effort,
    },
    SegmentRule {
        segment: Segment::Achiever,
        matches: is_achiever,
    },
    SegmentRule {
        segment: Segment::Inactive,
        matches: is_inactive,
    },
];

/// Segment of one user-month
pub fn assign_segment(user_month: &UserMonth, thresholds: &ThresholdSet) -> Segment {
    SEGMENT_RULES
        .iter()
        .fold(DEFAULT_SEGMENT, |current, rule| {
            if (rule.matches)(user_month, thresholds) {
                rule.segment
            } else {
                current
            }
        })
}

/// Segment every user-month of the thresholds' year
pub fn segment_user_months(
    user_months: &[UserMonth],
    thresholds: &ThresholdSet,
) -> Vec<SegmentedUserMonth> {
    user_months
        .iter()
        .filter(|um| um.year == thresholds.year)
        .map(|um| SegmentedUserMonth::new(um, assign_segment(um, thresholds)))
        .collect()
}

/// User-months per segment per month, sorted by year, month, segment
pub fn segment_monthly_counts(segmented: &[SegmentedUserMonth]) -> Vec<SegmentMonthlyCount> {
    let mut counts: BTreeMap<(i32, &str, Segment), u64> = BTreeMap::new();
    for s in segmented {
        *counts
            .entry((s.year, s.year_month.as_str(), s.segment))
            .or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((year, year_month, segment), count)| SegmentMonthlyCount {
            year,
            year_month: year_month.to_string(),
            segment,
            count,
        })
        .collect()
}

/// Points per code earned by each segment
///
/// Transactions are matched to their user-month's segment; transactions
/// without a segmented user-month are ignored. Sorted by year and segment,
/// then points descending.
pub fn segment_code_summary(
    transactions: &[Transaction],
    segmented: &[SegmentedUserMonth],
    lookup: &Lookup,
) -> Vec<SegmentCodeSummary> {
    let segments: HashMap<(i32, &str, &str), Segment> = segmented
        .iter()
        .map(|s| ((s.year, s.cust_code.as_str(), s.year_month.as_str()), s.segment))
        .collect();

    let mut totals: BTreeMap<(i32, Segment, &str), i64> = BTreeMap::new();
    for t in transactions {
        let key = (t.year, t.cust_code.as_str(), t.year_month.as_str());
        if let Some(&segment) = segments.get(&key) {
            *totals
                .entry((t.year, segment, t.loyal_code.as_str()))
                .or_default() += t.amount;
        }
    }

    let mut out: Vec<SegmentCodeSummary> = totals
        .into_iter()
        .map(|((year, segment, code), txn_amount)| SegmentCodeSummary {
            segment,
            loyal_code: code.to_string(),
            txn_amount,
            desc: lookup.describe(code),
            year,
        })
        .collect();

    // Stable sort keeps code order among equal amounts
    out.sort_by(|a, b| {
        (a.year, a.segment)
            .cmp(&(b.year, b.segment))
            .then(b.txn_amount.cmp(&a.txn_amount))
    });
    out
}

/// Points earned by each segment per month, sorted by year, segment, month
pub fn segment_points_by_month(segmented: &[SegmentedUserMonth]) -> Vec<SegmentPoints> {
    let mut totals: BTreeMap<(i32, Segment, &str), i64> = BTreeMap::new();
    for s in segmented {
        *totals
            .entry((s.year, s.segment, s.year_month.as_str()))
            .or_default() += s.total_points;
    }

    totals
        .into_iter()
        .map(|((year, segment, year_month), total_points)| SegmentPoints {
            year,
            segment,
            year_month: year_month.to_string(),
            total_points,
        })
        .collect()
}
