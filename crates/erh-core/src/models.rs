//! Domain models for erh
//!
//! Column names of every derived table row are part of the reporting
//! contract, so serde renames pin them to the published names
//! (`CUST_CODE`, `Total_Points`, `User_Segment`, `CODE_GROUP`, ...).

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// =============================================================================
// Ledger
// =============================================================================

/// A ledger row as delivered by the ingestion layer, before any cleaning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Transaction date in the external format (e.g. `15-APR-25`)
    pub txn_date: Option<String>,
    /// Posting date, same format; parse failures are tolerated
    pub post_date: Option<String>,
    pub cust_code: String,
    /// Amount as delivered; may be noisy, fractional or non-numeric
    pub txn_amount: Option<String>,
    /// Transaction-type ("loyalty") code
    pub loyal_code: Option<String>,
    pub txn_desc: Option<String>,
    /// Journal / sequence identifier
    pub jrno: String,
    /// Operator or payment-channel code
    pub operator: Option<String>,
}

/// A cleaned, classified ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "TXN_DATE")]
    pub txn_date: NaiveDate,
    #[serde(rename = "POST_DATE")]
    pub post_date: Option<NaiveDate>,
    #[serde(rename = "CUST_CODE")]
    pub cust_code: String,
    /// Points, always non-negative
    #[serde(rename = "TXN_AMOUNT")]
    pub amount: i64,
    /// Loyalty code after promotional reclassification, never empty
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    /// Normalized description (lower-cased, periods stripped)
    #[serde(rename = "TXN_DESC")]
    pub description: String,
    #[serde(rename = "JRNO")]
    pub jrno: String,
    #[serde(rename = "OPERATOR")]
    pub operator: Option<String>,
    pub year: i32,
    #[serde(rename = "MONTH_NUM")]
    pub month_num: u32,
    #[serde(rename = "MONTH_NAME")]
    pub month_name: String,
    /// `YYYY-MM`
    pub year_month: String,
    #[serde(rename = "CODE_GROUP")]
    pub code_group: CodeGroup,
}

// =============================================================================
// Closed label sets
// =============================================================================

/// Business category assigned to a loyalty code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodeGroup {
    #[serde(rename = "Core Transactions")]
    CoreTransactions,
    #[serde(rename = "Financial Transactions")]
    FinancialTransactions,
    #[serde(rename = "Account Opening")]
    AccountOpening,
    #[serde(rename = "Investments & Securities")]
    InvestmentsSecurities,
    #[serde(rename = "Merchant & Lifestyle")]
    MerchantLifestyle,
    #[serde(rename = "Insurance")]
    Insurance,
    #[serde(rename = "Campaigns & Events")]
    CampaignsEvents,
    #[serde(rename = "Other")]
    Other,
}

impl CodeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoreTransactions => "Core Transactions",
            Self::FinancialTransactions => "Financial Transactions",
            Self::AccountOpening => "Account Opening",
            Self::InvestmentsSecurities => "Investments & Securities",
            Self::MerchantLifestyle => "Merchant & Lifestyle",
            Self::Insurance => "Insurance",
            Self::CampaignsEvents => "Campaigns & Events",
            Self::Other => "Other",
        }
    }

    /// Get all code groups
    pub fn all() -> &'static [CodeGroup] {
        &[
            Self::CoreTransactions,
            Self::FinancialTransactions,
            Self::AccountOpening,
            Self::InvestmentsSecurities,
            Self::MerchantLifestyle,
            Self::Insurance,
            Self::CampaignsEvents,
            Self::Other,
        ]
    }
}

impl std::str::FromStr for CodeGroup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("Unknown code group: {}", s))
    }
}

impl std::fmt::Display for CodeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behavioral segment of a user-month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "Achiever")]
    Achiever,
    #[serde(rename = "Consistent")]
    Consistent,
    #[serde(rename = "Explorer")]
    Explorer,
    #[serde(rename = "High Effort")]
    HighEffort,
    #[serde(rename = "Inactive")]
    Inactive,
    #[serde(rename = "Irregular Participant")]
    IrregularParticipant,
}

impl Segment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Achiever => "Achiever",
            Self::Consistent => "Consistent",
            Self::Explorer => "Explorer",
            Self::HighEffort => "High Effort",
            Self::Inactive => "Inactive",
            Self::IrregularParticipant => "Irregular Participant",
        }
    }

    /// Get all segments, in label order
    pub fn all() -> &'static [Segment] {
        &[
            Self::Achiever,
            Self::Consistent,
            Self::Explorer,
            Self::HighEffort,
            Self::Inactive,
            Self::IrregularParticipant,
        ]
    }
}

impl std::str::FromStr for Segment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', " ");
        Self::all()
            .iter()
            .find(|seg| seg.as_str().eq_ignore_ascii_case(&wanted))
            .copied()
            .ok_or_else(|| format!("Unknown segment: {}", s))
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Monthly point-total bucket: left-closed, right-open, last one unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PointBucket {
    #[serde(rename = "0-49")]
    B0,
    #[serde(rename = "50-99")]
    B50,
    #[serde(rename = "100-199")]
    B100,
    #[serde(rename = "200-299")]
    B200,
    #[serde(rename = "300-399")]
    B300,
    #[serde(rename = "400-499")]
    B400,
    #[serde(rename = "500-599")]
    B500,
    #[serde(rename = "600-699")]
    B600,
    #[serde(rename = "700-799")]
    B700,
    #[serde(rename = "800-899")]
    B800,
    #[serde(rename = "900-999")]
    B900,
    #[serde(rename = "1000+")]
    B1000Plus,
}

impl PointBucket {
    /// Lower edges of every bucket, ascending
    pub const EDGES: [i64; 12] = [0, 50, 100, 200, 300, 400, 500, 600, 700, 800, 900, 1000];

    pub fn all() -> &'static [PointBucket] {
        &[
            Self::B0,
            Self::B50,
            Self::B100,
            Self::B200,
            Self::B300,
            Self::B400,
            Self::B500,
            Self::B600,
            Self::B700,
            Self::B800,
            Self::B900,
            Self::B1000Plus,
        ]
    }

    /// Bucket for a monthly total; amounts are non-negative so every total has one
    pub fn from_points(points: i64) -> Self {
        let idx = Self::EDGES
            .iter()
            .rposition(|&edge| points >= edge)
            .unwrap_or(0);
        Self::all()[idx]
    }

    /// Inclusive lower edge of the bucket
    pub fn lower(&self) -> i64 {
        Self::EDGES[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::B0 => "0-49",
            Self::B50 => "50-99",
            Self::B100 => "100-199",
            Self::B200 => "200-299",
            Self::B300 => "300-399",
            Self::B400 => "400-499",
            Self::B500 => "500-599",
            Self::B600 => "600-699",
            Self::B700 => "700-799",
            Self::B800 => "800-899",
            Self::B900 => "900-999",
            Self::B1000Plus => "1000+",
        }
    }
}

impl std::fmt::Display for PointBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Loyalty code → human-readable description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lookup {
    descriptions: HashMap<String, String>,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a description, capitalized; the first occurrence of a code wins
    pub fn insert(&mut self, code: impl Into<String>, description: &str) {
        self.descriptions
            .entry(code.into())
            .or_insert_with(|| capitalize(description));
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.descriptions.get(code).map(String::as_str)
    }

    /// Description for display, falling back to the raw code
    pub fn describe(&self, code: &str) -> String {
        self.get(code).unwrap_or(code).to_string()
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// Entries sorted by code
    pub fn sorted_entries(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .descriptions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        entries.sort_unstable();
        entries
    }
}

impl<K: Into<String>, V: AsRef<str>> FromIterator<(K, V)> for Lookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut lookup = Lookup::new();
        for (code, desc) in iter {
            lookup.insert(code, desc.as_ref());
        }
        lookup
    }
}

/// One persisted lookup row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupEntry {
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    #[serde(rename = "TXN_DESC")]
    pub desc: String,
}

impl Lookup {
    /// Rows for persistence, sorted by code
    pub fn entries(&self) -> Vec<LookupEntry> {
        self.sorted_entries()
            .into_iter()
            .map(|(code, desc)| LookupEntry {
                loyal_code: code.to_string(),
                desc: desc.to_string(),
            })
            .collect()
    }

    /// Rebuild from persisted rows; stored descriptions are already capitalized
    pub fn from_entries(entries: &[LookupEntry]) -> Self {
        entries
            .iter()
            .map(|e| (e.loyal_code.as_str(), e.desc.as_str()))
            .collect()
    }
}

/// Upper-case the first character and lower-case the rest
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

// =============================================================================
// Derived tables
// =============================================================================

/// Serialize boolean flags as 0/1 columns
pub(crate) mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

/// Per (customer, month) activity within one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMonth {
    pub year: i32,
    #[serde(rename = "CUST_CODE")]
    pub cust_code: String,
    pub year_month: String,
    #[serde(rename = "MONTH_NUM")]
    pub month_num: u32,
    #[serde(rename = "MONTH_NAME")]
    pub month_name: String,
    #[serde(rename = "Total_Points")]
    pub total_points: i64,
    #[serde(rename = "Transaction_Count")]
    pub transaction_count: u64,
    #[serde(rename = "Unique_Loyal_Codes")]
    pub unique_loyal_codes: u64,
    #[serde(rename = "Active_Days")]
    pub active_days: u64,
    /// Total points reached the reward threshold
    #[serde(rename = "Reached_1000_Flag", with = "flag")]
    pub reached_threshold: bool,
    /// Transaction count at or below the inactivity limit
    #[serde(rename = "Inactive", with = "flag")]
    pub inactive: bool,
}

/// A user-month with its behavioral segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedUserMonth {
    pub year: i32,
    #[serde(rename = "CUST_CODE")]
    pub cust_code: String,
    pub year_month: String,
    #[serde(rename = "MONTH_NUM")]
    pub month_num: u32,
    #[serde(rename = "MONTH_NAME")]
    pub month_name: String,
    #[serde(rename = "Total_Points")]
    pub total_points: i64,
    #[serde(rename = "Transaction_Count")]
    pub transaction_count: u64,
    #[serde(rename = "Unique_Loyal_Codes")]
    pub unique_loyal_codes: u64,
    #[serde(rename = "Active_Days")]
    pub active_days: u64,
    #[serde(rename = "Reached_1000_Flag", with = "flag")]
    pub reached_threshold: bool,
    #[serde(rename = "Inactive", with = "flag")]
    pub inactive: bool,
    #[serde(rename = "User_Segment")]
    pub segment: Segment,
}

impl SegmentedUserMonth {
    pub fn new(row: &UserMonth, segment: Segment) -> Self {
        Self {
            year: row.year,
            cust_code: row.cust_code.clone(),
            year_month: row.year_month.clone(),
            month_num: row.month_num,
            month_name: row.month_name.clone(),
            total_points: row.total_points,
            transaction_count: row.transaction_count,
            unique_loyal_codes: row.unique_loyal_codes,
            active_days: row.active_days,
            reached_threshold: row.reached_threshold,
            inactive: row.inactive,
            segment,
        }
    }
}

/// Monthly point total of one customer, bucketed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMonthlyPoints {
    #[serde(rename = "CUST_CODE")]
    pub cust_code: String,
    pub year_month: String,
    pub month_num: u32,
    pub user_total_point: i64,
    pub point_bucket: PointBucket,
    #[serde(with = "flag")]
    pub user_reached_1000: bool,
    /// This is the customer's first active month in the dataset
    #[serde(with = "flag")]
    pub is_first_month: bool,
}

/// Program-wide totals for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRewardStat {
    pub year_month: String,
    pub total_points: i64,
    pub total_users: u64,
    pub num_user_passed_1000: u64,
    pub num_user_fail_1000: u64,
    /// passed / total_users * 100, rounded to 2 decimals
    pub percentage: f64,
    pub total_new_users: u64,
}

/// Under-threshold user-months at or above a point cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CutoffCount {
    pub year_month: String,
    /// Cutoff label such as `400+`
    pub cutoff: String,
    #[serde(rename = "Counts")]
    pub counts: u64,
}

/// Points per category per month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedReward {
    #[serde(rename = "CODE_GROUP")]
    pub code_group: CodeGroup,
    pub year_month: String,
    #[serde(rename = "TOTAL_AMOUNT")]
    pub total_amount: i64,
}

/// Activity per loyalty code per month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    pub year_month: String,
    #[serde(rename = "GROUP")]
    pub group: CodeGroup,
    #[serde(rename = "Transaction_Freq")]
    pub transaction_freq: u64,
    #[serde(rename = "Total_Users")]
    pub total_users: u64,
    #[serde(rename = "Total_Amount")]
    pub total_amount: i64,
    #[serde(rename = "DESC")]
    pub desc: String,
    pub year: i32,
}

/// Transaction summary with every (month, category) pair present
///
/// Pad rows carry an epsilon instead of zero so log-scale axes stay defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddedTransactionSummary {
    pub year_month: String,
    #[serde(rename = "GROUP")]
    pub group: CodeGroup,
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    #[serde(rename = "Transaction_Freq")]
    pub transaction_freq: f64,
    #[serde(rename = "Total_Users")]
    pub total_users: f64,
    #[serde(rename = "Total_Amount")]
    pub total_amount: f64,
    #[serde(rename = "DESC")]
    pub desc: String,
    pub year: i32,
}

/// Membership of a loyalty code in a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeGroupCode {
    #[serde(rename = "CODE_GROUP")]
    pub code_group: CodeGroup,
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
}

/// Points per loyalty code per month number (growth-mover input)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoverMonthly {
    pub year: i32,
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    #[serde(rename = "MONTH_NUM")]
    pub month_num: u32,
    #[serde(rename = "TXN_AMOUNT")]
    pub txn_amount: i64,
}

/// A loyalty code whose monthly points grew over the year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthMover {
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    pub first: i64,
    pub last: i64,
    #[serde(rename = "PCT_INCREASE")]
    pub pct_increase: f64,
}

/// User-months per point bucket per month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub year: i32,
    pub year_month: String,
    pub point_bucket: PointBucket,
    #[serde(rename = "Counts")]
    pub counts: u64,
    /// Share of the month's user-months, rounded to 2 decimals
    #[serde(rename = "Percent")]
    pub percent: f64,
}

/// Yearly totals and per-transaction average of a loyalty code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeAverage {
    pub year: i32,
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    #[serde(rename = "TXN_AMOUNT")]
    pub txn_amount: i64,
    /// Number of transactions
    #[serde(rename = "JRNO")]
    pub jrno: u64,
    #[serde(rename = "AVG")]
    pub avg: f64,
    /// Share of the year's points
    #[serde(rename = "PERCENTAGE")]
    pub percentage: f64,
    #[serde(rename = "DESC")]
    pub desc: String,
}

/// How many users reached the threshold in exactly `times_reached` months
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachFrequency {
    pub year: i32,
    #[serde(rename = "Times_Reached_1000")]
    pub times_reached: u64,
    #[serde(rename = "Number_of_Users")]
    pub number_of_users: u64,
    /// times_reached * number_of_users
    #[serde(rename = "Total")]
    pub total: u64,
}

/// Share of an achiever user-month earned through one loyalty code, scaled to 1000
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub year: i32,
    #[serde(rename = "CUST_CODE")]
    pub cust_code: String,
    #[serde(rename = "MONTH_NUM")]
    pub month_num: u32,
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    #[serde(rename = "Normalized_Points")]
    pub normalized_points: f64,
}

/// How the average achiever earns the threshold, per loyalty code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageProfileEntry {
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    #[serde(rename = "Normalized_Points")]
    pub normalized_points: f64,
    #[serde(rename = "DESC")]
    pub desc: String,
}

/// Percentile statistics for one year's segmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub year: i32,
    pub txn_q25: f64,
    pub txn_q75: f64,
    pub days_q25: f64,
    pub days_q75: f64,
    pub points_q25: f64,
    pub points_q75: f64,
    pub achievers_txn_q25: f64,
    pub achievers_points_q25: f64,
    /// At least one percentile came from the empty-population fallback
    #[serde(with = "flag")]
    pub fallback_used: bool,
}

/// User-months per segment per month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMonthlyCount {
    pub year: i32,
    pub year_month: String,
    #[serde(rename = "User_Segment")]
    pub segment: Segment,
    pub count: u64,
}

/// Points earned per loyalty code by each segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCodeSummary {
    #[serde(rename = "User_Segment")]
    pub segment: Segment,
    #[serde(rename = "LOYAL_CODE")]
    pub loyal_code: String,
    #[serde(rename = "TXN_AMOUNT")]
    pub txn_amount: i64,
    #[serde(rename = "DESC")]
    pub desc: String,
    pub year: i32,
}

/// Points earned by each segment per month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentPoints {
    pub year: i32,
    #[serde(rename = "User_Segment")]
    pub segment: Segment,
    pub year_month: String,
    #[serde(rename = "Total_Points")]
    pub total_points: i64,
}

/// User-months that would newly qualify under a discounted threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioBucket {
    pub point_bucket: PointBucket,
    pub counts: u64,
}

/// Current versus discounted reward threshold for one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdScenario {
    pub year: i32,
    pub current_threshold: i64,
    pub discounted_threshold: i64,
    pub total_user_months: u64,
    pub current_success: u64,
    pub discounted_success: u64,
    pub current_rate: f64,
    pub discounted_rate: f64,
    /// discounted_rate - current_rate, in percentage points
    pub lift: f64,
    pub newly_qualifying: Vec<ScenarioBucket>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_group_round_trip_labels() {
        for group in CodeGroup::all() {
            assert_eq!(group.as_str().parse::<CodeGroup>().unwrap(), *group);
        }
        assert_eq!(CodeGroup::all().len(), 8);
    }

    #[test]
    fn test_segment_parse_accepts_underscores() {
        assert_eq!("High_Effort".parse::<Segment>().unwrap(), Segment::HighEffort);
        assert_eq!(
            "irregular participant".parse::<Segment>().unwrap(),
            Segment::IrregularParticipant
        );
        assert!("Champion".parse::<Segment>().is_err());
        assert_eq!(Segment::all().len(), 6);
    }

    #[test]
    fn test_point_bucket_edges() {
        assert_eq!(PointBucket::from_points(0), PointBucket::B0);
        assert_eq!(PointBucket::from_points(49), PointBucket::B0);
        assert_eq!(PointBucket::from_points(50), PointBucket::B50);
        assert_eq!(PointBucket::from_points(199), PointBucket::B100);
        assert_eq!(PointBucket::from_points(999), PointBucket::B900);
        assert_eq!(PointBucket::from_points(1000), PointBucket::B1000Plus);
        assert_eq!(PointBucket::from_points(250_000), PointBucket::B1000Plus);
        assert_eq!(PointBucket::B700.lower(), 700);
    }

    #[test]
    fn test_lookup_first_occurrence_wins_and_capitalizes() {
        let lookup: Lookup = vec![
            ("10K_TRANSACTION", "TRANSACTION REWARD"),
            ("10K_TRANSACTION", "something else"),
        ]
        .into_iter()
        .collect();

        assert_eq!(lookup.get("10K_TRANSACTION"), Some("Transaction reward"));
        assert_eq!(lookup.describe("UNKNOWN_CODE"), "UNKNOWN_CODE");
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn test_lookup_entries_rebuild_same_lookup() {
        let lookup: Lookup = vec![("ARD_SEC", "SECURITY opening"), ("ACO", "лотто")]
            .into_iter()
            .collect();

        let entries = lookup.entries();
        assert_eq!(entries[0].loyal_code, "ACO");
        assert_eq!(entries[0].desc, "Лотто");

        let rebuilt = Lookup::from_entries(&entries);
        assert_eq!(rebuilt.sorted_entries(), lookup.sorted_entries());
        assert_eq!(rebuilt.describe("MISSING"), "MISSING");
    }

    #[test]
    fn test_capitalize_cyrillic() {
        assert_eq!(capitalize("ЛОТТО ХОЖИЛ"), "Лотто хожил");
        assert_eq!(capitalize(""), "");
    }
}
