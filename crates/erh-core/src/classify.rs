//! Loyalty code classifier
//!
//! Maps a raw loyalty code to one of the eight [`CodeGroup`]s. Several rules
//! can match the same code textually (`10K_OPEN_TRANSACTION` is both an
//! account-opening prefix and a transaction substring), so the rules live in
//! one ordered table and the first match wins. Reordering [`CODE_RULES`]
//! changes output.

use crate::models::CodeGroup;

/// A named classification rule over the trimmed, upper-cased code
pub struct CodeRule {
    pub name: &'static str,
    pub group: CodeGroup,
    pub matches: fn(&str) -> bool,
}

const CORE_CODES: &[&str] = &[
    "10K_TRANSACTION",
    "10K_CHARGE_CUPCAKE",
    "10K_CHARGE_CUPCAKE_1",
    "10K_TULBUR_TSES",
    "10K_TRANSACTION_CARD",
];

const GEO_CODES: &[&str] = &[
    "BAGANUUR",
    "BULGAN",
    "DARKHAN",
    "ERDENET",
    "KHENTII",
    "CHOIR",
    "SAINSHAND",
    "SELENGE",
];

const ACCOUNT_OPENING_CODES: &[&str] = &["ARD_SEC", "ARD_SEC1", "ARD_SEC100", "10K_KIDS61"];

const FINANCIAL_MARKERS: &[&str] = &["TRANSACTION", "CHARGE", "CCA", "AFFILIATE"];
const FINANCIAL_CODES: &[&str] = &["LOYALTY_LIMIT", "ACO", "ZEEL_TULULT"];

// DAATGAL is the transliterated spelling
const INSURANCE_MARKERS: &[&str] = &["INSUR", "DAATGAL"];

const MERCHANT_PREFIXES: &[&str] = &["MARAL", "MARAN"];
const MERCHANT_MARKERS: &[&str] = &["KRYPTOS", "PNP", "LOTTO"];

const SOCIAL_MARKERS: &[&str] = &["SOCIAL", "FACEBOOK", "SELFIE", "MEDEE", "TUUH"];

const INVESTMENT_PREFIXES: &[&str] = &["10K_BUY", "ARD_"];
const INVESTMENT_MARKERS: &[&str] = &["1072", "HOS", "HOUS"];

const CAMPAIGN_PREFIXES: &[&str] = &[
    "INVESTORWEEK",
    "TVMEN",
    "SMART",
    "HURUNGU",
    "PENSION_SURGALT",
    "CREDIT_SURGALT",
    "CREDIT_ZEEL",
    "ARDCOIN",
    "CREDIT_AIRDROP",
];

fn contains_any(code: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| code.contains(m))
}

fn starts_with_any(code: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| code.starts_with(p))
}

fn is_core(code: &str) -> bool {
    CORE_CODES.contains(&code)
}

fn is_geo(code: &str) -> bool {
    GEO_CODES.contains(&code)
}

fn is_account_opening(code: &str) -> bool {
    code.starts_with("10K_OPEN")
        || ACCOUNT_OPENING_CODES.contains(&code)
        || code.ends_with("UTSD")
        || code.contains("TETDANS")
}

fn is_financial(code: &str) -> bool {
    contains_any(code, FINANCIAL_MARKERS) || FINANCIAL_CODES.contains(&code)
}

fn is_insurance(code: &str) -> bool {
    contains_any(code, INSURANCE_MARKERS)
}

fn is_merchant(code: &str) -> bool {
    starts_with_any(code, MERCHANT_PREFIXES)
        || contains_any(code, MERCHANT_MARKERS)
        || code == "10K_GAME"
}

fn is_social(code: &str) -> bool {
    contains_any(code, SOCIAL_MARKERS)
}

fn is_investment(code: &str) -> bool {
    starts_with_any(code, INVESTMENT_PREFIXES) || contains_any(code, INVESTMENT_MARKERS)
}

fn is_named_campaign(code: &str) -> bool {
    starts_with_any(code, CAMPAIGN_PREFIXES)
}

/// `INF` followed by four ASCII digits, e.g. `INF2024_SPRING`
fn is_coded_campaign(code: &str) -> bool {
    code.strip_prefix("INF")
        .and_then(|rest| rest.get(..4))
        .is_some_and(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Classification rules in evaluation order (first match wins)
pub const CODE_RULES: &[CodeRule] = &[
    CodeRule {
        name: "core",
        group: CodeGroup::CoreTransactions,
        matches: is_core,
    },
    CodeRule {
        name: "geo",
        group: CodeGroup::CampaignsEvents,
        matches: is_geo,
    },
    CodeRule {
        name: "account_opening",
        group: CodeGroup::AccountOpening,
        matches: is_account_opening,
    },
    CodeRule {
        name: "financial",
        group: CodeGroup::FinancialTransactions,
        matches: is_financial,
    },
    CodeRule {
        name: "insurance",
        group: CodeGroup::Insurance,
        matches: is_insurance,
    },
    CodeRule {
        name: "merchant",
        group: CodeGroup::MerchantLifestyle,
        matches: is_merchant,
    },
    CodeRule {
        name: "social",
        group: CodeGroup::CampaignsEvents,
        matches: is_social,
    },
    CodeRule {
        name: "investment",
        group: CodeGroup::InvestmentsSecurities,
        matches: is_investment,
    },
    CodeRule {
        name: "named_campaign",
        group: CodeGroup::CampaignsEvents,
        matches: is_named_campaign,
    },
    CodeRule {
        name: "coded_campaign",
        group: CodeGroup::CampaignsEvents,
        matches: is_coded_campaign,
    },
];

/// Classify a loyalty code. Total: every input, including `None`, gets a group.
pub fn classify_code(code: Option<&str>) -> CodeGroup {
    explain_code(code).1
}

/// Classify a loyalty code and report which rule fired
pub fn explain_code(code: Option<&str>) -> (&'static str, CodeGroup) {
    let Some(code) = code else {
        // Missing codes are assumed to be plain financial activity
        return ("missing", CodeGroup::FinancialTransactions);
    };

    let code = code.trim().to_uppercase();
    CODE_RULES
        .iter()
        .find(|rule| (rule.matches)(&code))
        .map(|rule| (rule.name, rule.group))
        .unwrap_or(("fallback", CodeGroup::Other))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_code_is_financial() {
        assert_eq!(classify_code(None), CodeGroup::FinancialTransactions);
    }

    #[test]
    fn test_empty_code_is_other() {
        assert_eq!(classify_code(Some("")), CodeGroup::Other);
        assert_eq!(classify_code(Some("   ")), CodeGroup::Other);
    }

    #[test]
    fn test_known_codes() {
        let cases = [
            ("10K_TRANSACTION", CodeGroup::CoreTransactions),
            ("10k_transaction_card", CodeGroup::CoreTransactions),
            ("DARKHAN", CodeGroup::CampaignsEvents),
            ("ARD_SEC", CodeGroup::AccountOpening),
            ("10K_OPEN_DEPOSIT", CodeGroup::AccountOpening),
            ("SAVINGS_UTSD", CodeGroup::AccountOpening),
            ("KIDS_TETDANS_2", CodeGroup::AccountOpening),
            ("CARD_CHARGE", CodeGroup::FinancialTransactions),
            ("ACO", CodeGroup::FinancialTransactions),
            ("10K_PURCH_INSUR", CodeGroup::Insurance),
            ("CAR_DAATGAL", CodeGroup::Insurance),
            ("MARAL_SHOP", CodeGroup::MerchantLifestyle),
            ("10K_GET_LOTTO", CodeGroup::MerchantLifestyle),
            ("ARD_LOTTO", CodeGroup::MerchantLifestyle),
            ("10K_GAME", CodeGroup::MerchantLifestyle),
            ("FACEBOOK_SHARE", CodeGroup::CampaignsEvents),
            ("10K_BUY_BOND", CodeGroup::InvestmentsSecurities),
            ("ARD_FUND", CodeGroup::InvestmentsSecurities),
            ("HOUSING_LOAN", CodeGroup::InvestmentsSecurities),
            ("SMART_QUIZ", CodeGroup::CampaignsEvents),
            ("INF2024", CodeGroup::CampaignsEvents),
            ("inf1234_promo", CodeGroup::CampaignsEvents),
            ("None", CodeGroup::Other),
            ("INFO", CodeGroup::Other),
            ("INF12", CodeGroup::Other),
            ("SOMETHING_ELSE", CodeGroup::Other),
        ];

        for (code, expected) in cases {
            assert_eq!(classify_code(Some(code)), expected, "code {}", code);
        }
    }

    #[test]
    fn test_account_opening_prefix_beats_transaction_substring() {
        assert_eq!(
            explain_code(Some("10K_OPEN_TRANSACTION")),
            ("account_opening", CodeGroup::AccountOpening)
        );
    }

    #[test]
    fn test_core_set_beats_transaction_substring() {
        // 10K_TRANSACTION also contains "TRANSACTION"; the exact set is earlier
        assert_eq!(explain_code(Some("10K_TRANSACTION")).0, "core");
        assert_eq!(explain_code(Some("10K_TRANSACTION_X")).0, "financial");
    }

    #[test]
    fn test_insurance_beats_investment_prefix() {
        // ARD_ prefix would be an investment, but the insurance marker is earlier
        assert_eq!(classify_code(Some("ARD_INSURANCE")), CodeGroup::Insurance);
    }

    #[test]
    fn test_merchant_beats_investment_prefix() {
        assert_eq!(classify_code(Some("ARD_LOTTO")), CodeGroup::MerchantLifestyle);
    }

    #[test]
    fn test_financial_beats_social() {
        assert_eq!(
            classify_code(Some("SOCIAL_AFFILIATE")),
            CodeGroup::FinancialTransactions
        );
    }

    #[test]
    fn test_rule_order_is_fixed() {
        let names: Vec<_> = CODE_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "core",
                "geo",
                "account_opening",
                "financial",
                "insurance",
                "merchant",
                "social",
                "investment",
                "named_campaign",
                "coded_campaign",
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        for code in ["10K_OPEN_TRANSACTION", "XYZ", "PNP_BONUS", ""] {
            assert_eq!(classify_code(Some(code)), classify_code(Some(code)));
        }
    }
}
