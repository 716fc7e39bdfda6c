use serde::{Deserialize, Serialize};

/// Tunable thresholds and reference lists for the verification stages.
///
/// The defaults mirror the production lending rules; deployments override
/// individual fields rather than rebuilding the whole policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnderwritingPolicy {
    /// Debt-to-income ceiling for eligibility (0.40 = 40%).
    pub max_dti_ratio: f64,
    /// Hard floor on the applicant's credit score.
    pub min_credit_score: u16,
    /// Scores below this are accepted with a marginal remark.
    pub marginal_credit_score: u16,
    /// Income must cover the loan this many times over.
    pub income_multiple: f64,
    /// Loans above this amount are rejected outright.
    pub max_loan_amount: f64,
    /// Minimum annual income accepted.
    pub min_annual_income: f64,
    /// Loans above this amount get an enhanced-due-diligence remark.
    pub enhanced_diligence_threshold: f64,
    /// Probability that political-exposure screening flags an applicant.
    pub political_hit_rate: f64,
    /// Regions the platform lends into.
    pub approved_regions: Vec<String>,
    /// Email domains on the sanctions list.
    pub sanctioned_domains: Vec<String>,
    /// Countries that fail the risk assessment.
    pub high_risk_countries: Vec<String>,
    /// Name fragments that suggest a senior-employee relation.
    pub senior_relative_markers: Vec<String>,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        Self {
            max_dti_ratio: 0.40,
            min_credit_score: 650,
            marginal_credit_score: 700,
            income_multiple: 3.0,
            max_loan_amount: 1_000_000.0,
            min_annual_income: 30_000.0,
            enhanced_diligence_threshold: 500_000.0,
            political_hit_rate: 0.1,
            approved_regions: to_strings(&[
                "APAC", "EMEA", "AMERICAS", "MEA", "NA", "SA", "EU", "ASIA",
            ]),
            sanctioned_domains: to_strings(&["sanctioned.com", "blocked.net", "restricted.org"]),
            high_risk_countries: to_strings(&["Country-X", "Country-Y"]),
            senior_relative_markers: to_strings(&["jr", "sr", "ceo", "cfo", "director"]),
        }
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
