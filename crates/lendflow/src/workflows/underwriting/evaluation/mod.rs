//! Stage evaluators for the underwriting pipeline.
//!
//! Each evaluator inspects the application against [`UnderwritingPolicy`]
//! thresholds and returns a [`StageOutcome`] plus any signals the workflow
//! must persist. Evaluators are pure aside from the political-exposure flag,
//! which the service draws before calling in.
//!
//! [`UnderwritingPolicy`]: super::policy::UnderwritingPolicy

mod compliance;
mod eligibility;
mod kyc;

pub use compliance::{evaluate_compliance, ComplianceSignals};
pub use eligibility::{evaluate_eligibility, EligibilitySignals};
pub use kyc::evaluate_kyc;

/// Verdict and audit remarks produced by a single stage evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub approved: bool,
    pub remarks: Vec<String>,
}

impl StageOutcome {
    /// Remarks flattened into the single line persisted on the stage record.
    pub fn remarks_line(&self) -> String {
        self.remarks.join("; ")
    }
}

/// Formats a monetary amount with comma grouping and two decimals.
pub(crate) fn format_amount(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped}.{:02}", cents % 100)
}
