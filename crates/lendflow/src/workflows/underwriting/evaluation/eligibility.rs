use super::{format_amount, StageOutcome};
use crate::workflows::underwriting::domain::LoanApplication;
use crate::workflows::underwriting::policy::UnderwritingPolicy;

/// Derived figures persisted alongside the eligibility verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EligibilitySignals {
    /// Debt-to-income ratio rounded to three decimals, or `None` when the
    /// stated income makes the ratio meaningless.
    pub dti_ratio: Option<f64>,
}

/// Financial capacity checks. The DTI ratio is recorded even when it fails
/// the threshold so the figure survives into the audit trail.
pub fn evaluate_eligibility(
    application: &LoanApplication,
    policy: &UnderwritingPolicy,
) -> (StageOutcome, EligibilitySignals) {
    let mut approved = true;
    let mut remarks = Vec::new();
    let mut dti_ratio = None;

    if application.income > 0.0 {
        let dti = (application.debt / application.income * 1000.0).round() / 1000.0;
        dti_ratio = Some(dti);
        if dti >= policy.max_dti_ratio {
            approved = false;
            remarks.push(format!(
                "High DTI ratio: {:.1}% (threshold: {:.0}%)",
                dti * 100.0,
                policy.max_dti_ratio * 100.0
            ));
        } else {
            remarks.push(format!("DTI ratio acceptable: {:.1}%", dti * 100.0));
        }
    } else {
        approved = false;
        remarks.push("Invalid income value".to_string());
    }

    if application.credit_score < policy.min_credit_score {
        approved = false;
        remarks.push(format!(
            "Credit score below minimum: {} (minimum: {})",
            application.credit_score, policy.min_credit_score
        ));
    } else if application.credit_score < policy.marginal_credit_score {
        remarks.push(format!(
            "Credit score marginal: {}",
            application.credit_score
        ));
    } else {
        remarks.push(format!("Credit score good: {}", application.credit_score));
    }

    if application.income * policy.income_multiple < application.loan_amount {
        approved = false;
        remarks.push(format!(
            "Insufficient income for loan amount (Income: ${}, Loan: ${})",
            format_amount(application.income),
            format_amount(application.loan_amount)
        ));
    } else {
        remarks.push("Income sufficient for requested loan amount".to_string());
    }

    if application.loan_amount > policy.max_loan_amount {
        approved = false;
        remarks.push(format!(
            "Loan amount exceeds maximum: ${} (max: ${})",
            format_amount(application.loan_amount),
            format_amount(policy.max_loan_amount)
        ));
    }

    if application.income < policy.min_annual_income {
        approved = false;
        remarks.push(format!(
            "Income below minimum requirement: ${} (min: ${})",
            format_amount(application.income),
            format_amount(policy.min_annual_income)
        ));
    }

    (StageOutcome { approved, remarks }, EligibilitySignals { dti_ratio })
}
