use super::{format_amount, StageOutcome};
use crate::workflows::underwriting::domain::LoanApplication;
use crate::workflows::underwriting::policy::UnderwritingPolicy;

/// Flags raised during compliance screening, persisted on the application
/// so reviewers can see them after the stage record is overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceSignals {
    pub political_connection: bool,
    pub senior_relative: bool,
}

/// Sanctions and exposure checks. The political-exposure flag comes from the
/// screening provider; everything else derives from the application itself.
pub fn evaluate_compliance(
    application: &LoanApplication,
    policy: &UnderwritingPolicy,
    political_connection: bool,
) -> (StageOutcome, ComplianceSignals) {
    let mut approved = true;
    let mut remarks = Vec::new();

    if political_connection {
        approved = false;
        remarks.push("Political connection detected - requires manual review".to_string());
    } else {
        remarks.push("No political connections found".to_string());
    }

    let name = application.applicant_name.to_lowercase();
    let senior_relative = policy
        .senior_relative_markers
        .iter()
        .any(|marker| name.contains(marker.as_str()));
    if senior_relative {
        approved = false;
        remarks.push("Potential senior employee relative - requires verification".to_string());
    } else {
        remarks.push("No senior employee relation detected".to_string());
    }

    let domain = application
        .email
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if policy.sanctioned_domains.iter().any(|d| *d == domain) {
        approved = false;
        remarks.push(format!("Email domain on sanctions list: {domain}"));
    } else {
        remarks.push("Email domain cleared".to_string());
    }

    if policy
        .high_risk_countries
        .iter()
        .any(|country| *country == application.country)
    {
        approved = false;
        remarks.push(format!("High-risk country: {}", application.country));
    } else {
        remarks.push("Country risk assessment: CLEAR".to_string());
    }

    // Informational only: a large loan triggers enhanced due diligence but
    // does not fail the stage.
    if application.loan_amount > policy.enhanced_diligence_threshold {
        remarks.push(format!(
            "High-value transaction (${}) - enhanced due diligence required",
            format_amount(application.loan_amount)
        ));
    }

    let signals = ComplianceSignals {
        political_connection,
        senior_relative,
    };
    (StageOutcome { approved, remarks }, signals)
}
