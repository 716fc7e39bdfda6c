use super::StageOutcome;
use crate::workflows::underwriting::domain::LoanApplication;
use crate::workflows::underwriting::policy::UnderwritingPolicy;

/// Identity and document checks. All five run regardless of earlier failures
/// so the remarks cover the full picture for the analyst.
pub fn evaluate_kyc(application: &LoanApplication, policy: &UnderwritingPolicy) -> StageOutcome {
    let mut approved = true;
    let mut remarks = Vec::new();

    if application.email.contains('@') && application.email.contains('.') {
        remarks.push("Email format valid".to_string());
    } else {
        approved = false;
        remarks.push("Invalid email format".to_string());
    }

    // A missing phone number is acceptable; a present one must carry at
    // least ten digits.
    let digits = application
        .phone
        .chars()
        .filter(|ch| ch.is_ascii_digit())
        .count();
    if !application.phone.is_empty() && digits < 10 {
        approved = false;
        remarks.push("Phone number too short".to_string());
    } else {
        remarks.push("Phone number valid".to_string());
    }

    if application.documents_uploaded {
        remarks.push("Documents uploaded and verified".to_string());
    } else {
        approved = false;
        remarks.push("Required documents not uploaded".to_string());
    }

    if application.applicant_name.trim().len() >= 3 {
        remarks.push("Name verified".to_string());
    } else {
        approved = false;
        remarks.push("Invalid name".to_string());
    }

    let region_known = policy
        .approved_regions
        .iter()
        .any(|region| region.eq_ignore_ascii_case(&application.region));
    if region_known {
        remarks.push(format!("Region verified: {}", application.region));
    } else {
        approved = false;
        remarks.push(format!("Invalid region: {}", application.region));
    }

    StageOutcome { approved, remarks }
}
