use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public identifier assigned to an application at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    /// Mints a `LOAN-YYYYMMDD-XXXXXXXX` identifier with an uppercase UUID prefix.
    pub fn mint(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        ApplicationId(format!("LOAN-{}-{}", now.format("%Y%m%d"), suffix))
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination account for an approved disbursement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared status vocabulary for stage records and the aggregate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    pub const fn label(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Approved => "APPROVED",
            Status::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Status::Pending),
            "APPROVED" => Some(Status::Approved),
            "REJECTED" => Some(Status::Rejected),
            _ => None,
        }
    }
}

/// Verification stages in the fixed pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Kyc,
    Compliance,
    Eligibility,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Kyc, Stage::Compliance, Stage::Eligibility];

    pub const fn label(self) -> &'static str {
        match self {
            Stage::Kyc => "KYC",
            Stage::Compliance => "Compliance",
            Stage::Eligibility => "Eligibility",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kyc" => Some(Stage::Kyc),
            "compliance" => Some(Stage::Compliance),
            "eligibility" => Some(Stage::Eligibility),
            _ => None,
        }
    }
}

/// Per-stage verification outcome as persisted on the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: Status,
    pub verified_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

impl StageRecord {
    pub fn pending() -> Self {
        Self {
            status: Status::Pending,
            verified_at: None,
            remarks: None,
        }
    }
}

impl Default for StageRecord {
    fn default() -> Self {
        Self::pending()
    }
}

/// Advisory verdict produced by the scoring model (or its fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelDecision {
    ModelApprove,
    ModelReview,
    ModelReject,
}

impl ModelDecision {
    pub const fn label(self) -> &'static str {
        match self {
            ModelDecision::ModelApprove => "MODEL_APPROVE",
            ModelDecision::ModelReview => "MODEL_REVIEW",
            ModelDecision::ModelReject => "MODEL_REJECT",
        }
    }

    /// Accepts the wire labels the scoring service is known to emit.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "MODEL_APPROVE" | "APPROVE" | "APPROVED" => Some(ModelDecision::ModelApprove),
            "MODEL_REVIEW" | "REVIEW" => Some(ModelDecision::ModelReview),
            "MODEL_REJECT" | "REJECT" | "REJECTED" => Some(ModelDecision::ModelReject),
            _ => None,
        }
    }

    /// Buckets a normalized score the same way the scoring service does.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.65 {
            ModelDecision::ModelApprove
        } else if score >= 0.45 {
            ModelDecision::ModelReview
        } else {
            ModelDecision::ModelReject
        }
    }
}

/// Analyst identity recorded against manual review actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub email: String,
    pub role: String,
}

/// The central underwriting record tracked through the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub application_id: ApplicationId,
    /// Optimistic-concurrency token; bumped by every successful store update.
    pub revision: u64,
    #[serde(rename = "name")]
    pub applicant_name: String,
    pub email: String,
    pub phone: String,
    pub region: String,
    pub country: String,
    pub income: f64,
    pub debt: f64,
    pub credit_score: u16,
    pub loan_amount: f64,
    pub loan_purpose: String,
    pub documents_uploaded: bool,
    pub documents: Vec<String>,
    pub account_id: Option<AccountId>,
    pub kyc: StageRecord,
    pub compliance: StageRecord,
    pub eligibility: StageRecord,
    pub review_status: Status,
    pub final_status: Status,
    pub final_decision_at: Option<DateTime<Utc>>,
    pub final_remarks: Option<String>,
    pub dti_ratio: Option<f64>,
    pub model_score: Option<f64>,
    pub model_decision: Option<ModelDecision>,
    pub political_connection: bool,
    pub senior_relative: bool,
    /// Finalization claim: set once when funds crediting is initiated and
    /// never reset, including by reprocess.
    pub disbursed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanApplication {
    pub fn stage(&self, stage: Stage) -> &StageRecord {
        match stage {
            Stage::Kyc => &self.kyc,
            Stage::Compliance => &self.compliance,
            Stage::Eligibility => &self.eligibility,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageRecord {
        match stage {
            Stage::Kyc => &mut self.kyc,
            Stage::Compliance => &mut self.compliance,
            Stage::Eligibility => &mut self.eligibility,
        }
    }

    /// First stage in pipeline order whose status is not APPROVED.
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.stage(*stage).status != Status::Approved)
    }

    pub fn state(&self) -> WorkflowState {
        WorkflowState::of(self)
    }
}

/// Explicit view of where an application sits in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    AwaitingKyc,
    AwaitingCompliance,
    AwaitingEligibility,
    Approved,
    Rejected,
}

impl WorkflowState {
    pub fn of(application: &LoanApplication) -> Self {
        if application.final_status == Status::Rejected
            || application.review_status == Status::Rejected
        {
            return WorkflowState::Rejected;
        }
        match application.next_stage() {
            Some(Stage::Kyc) => WorkflowState::AwaitingKyc,
            Some(Stage::Compliance) => WorkflowState::AwaitingCompliance,
            Some(Stage::Eligibility) => WorkflowState::AwaitingEligibility,
            None => WorkflowState::Approved,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Approved | WorkflowState::Rejected)
    }

    pub const fn label(self) -> &'static str {
        match self {
            WorkflowState::AwaitingKyc => "AWAITING_KYC",
            WorkflowState::AwaitingCompliance => "AWAITING_COMPLIANCE",
            WorkflowState::AwaitingEligibility => "AWAITING_ELIGIBILITY",
            WorkflowState::Approved => "APPROVED",
            WorkflowState::Rejected => "REJECTED",
        }
    }
}

/// Intake payload accepted from applicants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    #[serde(rename = "name")]
    pub applicant_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub region: String,
    pub country: String,
    pub income: f64,
    pub debt: f64,
    pub credit_score: u16,
    pub loan_amount: f64,
    #[serde(default)]
    pub loan_purpose: String,
    #[serde(default = "default_documents_uploaded")]
    pub documents_uploaded: bool,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub account_id: Option<AccountId>,
}

fn default_documents_uploaded() -> bool {
    true
}

/// Document set assumed when the applicant does not name any.
pub fn default_documents() -> Vec<String> {
    [
        "ID_Proof",
        "Income_Statement",
        "Address_Proof",
        "Bank_Statement",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
