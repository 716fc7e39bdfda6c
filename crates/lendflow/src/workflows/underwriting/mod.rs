//! Loan application underwriting workflow.
//!
//! Applications are submitted with an advisory model score attached, then
//! verified stage by stage (KYC, compliance, eligibility) either by the
//! automatic pipeline or by analysts approving one stage at a time. Every
//! decision lands in an append-only approval ledger, applicants and
//! reviewers are notified as the application moves, and a won approval
//! initiates at most one funds disbursement.

pub mod advisory;
pub mod domain;
pub mod evaluation;
pub mod ledger;
pub mod notify;
pub mod policy;
pub mod repository;
pub mod router;
pub mod screening;
pub mod service;

#[cfg(test)]
mod tests;

pub use advisory::{
    AdvisoryScore, AdvisoryScorer, HttpModelClient, ModelClient, ModelError, ModelFeatures,
    ModelPrediction, DEFAULT_MODEL_TIMEOUT,
};
pub use domain::{
    default_documents, AccountId, Actor, ApplicationId, LoanApplication, ModelDecision, Stage,
    StageRecord, Status, SubmissionRequest, WorkflowState,
};
pub use ledger::{ApprovalAction, ApprovalLedger, ApprovalLogEntry, LedgerError};
pub use notify::{
    NotificationDispatcher, NotificationDraft, NotificationId, NotificationRecord,
    NotificationStatus, NotificationStore, NotifyError, RecipientRole, ReviewerDirectory,
    FAN_OUT_LIMIT,
};
pub use policy::UnderwritingPolicy;
pub use repository::{
    ApplicationFilter, ApplicationStore, FundsError, FundsGateway, StoreError, DEFAULT_LIST_LIMIT,
};
pub use router::underwriting_router;
pub use screening::{FixedScreen, PoliticalExposureScreen, SampledScreen};
pub use service::{
    ManualApproval, PortfolioSnapshot, StageTally, UnderwritingError, UnderwritingService,
    DEFAULT_APPLICANT_LIMIT, DEFAULT_LOG_LIMIT,
};
