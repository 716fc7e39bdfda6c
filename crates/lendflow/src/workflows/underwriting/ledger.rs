use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, ApplicationId};

/// Audit actions recorded against an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalAction {
    StageApproved,
    FinalApproved,
    Rejected,
    AutoRejected,
}

impl ApprovalAction {
    pub const fn label(self) -> &'static str {
        match self {
            ApprovalAction::StageApproved => "STAGE_APPROVED",
            ApprovalAction::FinalApproved => "FINAL_APPROVED",
            ApprovalAction::Rejected => "REJECTED",
            ApprovalAction::AutoRejected => "AUTO_REJECTED",
        }
    }
}

/// One append-only audit record. `actor` is `None` for pipeline decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalLogEntry {
    pub application_id: ApplicationId,
    pub stage: String,
    pub action: ApprovalAction,
    pub actor: Option<Actor>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("approval ledger unavailable: {0}")]
    Unavailable(String),
}

/// Append-only decision audit trail. Entries are never updated or removed;
/// reads return the most recent entries first.
#[async_trait]
pub trait ApprovalLedger: Send + Sync {
    async fn append(&self, entry: ApprovalLogEntry) -> Result<(), LedgerError>;

    async fn entries(
        &self,
        application_id: Option<&ApplicationId>,
        limit: usize,
    ) -> Result<Vec<ApprovalLogEntry>, LedgerError>;
}
