use async_trait::async_trait;

use super::domain::{AccountId, ApplicationId, LoanApplication, Status};

/// Listing cap applied when a query does not name one.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Listing filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub final_status: Option<Status>,
    pub review_status: Option<Status>,
    pub region: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The revision on a write did not match the stored record.
    #[error("stale application revision")]
    Conflict,
    #[error("application not found")]
    NotFound,
    #[error("application store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for applications.
///
/// `update` is compare-and-swap on `revision`: the write applies only when
/// the caller's revision matches the stored one, and the store bumps the
/// revision on success. Concurrent writers lose with [`StoreError::Conflict`]
/// and are expected to refetch and retry.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts a new application; an existing id is a [`StoreError::Conflict`].
    async fn insert(&self, application: LoanApplication) -> Result<LoanApplication, StoreError>;

    async fn update(&self, application: LoanApplication) -> Result<LoanApplication, StoreError>;

    async fn fetch(&self, id: &ApplicationId) -> Result<Option<LoanApplication>, StoreError>;

    /// Matching applications, most recently submitted first.
    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<LoanApplication>, StoreError>;

    /// Applications submitted under the given email, most recent first.
    async fn list_for_applicant(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<LoanApplication>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FundsError {
    #[error("funds gateway unavailable: {0}")]
    Unavailable(String),
}

/// Disbursement seam. Crediting is assumed idempotent per application on the
/// gateway side; the workflow additionally guards with a one-shot claim.
#[async_trait]
pub trait FundsGateway: Send + Sync {
    async fn credit(&self, account: &AccountId, amount: f64) -> Result<(), FundsError>;
}
