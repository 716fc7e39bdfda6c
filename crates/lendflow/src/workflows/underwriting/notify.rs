use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, TryStreamExt};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, LoanApplication, Stage};

/// Upper bound on concurrent reviewer notification writes.
pub const FAN_OUT_LIMIT: usize = 8;

/// Store-assigned notification identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Unread,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientRole {
    Reviewer,
    Applicant,
}

impl RecipientRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "REVIEWER" => Some(RecipientRole::Reviewer),
            "APPLICANT" => Some(RecipientRole::Applicant),
            _ => None,
        }
    }
}

/// Notification as stored; the store assigns the id, status, and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub recipient_email: String,
    pub role: RecipientRole,
    pub application_id: ApplicationId,
    pub message: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
}

/// Notification content handed to the store for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub recipient_email: String,
    pub role: RecipientRole,
    pub application_id: ApplicationId,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence seam for notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, draft: NotificationDraft) -> Result<NotificationRecord, NotifyError>;

    /// Unread notifications for one recipient, most recent first.
    async fn unread_for(
        &self,
        email: &str,
        role: RecipientRole,
    ) -> Result<Vec<NotificationRecord>, NotifyError>;

    /// Marks the given notifications read, returning how many changed.
    /// Already-read ids are counted as changed only once.
    async fn mark_read(&self, ids: &[NotificationId]) -> Result<usize, NotifyError>;
}

/// Source of the reviewer list for submission fan-out.
pub trait ReviewerDirectory: Send + Sync {
    fn reviewer_emails(&self) -> Vec<String>;
}

/// Composes workflow notifications and writes them through the store.
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    reviewers: Arc<dyn ReviewerDirectory>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, reviewers: Arc<dyn ReviewerDirectory>) -> Self {
        Self { store, reviewers }
    }

    /// Fans a new-submission notice out to every reviewer, at most
    /// [`FAN_OUT_LIMIT`] writes in flight at a time.
    pub async fn submission_received(
        &self,
        application: &LoanApplication,
    ) -> Result<(), NotifyError> {
        let message = format!(
            "New loan application {} from {} awaiting review",
            application.application_id, application.applicant_name
        );
        let recipients = self.reviewers.reviewer_emails();
        stream::iter(recipients.into_iter().map(Ok::<_, NotifyError>))
            .try_for_each_concurrent(FAN_OUT_LIMIT, |email| {
                let store = Arc::clone(&self.store);
                let draft = NotificationDraft {
                    recipient_email: email,
                    role: RecipientRole::Reviewer,
                    application_id: application.application_id.clone(),
                    message: message.clone(),
                };
                async move { store.insert(draft).await.map(|_| ()) }
            })
            .await
    }

    pub async fn stage_approved(
        &self,
        application: &LoanApplication,
        stage: Stage,
    ) -> Result<(), NotifyError> {
        let message = format!(
            "{} stage approved for application {}",
            stage.label(),
            application.application_id
        );
        self.to_applicant(application, message).await
    }

    pub async fn fully_approved(
        &self,
        application: &LoanApplication,
        disbursement_initiated: bool,
    ) -> Result<(), NotifyError> {
        let mut message = format!(
            "Loan application {} fully approved",
            application.application_id
        );
        if disbursement_initiated {
            message.push_str("; funds disbursement initiated");
        }
        self.to_applicant(application, message).await
    }

    pub async fn rejected(
        &self,
        application: &LoanApplication,
        reason: &str,
    ) -> Result<(), NotifyError> {
        self.to_applicant(application, reason.to_string()).await
    }

    pub async fn unread(
        &self,
        email: &str,
        role: RecipientRole,
    ) -> Result<Vec<NotificationRecord>, NotifyError> {
        self.store.unread_for(email, role).await
    }

    /// No-op on an empty id list.
    pub async fn mark_read(&self, ids: &[NotificationId]) -> Result<usize, NotifyError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.mark_read(ids).await
    }

    async fn to_applicant(
        &self,
        application: &LoanApplication,
        message: String,
    ) -> Result<(), NotifyError> {
        self.store
            .insert(NotificationDraft {
                recipient_email: application.email.clone(),
                role: RecipientRole::Applicant,
                application_id: application.application_id.clone(),
                message,
            })
            .await
            .map(|_| ())
    }
}
