use async_trait::async_trait;
use chrono::Utc;
use lendflow::workflows::underwriting::{
    AccountId, ApplicationFilter, ApplicationId, ApplicationStore, ApprovalLedger,
    ApprovalLogEntry, FundsError, FundsGateway, LedgerError, LoanApplication, NotificationDraft,
    NotificationId, NotificationRecord, NotificationStatus, NotificationStore, NotifyError,
    RecipientRole, ReviewerDirectory, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationStore {
    records: Arc<Mutex<HashMap<ApplicationId, LoanApplication>>>,
}

#[async_trait]
impl ApplicationStore for InMemoryApplicationStore {
    async fn insert(&self, application: LoanApplication) -> Result<LoanApplication, StoreError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.application_id) {
            return Err(StoreError::Conflict);
        }
        guard.insert(application.application_id.clone(), application.clone());
        Ok(application)
    }

    async fn update(
        &self,
        mut application: LoanApplication,
    ) -> Result<LoanApplication, StoreError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard
            .get_mut(&application.application_id)
            .ok_or(StoreError::NotFound)?;
        if stored.revision != application.revision {
            return Err(StoreError::Conflict);
        }
        application.revision += 1;
        *stored = application.clone();
        Ok(application)
    }

    async fn fetch(&self, id: &ApplicationId) -> Result<Option<LoanApplication>, StoreError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<LoanApplication>, StoreError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut rows: Vec<LoanApplication> = guard
            .values()
            .filter(|app| {
                filter
                    .final_status
                    .map_or(true, |status| app.final_status == status)
            })
            .filter(|app| {
                filter
                    .review_status
                    .map_or(true, |status| app.review_status == status)
            })
            .filter(|app| {
                filter
                    .region
                    .as_deref()
                    .map_or(true, |region| app.region == region)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn list_for_applicant(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<LoanApplication>, StoreError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut rows: Vec<LoanApplication> = guard
            .values()
            .filter(|app| app.email == email)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApprovalLedger {
    entries: Arc<Mutex<Vec<ApprovalLogEntry>>>,
}

#[async_trait]
impl ApprovalLedger for InMemoryApprovalLedger {
    async fn append(&self, entry: ApprovalLogEntry) -> Result<(), LedgerError> {
        let mut guard = self.entries.lock().expect("ledger mutex poisoned");
        guard.push(entry);
        Ok(())
    }

    async fn entries(
        &self,
        application_id: Option<&ApplicationId>,
        limit: usize,
    ) -> Result<Vec<ApprovalLogEntry>, LedgerError> {
        let guard = self.entries.lock().expect("ledger mutex poisoned");
        let mut rows: Vec<ApprovalLogEntry> = guard
            .iter()
            .filter(|entry| application_id.map_or(true, |id| entry.application_id == *id))
            .cloned()
            .collect();
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationStore {
    records: Arc<Mutex<Vec<NotificationRecord>>>,
    next_id: Arc<AtomicU64>,
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, draft: NotificationDraft) -> Result<NotificationRecord, NotifyError> {
        let record = NotificationRecord {
            id: NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            recipient_email: draft.recipient_email,
            role: draft.role,
            application_id: draft.application_id,
            message: draft.message,
            status: NotificationStatus::Unread,
            created_at: Utc::now(),
        };
        let mut guard = self.records.lock().expect("notification mutex poisoned");
        guard.push(record.clone());
        Ok(record)
    }

    async fn unread_for(
        &self,
        email: &str,
        role: RecipientRole,
    ) -> Result<Vec<NotificationRecord>, NotifyError> {
        let guard = self.records.lock().expect("notification mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|record| {
                record.recipient_email == email
                    && record.role == role
                    && record.status == NotificationStatus::Unread
            })
            .cloned()
            .collect())
    }

    async fn mark_read(&self, ids: &[NotificationId]) -> Result<usize, NotifyError> {
        let mut guard = self.records.lock().expect("notification mutex poisoned");
        let mut updated = 0;
        for record in guard.iter_mut() {
            if ids.contains(&record.id) && record.status != NotificationStatus::Read {
                record.status = NotificationStatus::Read;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

pub(crate) struct StaticReviewerDirectory {
    emails: Vec<String>,
}

impl StaticReviewerDirectory {
    pub(crate) fn new(emails: Vec<String>) -> Self {
        Self { emails }
    }
}

impl ReviewerDirectory for StaticReviewerDirectory {
    fn reviewer_emails(&self) -> Vec<String> {
        self.emails.clone()
    }
}

/// Records credits instead of moving money; the demo and local serve mode
/// run against this gateway.
#[derive(Default, Clone)]
pub(crate) struct InMemoryFundsGateway {
    credits: Arc<Mutex<Vec<(AccountId, f64)>>>,
}

impl InMemoryFundsGateway {
    pub(crate) fn credits(&self) -> Vec<(AccountId, f64)> {
        self.credits.lock().expect("funds mutex poisoned").clone()
    }
}

#[async_trait]
impl FundsGateway for InMemoryFundsGateway {
    async fn credit(&self, account: &AccountId, amount: f64) -> Result<(), FundsError> {
        let mut guard = self.credits.lock().expect("funds mutex poisoned");
        guard.push((account.clone(), amount));
        Ok(())
    }
}
