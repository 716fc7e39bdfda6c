use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::workflows::underwriting::advisory::{
    ModelClient, ModelError, ModelFeatures, ModelPrediction,
};
use crate::workflows::underwriting::domain::{
    AccountId, ApplicationId, LoanApplication, StageRecord, Status, SubmissionRequest,
};
use crate::workflows::underwriting::ledger::{ApprovalLedger, ApprovalLogEntry, LedgerError};
use crate::workflows::underwriting::notify::{
    NotificationDispatcher, NotificationDraft, NotificationId, NotificationRecord,
    NotificationStatus, NotificationStore, NotifyError, RecipientRole, ReviewerDirectory,
};
use crate::workflows::underwriting::policy::UnderwritingPolicy;
use crate::workflows::underwriting::repository::{
    ApplicationFilter, ApplicationStore, FundsError, FundsGateway, StoreError,
};
use crate::workflows::underwriting::screening::FixedScreen;
use crate::workflows::underwriting::service::UnderwritingService;

pub(super) const REVIEWERS: [&str; 2] = ["maya.review@lendflow.dev", "omar.review@lendflow.dev"];

pub(super) struct InMemoryStore {
    applications: Mutex<HashMap<ApplicationId, LoanApplication>>,
}

impl InMemoryStore {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self {
            applications: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl ApplicationStore for InMemoryStore {
    async fn insert(&self, application: LoanApplication) -> Result<LoanApplication, StoreError> {
        let mut applications = self.applications.lock().expect("store mutex poisoned");
        if applications.contains_key(&application.application_id) {
            return Err(StoreError::Conflict);
        }
        applications.insert(application.application_id.clone(), application.clone());
        Ok(application)
    }

    async fn update(
        &self,
        mut application: LoanApplication,
    ) -> Result<LoanApplication, StoreError> {
        let mut applications = self.applications.lock().expect("store mutex poisoned");
        let stored = applications
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
        let applications = self.applications.lock().expect("store mutex poisoned");
        Ok(applications.get(id).cloned())
    }

    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<LoanApplication>, StoreError> {
        let applications = self.applications.lock().expect("store mutex poisoned");
        let mut rows: Vec<LoanApplication> = applications
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
        let applications = self.applications.lock().expect("store mutex poisoned");
        let mut rows: Vec<LoanApplication> = applications
            .values()
            .filter(|app| app.email == email)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}

#[derive(Default)]
pub(super) struct InMemoryLedger {
    entries: Mutex<Vec<ApprovalLogEntry>>,
}

impl InMemoryLedger {
    pub(super) fn recorded(&self) -> Vec<ApprovalLogEntry> {
        self.entries.lock().expect("ledger mutex poisoned").clone()
    }
}

#[async_trait]
impl ApprovalLedger for InMemoryLedger {
    async fn append(&self, entry: ApprovalLogEntry) -> Result<(), LedgerError> {
        self.entries
            .lock()
            .expect("ledger mutex poisoned")
            .push(entry);
        Ok(())
    }

    async fn entries(
        &self,
        application_id: Option<&ApplicationId>,
        limit: usize,
    ) -> Result<Vec<ApprovalLogEntry>, LedgerError> {
        let entries = self.entries.lock().expect("ledger mutex poisoned");
        let mut rows: Vec<ApprovalLogEntry> = entries
            .iter()
            .filter(|entry| application_id.map_or(true, |id| entry.application_id == *id))
            .cloned()
            .collect();
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }
}

#[derive(Default)]
pub(super) struct InMemoryNotifications {
    records: Mutex<Vec<NotificationRecord>>,
    next_id: AtomicU64,
}

impl InMemoryNotifications {
    pub(super) fn all(&self) -> Vec<NotificationRecord> {
        self.records
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotifications {
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
        self.records
            .lock()
            .expect("notification mutex poisoned")
            .push(record.clone());
        Ok(record)
    }

    async fn unread_for(
        &self,
        email: &str,
        role: RecipientRole,
    ) -> Result<Vec<NotificationRecord>, NotifyError> {
        let records = self.records.lock().expect("notification mutex poisoned");
        Ok(records
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
        let mut records = self.records.lock().expect("notification mutex poisoned");
        let mut updated = 0;
        for record in records.iter_mut() {
            if ids.contains(&record.id) && record.status != NotificationStatus::Read {
                record.status = NotificationStatus::Read;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

pub(super) struct StaticReviewers(pub(super) Vec<String>);

impl ReviewerDirectory for StaticReviewers {
    fn reviewer_emails(&self) -> Vec<String> {
        self.0.clone()
    }
}

pub(super) struct RecordingFunds {
    credits: Mutex<Vec<(AccountId, f64)>>,
    fail: bool,
}

impl RecordingFunds {
    pub(super) fn new(fail: bool) -> Self {
        Self {
            credits: Mutex::new(Vec::new()),
            fail,
        }
    }

    pub(super) fn credited(&self) -> Vec<(AccountId, f64)> {
        self.credits.lock().expect("funds mutex poisoned").clone()
    }
}

#[async_trait]
impl FundsGateway for RecordingFunds {
    async fn credit(&self, account: &AccountId, amount: f64) -> Result<(), FundsError> {
        if self.fail {
            return Err(FundsError::Unavailable("gateway offline".to_string()));
        }
        self.credits
            .lock()
            .expect("funds mutex poisoned")
            .push((account.clone(), amount));
        Ok(())
    }
}

pub(super) struct CannedModel(pub(super) ModelPrediction);

#[async_trait]
impl ModelClient for CannedModel {
    async fn predict(&self, _features: &ModelFeatures) -> Result<ModelPrediction, ModelError> {
        Ok(self.0.clone())
    }
}

pub(super) struct FailingModel;

#[async_trait]
impl ModelClient for FailingModel {
    async fn predict(&self, _features: &ModelFeatures) -> Result<ModelPrediction, ModelError> {
        Err(ModelError::Transport("connection refused".to_string()))
    }
}

pub(super) struct SlowModel {
    pub(super) delay: Duration,
    pub(super) prediction: ModelPrediction,
}

#[async_trait]
impl ModelClient for SlowModel {
    async fn predict(&self, _features: &ModelFeatures) -> Result<ModelPrediction, ModelError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.prediction.clone())
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<UnderwritingService>,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) ledger: Arc<InMemoryLedger>,
    pub(super) notifications: Arc<InMemoryNotifications>,
    pub(super) funds: Arc<RecordingFunds>,
}

pub(super) fn harness() -> Harness {
    build_harness(false, false)
}

pub(super) fn harness_flagged() -> Harness {
    build_harness(true, false)
}

pub(super) fn harness_with_failing_funds() -> Harness {
    build_harness(false, true)
}

fn build_harness(political_flag: bool, funds_fail: bool) -> Harness {
    let store = InMemoryStore::new();
    let ledger = Arc::new(InMemoryLedger::default());
    let notifications = Arc::new(InMemoryNotifications::default());
    let funds = Arc::new(RecordingFunds::new(funds_fail));
    let reviewers = Arc::new(StaticReviewers(
        REVIEWERS.iter().map(|email| email.to_string()).collect(),
    ));
    let dispatcher = NotificationDispatcher::new(notifications.clone(), reviewers);
    let service = UnderwritingService::new(
        store.clone(),
        ledger.clone(),
        dispatcher,
        funds.clone(),
        UnderwritingPolicy::default(),
    )
    .with_screen(Arc::new(FixedScreen(political_flag)));
    Harness {
        service: Arc::new(service),
        store,
        ledger,
        notifications,
        funds,
    }
}

/// Submission that clears every stage under the default policy.
pub(super) fn clean_submission() -> SubmissionRequest {
    SubmissionRequest {
        applicant_name: "Avery Collins".to_string(),
        email: "avery.collins@example.com".to_string(),
        phone: "+1-415-555-0100".to_string(),
        region: "na".to_string(),
        country: "Freedonia".to_string(),
        income: 100_000.0,
        debt: 20_000.0,
        credit_score: 750,
        loan_amount: 200_000.0,
        loan_purpose: "Home renovation".to_string(),
        documents_uploaded: true,
        documents: Vec::new(),
        account_id: Some(AccountId("ACC-2210".to_string())),
    }
}

/// Clears KYC and compliance but fails the income-sufficiency check.
pub(super) fn insufficient_income_submission() -> SubmissionRequest {
    SubmissionRequest {
        applicant_name: "Rowan Pike".to_string(),
        email: "rowan.pike@example.com".to_string(),
        phone: String::new(),
        region: "EU".to_string(),
        country: "Freedonia".to_string(),
        income: 75_000.0,
        debt: 25_000.0,
        credit_score: 720,
        loan_amount: 250_000.0,
        loan_purpose: String::new(),
        documents_uploaded: true,
        documents: Vec::new(),
        account_id: None,
    }
}

/// Bare application for exercising evaluators directly.
pub(super) fn application() -> LoanApplication {
    let now = Utc::now();
    LoanApplication {
        application_id: ApplicationId("LOAN-20260801-ABCD1234".to_string()),
        revision: 0,
        applicant_name: "Avery Collins".to_string(),
        email: "avery.collins@example.com".to_string(),
        phone: "+1-415-555-0100".to_string(),
        region: "NA".to_string(),
        country: "Freedonia".to_string(),
        income: 100_000.0,
        debt: 20_000.0,
        credit_score: 750,
        loan_amount: 200_000.0,
        loan_purpose: "Home renovation".to_string(),
        documents_uploaded: true,
        documents: crate::workflows::underwriting::domain::default_documents(),
        account_id: Some(AccountId("ACC-2210".to_string())),
        kyc: StageRecord::pending(),
        compliance: StageRecord::pending(),
        eligibility: StageRecord::pending(),
        review_status: Status::Pending,
        final_status: Status::Pending,
        final_decision_at: None,
        final_remarks: None,
        dti_ratio: None,
        model_score: None,
        model_decision: None,
        political_connection: false,
        senior_relative: false,
        disbursed: false,
        created_at: now,
        updated_at: now,
    }
}
