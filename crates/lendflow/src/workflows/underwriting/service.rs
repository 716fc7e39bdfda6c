use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use super::advisory::{AdvisoryScorer, ModelFeatures};
use super::domain::{
    default_documents, Actor, ApplicationId, LoanApplication, Stage, StageRecord, Status,
    SubmissionRequest,
};
use super::evaluation::{evaluate_compliance, evaluate_eligibility, evaluate_kyc, StageOutcome};
use super::ledger::{ApprovalAction, ApprovalLedger, ApprovalLogEntry, LedgerError};
use super::notify::{
    NotificationDispatcher, NotificationId, NotificationRecord, NotifyError, RecipientRole,
};
use super::policy::UnderwritingPolicy;
use super::repository::{ApplicationFilter, ApplicationStore, FundsGateway, StoreError};
use super::screening::{PoliticalExposureScreen, SampledScreen};

/// Ledger rows returned when a query does not cap them.
pub const DEFAULT_LOG_LIMIT: usize = 200;
/// Listing cap for an applicant's own submissions.
pub const DEFAULT_APPLICANT_LIMIT: usize = 50;

const FINAL_APPROVAL_REMARKS: &str =
    "All verification checks passed. Loan application approved.";
const DEFAULT_REJECT_REASON: &str = "Application rejected during manual review";

#[derive(Debug, thiserror::Error)]
pub enum UnderwritingError {
    #[error("missing required fields: {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },
    #[error("invalid numeric values: {}", .fields.join(", "))]
    InvalidNumeric { fields: Vec<String> },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application is not pending review")]
    ReviewClosed,
    #[error("application already fully approved")]
    AlreadyApproved,
    #[error(
        "cannot approve the {} stage while {} is pending",
        .requested.label(),
        .pending.label()
    )]
    StageOrder { requested: Stage, pending: Stage },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Result of a manual approval, naming the stage that advanced.
#[derive(Debug, Clone)]
pub struct ManualApproval {
    pub application: LoanApplication,
    pub stage: Stage,
    pub fully_approved: bool,
}

/// Per-stage decision counts across the portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageTally {
    pub approved: usize,
    pub rejected: usize,
    /// Share of decided applications that passed the stage, as a percentage.
    pub pass_rate: f64,
}

/// Portfolio-level aggregates for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub total_applications: usize,
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
    pub approval_rate: f64,
    pub kyc: StageTally,
    pub compliance: StageTally,
    pub eligibility: StageTally,
    pub political_connections: usize,
    pub senior_relatives: usize,
}

impl PortfolioSnapshot {
    pub fn from_applications(applications: &[LoanApplication]) -> Self {
        let total = applications.len();
        let approved = applications
            .iter()
            .filter(|app| app.final_status == Status::Approved)
            .count();
        let rejected = applications
            .iter()
            .filter(|app| app.final_status == Status::Rejected)
            .count();
        Self {
            total_applications: total,
            approved,
            rejected,
            pending: total - approved - rejected,
            approval_rate: rate(approved, total),
            kyc: StageTally::for_stage(applications, Stage::Kyc),
            compliance: StageTally::for_stage(applications, Stage::Compliance),
            eligibility: StageTally::for_stage(applications, Stage::Eligibility),
            political_connections: applications
                .iter()
                .filter(|app| app.political_connection)
                .count(),
            senior_relatives: applications
                .iter()
                .filter(|app| app.senior_relative)
                .count(),
        }
    }
}

impl StageTally {
    fn for_stage(applications: &[LoanApplication], stage: Stage) -> Self {
        let approved = applications
            .iter()
            .filter(|app| app.stage(stage).status == Status::Approved)
            .count();
        let rejected = applications
            .iter()
            .filter(|app| app.stage(stage).status == Status::Rejected)
            .count();
        Self {
            approved,
            rejected,
            pass_rate: rate(approved, approved + rejected),
        }
    }
}

/// Percentage rounded to two decimals; zero when the base is empty.
fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Coordinates intake, staged verification, manual review, auditing,
/// notifications, and disbursement. All writes go through the store's
/// revision CAS, so two analysts acting on the same application cannot both
/// win; the loser sees a conflict and refetches.
pub struct UnderwritingService {
    store: Arc<dyn ApplicationStore>,
    ledger: Arc<dyn ApprovalLedger>,
    notifier: NotificationDispatcher,
    funds: Arc<dyn FundsGateway>,
    scorer: AdvisoryScorer,
    screen: Arc<dyn PoliticalExposureScreen>,
    policy: UnderwritingPolicy,
}

impl UnderwritingService {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        ledger: Arc<dyn ApprovalLedger>,
        notifier: NotificationDispatcher,
        funds: Arc<dyn FundsGateway>,
        policy: UnderwritingPolicy,
    ) -> Self {
        let screen = Arc::new(SampledScreen::new(policy.political_hit_rate));
        Self {
            store,
            ledger,
            notifier,
            funds,
            scorer: AdvisoryScorer::offline(),
            screen,
            policy,
        }
    }

    pub fn with_scorer(mut self, scorer: AdvisoryScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_screen(mut self, screen: Arc<dyn PoliticalExposureScreen>) -> Self {
        self.screen = screen;
        self
    }

    /// Validates and records a submission, attaches the advisory score, and
    /// fans the new-application notice out to reviewers. The record lands in
    /// PENDING review; no verification stage runs here.
    pub async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> Result<LoanApplication, UnderwritingError> {
        validate_submission(&request)?;
        let now = Utc::now();
        let dti_ratio = if request.income > 0.0 {
            request.debt / request.income
        } else {
            1.0
        };
        let advisory = self
            .scorer
            .score(&ModelFeatures {
                income: request.income,
                debt: request.debt,
                credit_score: request.credit_score,
                loan_amount: request.loan_amount,
                dti_ratio,
            })
            .await;
        let documents = if request.documents.is_empty() {
            default_documents()
        } else {
            request.documents
        };
        let application = LoanApplication {
            application_id: ApplicationId::mint(now),
            revision: 0,
            applicant_name: request.applicant_name,
            email: request.email,
            phone: request.phone,
            region: request.region.to_uppercase(),
            country: request.country,
            income: request.income,
            debt: request.debt,
            credit_score: request.credit_score,
            loan_amount: request.loan_amount,
            loan_purpose: request.loan_purpose,
            documents_uploaded: request.documents_uploaded,
            documents,
            account_id: request.account_id,
            kyc: StageRecord::pending(),
            compliance: StageRecord::pending(),
            eligibility: StageRecord::pending(),
            review_status: Status::Pending,
            final_status: Status::Pending,
            final_decision_at: None,
            final_remarks: None,
            dti_ratio: None,
            model_score: Some(advisory.score),
            model_decision: Some(advisory.decision),
            political_connection: false,
            senior_relative: false,
            disbursed: false,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.insert(application).await?;
        tracing::info!(
            application_id = %stored.application_id,
            model_decision = stored.model_decision.map_or("NONE", |decision| decision.label()),
            "loan application submitted"
        );
        self.notifier.submission_received(&stored).await?;
        Ok(stored)
    }

    /// Runs the automatic pipeline from the first pending stage. Only
    /// applications still pending review are eligible.
    pub async fn process(&self, id: &ApplicationId) -> Result<LoanApplication, UnderwritingError> {
        let application = self.fetch_required(id).await?;
        if application.review_status != Status::Pending {
            return Err(UnderwritingError::ReviewClosed);
        }
        self.run_pipeline(application).await
    }

    /// Approves the currently pending stage on the analyst's behalf. When
    /// `expected_stage` names a different stage than the pending one, the
    /// call fails without touching the application.
    pub async fn approve(
        &self,
        id: &ApplicationId,
        actor: Option<Actor>,
        expected_stage: Option<Stage>,
        notes: Option<String>,
    ) -> Result<ManualApproval, UnderwritingError> {
        let mut application = self.fetch_required(id).await?;
        if application.review_status != Status::Pending {
            return Err(UnderwritingError::ReviewClosed);
        }
        let pending = application
            .next_stage()
            .ok_or(UnderwritingError::AlreadyApproved)?;
        if let Some(requested) = expected_stage {
            if requested != pending {
                return Err(UnderwritingError::StageOrder { requested, pending });
            }
        }
        let now = Utc::now();
        let record = application.stage_mut(pending);
        record.status = Status::Approved;
        record.verified_at = Some(now);
        record.remarks = Some(format!(
            "Manually approved on {}",
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        // Approving eligibility finalizes the application; the disbursement
        // claim rides in the same write.
        let finalizes = pending == Stage::Eligibility;
        let mut claimed = false;
        if finalizes {
            application.review_status = Status::Approved;
            application.final_status = Status::Approved;
            application.final_decision_at = Some(now);
            application.final_remarks =
                Some("Approved via manual eligibility review".to_string());
            claimed = claim_disbursement(&mut application);
        }
        application.updated_at = now;
        let application = self.store.update(application).await?;
        self.ledger
            .append(ApprovalLogEntry {
                application_id: application.application_id.clone(),
                stage: pending.label().to_string(),
                action: ApprovalAction::StageApproved,
                actor: actor.clone(),
                notes,
                recorded_at: now,
            })
            .await?;
        self.notifier.stage_approved(&application, pending).await?;
        if finalizes {
            self.ledger
                .append(ApprovalLogEntry {
                    application_id: application.application_id.clone(),
                    stage: "Final Decision".to_string(),
                    action: ApprovalAction::FinalApproved,
                    actor,
                    notes: Some("Eligibility approved manually".to_string()),
                    recorded_at: now,
                })
                .await?;
            self.notifier.fully_approved(&application, claimed).await?;
            if claimed {
                self.credit_disbursement(&application).await;
            }
        }
        tracing::info!(
            application_id = %application.application_id,
            stage = pending.label(),
            "stage manually approved"
        );
        Ok(ManualApproval {
            application,
            stage: pending,
            fully_approved: finalizes,
        })
    }

    /// Rejects an application still pending review. Stages that already
    /// passed keep their APPROVED records; only the currently pending stage
    /// is marked rejected alongside the aggregate statuses.
    pub async fn reject(
        &self,
        id: &ApplicationId,
        actor: Option<Actor>,
        reason: Option<String>,
    ) -> Result<LoanApplication, UnderwritingError> {
        let mut application = self.fetch_required(id).await?;
        if application.review_status != Status::Pending {
            return Err(UnderwritingError::ReviewClosed);
        }
        let reason = reason
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string());
        let now = Utc::now();
        let pending = application.next_stage();
        if let Some(stage) = pending {
            let record = application.stage_mut(stage);
            record.status = Status::Rejected;
            record.verified_at = Some(now);
        }
        application.review_status = Status::Rejected;
        application.final_status = Status::Rejected;
        application.final_decision_at = Some(now);
        application.final_remarks = Some(reason.clone());
        application.updated_at = now;
        let application = self.store.update(application).await?;
        self.ledger
            .append(ApprovalLogEntry {
                application_id: application.application_id.clone(),
                stage: pending
                    .map(|stage| stage.label().to_string())
                    .unwrap_or_else(|| "Manual Review".to_string()),
                action: ApprovalAction::Rejected,
                actor,
                notes: Some(reason.clone()),
                recorded_at: now,
            })
            .await?;
        self.notifier.rejected(&application, &reason).await?;
        tracing::info!(application_id = %application.application_id, "application rejected");
        Ok(application)
    }

    /// Resets every stage and the aggregate decision, then reruns the
    /// pipeline. Screening flags, the advisory score, and the disbursement
    /// claim survive the reset.
    pub async fn reprocess(
        &self,
        id: &ApplicationId,
    ) -> Result<LoanApplication, UnderwritingError> {
        let mut application = self.fetch_required(id).await?;
        for stage in Stage::ALL {
            *application.stage_mut(stage) = StageRecord::pending();
        }
        application.review_status = Status::Pending;
        application.final_status = Status::Pending;
        application.final_decision_at = None;
        application.final_remarks = None;
        application.dti_ratio = None;
        application.updated_at = Utc::now();
        let application = self.store.update(application).await?;
        tracing::info!(
            application_id = %application.application_id,
            "application reset for reprocessing"
        );
        self.run_pipeline(application).await
    }

    pub async fn get(&self, id: &ApplicationId) -> Result<LoanApplication, UnderwritingError> {
        self.fetch_required(id).await
    }

    pub async fn list(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<LoanApplication>, UnderwritingError> {
        Ok(self.store.list(filter).await?)
    }

    pub async fn pending_review(
        &self,
        limit: usize,
    ) -> Result<Vec<LoanApplication>, UnderwritingError> {
        let filter = ApplicationFilter {
            review_status: Some(Status::Pending),
            limit: Some(limit),
            ..ApplicationFilter::default()
        };
        Ok(self.store.list(&filter).await?)
    }

    pub async fn list_for_applicant(
        &self,
        email: &str,
        limit: usize,
    ) -> Result<Vec<LoanApplication>, UnderwritingError> {
        Ok(self.store.list_for_applicant(email, limit).await?)
    }

    pub async fn decision_log(
        &self,
        application_id: Option<&ApplicationId>,
        limit: usize,
    ) -> Result<Vec<ApprovalLogEntry>, UnderwritingError> {
        Ok(self.ledger.entries(application_id, limit).await?)
    }

    pub async fn unread_notifications(
        &self,
        email: &str,
        role: RecipientRole,
    ) -> Result<Vec<NotificationRecord>, UnderwritingError> {
        Ok(self.notifier.unread(email, role).await?)
    }

    pub async fn mark_notifications_read(
        &self,
        ids: &[NotificationId],
    ) -> Result<usize, UnderwritingError> {
        Ok(self.notifier.mark_read(ids).await?)
    }

    pub async fn stats(&self) -> Result<PortfolioSnapshot, UnderwritingError> {
        let applications = self.store.list(&ApplicationFilter::default()).await?;
        Ok(PortfolioSnapshot::from_applications(&applications))
    }

    /// Evaluates stages in order until one fails or all pass. Every stage
    /// verdict is a separate CAS write followed by its ledger entry, so the
    /// audit trail never gets ahead of the stored record.
    async fn run_pipeline(
        &self,
        mut application: LoanApplication,
    ) -> Result<LoanApplication, UnderwritingError> {
        while let Some(stage) = application.next_stage() {
            let outcome = self.evaluate_stage(&mut application, stage);
            let now = Utc::now();
            let record = application.stage_mut(stage);
            record.verified_at = Some(now);
            record.remarks = Some(outcome.remarks_line());
            if outcome.approved {
                record.status = Status::Approved;
                application.updated_at = now;
                application = self.store.update(application).await?;
                self.ledger
                    .append(ApprovalLogEntry {
                        application_id: application.application_id.clone(),
                        stage: stage.label().to_string(),
                        action: ApprovalAction::StageApproved,
                        actor: None,
                        notes: application.stage(stage).remarks.clone(),
                        recorded_at: now,
                    })
                    .await?;
                tracing::info!(
                    application_id = %application.application_id,
                    stage = stage.label(),
                    "stage approved"
                );
            } else {
                record.status = Status::Rejected;
                application.review_status = Status::Rejected;
                application.final_status = Status::Rejected;
                application.final_decision_at = Some(now);
                let remarks = rejection_remarks(stage);
                application.final_remarks = Some(remarks.clone());
                application.updated_at = now;
                application = self.store.update(application).await?;
                self.ledger
                    .append(ApprovalLogEntry {
                        application_id: application.application_id.clone(),
                        stage: stage.label().to_string(),
                        action: ApprovalAction::AutoRejected,
                        actor: None,
                        notes: application.stage(stage).remarks.clone(),
                        recorded_at: now,
                    })
                    .await?;
                self.notifier.rejected(&application, &remarks).await?;
                tracing::info!(
                    application_id = %application.application_id,
                    stage = stage.label(),
                    "application auto-rejected"
                );
                return Ok(application);
            }
        }
        self.finalize_approval(application).await
    }

    fn evaluate_stage(&self, application: &mut LoanApplication, stage: Stage) -> StageOutcome {
        match stage {
            Stage::Kyc => evaluate_kyc(application, &self.policy),
            Stage::Compliance => {
                let flagged = self.screen.flag();
                let (outcome, signals) = evaluate_compliance(application, &self.policy, flagged);
                application.political_connection = signals.political_connection;
                application.senior_relative = signals.senior_relative;
                outcome
            }
            Stage::Eligibility => {
                let (outcome, signals) = evaluate_eligibility(application, &self.policy);
                application.dti_ratio = signals.dti_ratio;
                outcome
            }
        }
    }

    /// All stages passed: mark the final decision, claim the disbursement in
    /// the same write, then audit, notify, and credit.
    async fn finalize_approval(
        &self,
        mut application: LoanApplication,
    ) -> Result<LoanApplication, UnderwritingError> {
        let now = Utc::now();
        application.review_status = Status::Approved;
        application.final_status = Status::Approved;
        application.final_decision_at = Some(now);
        application.final_remarks = Some(FINAL_APPROVAL_REMARKS.to_string());
        let claimed = claim_disbursement(&mut application);
        application.updated_at = now;
        let application = self.store.update(application).await?;
        self.ledger
            .append(ApprovalLogEntry {
                application_id: application.application_id.clone(),
                stage: "Final Decision".to_string(),
                action: ApprovalAction::FinalApproved,
                actor: None,
                notes: application.final_remarks.clone(),
                recorded_at: now,
            })
            .await?;
        self.notifier.fully_approved(&application, claimed).await?;
        if claimed {
            self.credit_disbursement(&application).await;
        }
        tracing::info!(
            application_id = %application.application_id,
            "application fully approved"
        );
        Ok(application)
    }

    /// Credit failures are logged, not propagated: the approval stands and
    /// the claimed transfer is retried operationally.
    async fn credit_disbursement(&self, application: &LoanApplication) {
        let Some(account) = &application.account_id else {
            return;
        };
        match self.funds.credit(account, application.loan_amount).await {
            Ok(()) => {
                tracing::info!(
                    application_id = %application.application_id,
                    account_id = %account,
                    amount = application.loan_amount,
                    "disbursement initiated"
                );
            }
            Err(error) => {
                tracing::error!(
                    application_id = %application.application_id,
                    account_id = %account,
                    %error,
                    "disbursement credit failed"
                );
            }
        }
    }

    async fn fetch_required(
        &self,
        id: &ApplicationId,
    ) -> Result<LoanApplication, UnderwritingError> {
        self.store
            .fetch(id)
            .await?
            .ok_or_else(|| UnderwritingError::NotFound(id.clone()))
    }
}

/// Claims the one-shot disbursement inside the finalizing write, so a CAS
/// loser can never initiate a second credit.
fn claim_disbursement(application: &mut LoanApplication) -> bool {
    let eligible = !application.disbursed
        && application.account_id.is_some()
        && application.loan_amount > 0.0;
    if eligible {
        application.disbursed = true;
    }
    eligible
}

fn rejection_remarks(stage: Stage) -> String {
    let label = match stage {
        Stage::Kyc => "KYC",
        Stage::Compliance => "compliance",
        Stage::Eligibility => "eligibility",
    };
    format!("Application rejected at {label} stage")
}

fn validate_submission(request: &SubmissionRequest) -> Result<(), UnderwritingError> {
    let mut missing = Vec::new();
    if request.applicant_name.trim().is_empty() {
        missing.push("name".to_string());
    }
    if request.email.trim().is_empty() {
        missing.push("email".to_string());
    }
    if request.region.trim().is_empty() {
        missing.push("region".to_string());
    }
    if request.country.trim().is_empty() {
        missing.push("country".to_string());
    }
    if !missing.is_empty() {
        return Err(UnderwritingError::MissingFields { fields: missing });
    }
    let mut invalid = Vec::new();
    if !request.income.is_finite() {
        invalid.push("income".to_string());
    }
    if !request.debt.is_finite() || request.debt < 0.0 {
        invalid.push("debt".to_string());
    }
    if !request.loan_amount.is_finite() || request.loan_amount < 0.0 {
        invalid.push("loan_amount".to_string());
    }
    if !invalid.is_empty() {
        return Err(UnderwritingError::InvalidNumeric { fields: invalid });
    }
    Ok(())
}
