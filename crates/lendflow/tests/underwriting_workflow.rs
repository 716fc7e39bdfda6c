//! End-to-end journeys through the HTTP surface: intake, automatic
//! verification, manual review, rejection, and reprocessing.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{get_request, json_request, read_json_body, submission_json, test_api};

mod common {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use axum::response::Response;
    use axum::Router;
    use chrono::Utc;
    use serde_json::{json, Value};

    use lendflow::workflows::underwriting::{
        underwriting_router, ApplicationFilter, ApplicationId, ApplicationStore, ApprovalLedger,
        ApprovalLogEntry, FundsError, FundsGateway, LedgerError, LoanApplication,
        NotificationDispatcher, NotificationDraft, NotificationId, NotificationRecord,
        NotificationStatus, NotificationStore, NotifyError, RecipientRole, ReviewerDirectory,
        StoreError, UnderwritingPolicy, UnderwritingService,
    };
    use lendflow::workflows::underwriting::{AccountId, FixedScreen};

    pub struct SharedStore {
        applications: Mutex<HashMap<ApplicationId, LoanApplication>>,
    }

    #[async_trait]
    impl ApplicationStore for SharedStore {
        async fn insert(
            &self,
            application: LoanApplication,
        ) -> Result<LoanApplication, StoreError> {
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

        async fn list(
            &self,
            filter: &ApplicationFilter,
        ) -> Result<Vec<LoanApplication>, StoreError> {
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
    pub struct SharedLedger {
        entries: Mutex<Vec<ApprovalLogEntry>>,
    }

    #[async_trait]
    impl ApprovalLedger for SharedLedger {
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
    pub struct SharedNotifications {
        records: Mutex<Vec<NotificationRecord>>,
        next_id: AtomicU64,
    }

    #[async_trait]
    impl NotificationStore for SharedNotifications {
        async fn insert(
            &self,
            draft: NotificationDraft,
        ) -> Result<NotificationRecord, NotifyError> {
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

    pub struct Reviewers(Vec<String>);

    impl ReviewerDirectory for Reviewers {
        fn reviewer_emails(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    pub struct RecordingFunds {
        credits: Mutex<Vec<(AccountId, f64)>>,
    }

    impl RecordingFunds {
        pub fn credited(&self) -> Vec<(AccountId, f64)> {
            self.credits.lock().expect("funds mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl FundsGateway for RecordingFunds {
        async fn credit(&self, account: &AccountId, amount: f64) -> Result<(), FundsError> {
            self.credits
                .lock()
                .expect("funds mutex poisoned")
                .push((account.clone(), amount));
            Ok(())
        }
    }

    pub struct TestApi {
        pub router: Router,
        pub funds: Arc<RecordingFunds>,
    }

    pub fn test_api() -> TestApi {
        let store = Arc::new(SharedStore {
            applications: Mutex::new(HashMap::new()),
        });
        let ledger = Arc::new(SharedLedger::default());
        let notifications = Arc::new(SharedNotifications::default());
        let funds = Arc::new(RecordingFunds {
            credits: Mutex::new(Vec::new()),
        });
        let reviewers = Arc::new(Reviewers(vec!["maya.review@lendflow.dev".to_string()]));
        let dispatcher = NotificationDispatcher::new(notifications, reviewers);
        let service = UnderwritingService::new(
            store,
            ledger,
            dispatcher,
            funds.clone(),
            UnderwritingPolicy::default(),
        )
        .with_screen(Arc::new(FixedScreen(false)));
        TestApi {
            router: underwriting_router(Arc::new(service)),
            funds,
        }
    }

    pub fn submission_json(email: &str, income: f64, loan_amount: f64) -> Value {
        json!({
            "name": "Avery Collins",
            "email": email,
            "phone": "+1-415-555-0100",
            "region": "NA",
            "country": "Freedonia",
            "income": income,
            "debt": 20000.0,
            "credit_score": 750,
            "loan_amount": loan_amount,
            "loan_purpose": "Working capital",
            "account_id": "ACC-9044"
        })
    }

    pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    pub fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    pub async fn read_json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body reads");
        serde_json::from_slice(&bytes).expect("body is json")
    }
}

async fn submit(api: &common::TestApi, payload: Value) -> String {
    use tower::ServiceExt;

    let response = api
        .router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/loan-applications",
            payload,
        ))
        .await
        .expect("request succeeds");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    body["application"]["application_id"]
        .as_str()
        .expect("id present")
        .to_string()
}

async fn call(api: &common::TestApi, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
    use tower::ServiceExt;

    let request = if method == Method::GET {
        get_request(uri)
    } else {
        json_request(method, uri, body)
    };
    let response = api
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("request succeeds");
    let status = response.status();
    (status, read_json_body(response).await)
}

#[tokio::test]
async fn automatic_pipeline_approves_audits_and_disburses() {
    let api = test_api();
    let id = submit(
        &api,
        submission_json("avery.collins@example.com", 100_000.0, 200_000.0),
    )
    .await;

    // Reprocessing a fresh application runs the pipeline from the start.
    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/v1/loan-applications/{id}/reprocess"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Application reprocessed successfully");
    assert_eq!(body["application"]["final_status"], "APPROVED");

    let (status, application) = call(
        &api,
        Method::GET,
        &format!("/api/v1/loan-applications/{id}"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(application["kyc"]["status"], "APPROVED");
    assert_eq!(application["compliance"]["status"], "APPROVED");
    assert_eq!(application["eligibility"]["status"], "APPROVED");
    assert_eq!(application["dti_ratio"], json!(0.2));
    assert_eq!(
        application["final_remarks"],
        "All verification checks passed. Loan application approved."
    );

    let (_, log) = call(
        &api,
        Method::GET,
        &format!("/api/v1/approval-log?application_id={id}"),
        json!({}),
    )
    .await;
    let actions: Vec<&str> = log["logs"]
        .as_array()
        .expect("logs present")
        .iter()
        .map(|entry| entry["action"].as_str().expect("action present"))
        .collect();
    assert_eq!(
        actions,
        vec![
            "FINAL_APPROVED",
            "STAGE_APPROVED",
            "STAGE_APPROVED",
            "STAGE_APPROVED",
        ]
    );

    let credits = api.funds.credited();
    assert_eq!(credits.len(), 1);
    assert_eq!(credits[0].1, 200_000.0);

    // Reprocessing an approved application reruns checks but never pays twice.
    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/v1/loan-applications/{id}/reprocess"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application"]["final_status"], "APPROVED");
    assert_eq!(api.funds.credited().len(), 1);

    let (_, overview) = call(&api, Method::GET, "/api/v1/dashboard/overview", json!({})).await;
    assert_eq!(overview["total_applications"], 1);
    assert_eq!(overview["approved"], 1);
    assert_eq!(overview["approval_rate"], json!(100.0));
}

#[tokio::test]
async fn manual_review_walks_stages_and_notifies_the_applicant() {
    let api = test_api();
    let id = submit(
        &api,
        submission_json("dana.osei@example.com", 100_000.0, 200_000.0),
    )
    .await;
    let approve_uri = format!("/api/v1/loan-applications/{id}/approve");
    let actor = json!({"email": "priya.shah@lendflow.dev", "role": "REVIEWER"});

    let (_, reviewer_inbox) = call(
        &api,
        Method::GET,
        "/api/v1/notifications?email=maya.review@lendflow.dev&role=REVIEWER",
        json!({}),
    )
    .await;
    assert_eq!(
        reviewer_inbox["notifications"].as_array().map(Vec::len),
        Some(1)
    );

    for expected in ["KYC stage approved", "Compliance stage approved"] {
        let (status, body) = call(
            &api,
            Method::POST,
            &approve_uri,
            json!({"actor": actor, "notes": "Reviewed"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], expected);
    }

    let (status, body) = call(
        &api,
        Method::POST,
        &approve_uri,
        json!({"actor": actor, "stage": "eligibility"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Application fully approved");
    assert_eq!(
        body["application"]["final_remarks"],
        "Approved via manual eligibility review"
    );

    let (_, applicant_inbox) = call(
        &api,
        Method::GET,
        "/api/v1/notifications?email=dana.osei@example.com&role=APPLICANT",
        json!({}),
    )
    .await;
    let messages: Vec<&str> = applicant_inbox["notifications"]
        .as_array()
        .expect("notifications present")
        .iter()
        .map(|record| record["message"].as_str().expect("message present"))
        .collect();
    assert_eq!(messages.len(), 4);
    assert!(messages
        .iter()
        .any(|message| message.starts_with("Loan application") && message.contains("fully approved")));

    // A fourth approval has nothing left to act on.
    let (status, body) = call(
        &api,
        Method::POST,
        &approve_uri,
        json!({"actor": actor}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Application is not pending review");
}

#[tokio::test]
async fn rejected_applications_can_be_reprocessed_after_appeal() {
    let api = test_api();
    let id = submit(
        &api,
        submission_json("ines.duarte@example.com", 100_000.0, 200_000.0),
    )
    .await;

    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/v1/loan-applications/{id}/reject"),
        json!({
            "actor": {"email": "priya.shah@lendflow.dev", "role": "REVIEWER"},
            "reason": "Employer could not be reached"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Application rejected");
    assert_eq!(body["application"]["review_status"], "REJECTED");
    assert_eq!(
        body["application"]["final_remarks"],
        "Employer could not be reached"
    );

    let (status, body) = call(
        &api,
        Method::POST,
        &format!("/api/v1/loan-applications/{id}/reprocess"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application"]["final_status"], "APPROVED");
    assert_eq!(body["application"]["review_status"], "APPROVED");

    let (_, listed) = call(
        &api,
        Method::GET,
        "/api/v1/loan-applications?review_status=APPROVED",
        json!({}),
    )
    .await;
    assert_eq!(listed["total"], 1);
}
