use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::domain::{Actor, ApplicationId, Stage, Status};
use super::ledger::ApprovalLogEntry;
use super::notify::{NotificationId, RecipientRole};
use super::repository::{ApplicationFilter, StoreError, DEFAULT_LIST_LIMIT};
use super::service::{
    UnderwritingError, UnderwritingService, DEFAULT_APPLICANT_LIMIT, DEFAULT_LOG_LIMIT,
};

/// HTTP surface for the underwriting workflow.
pub fn underwriting_router(service: Arc<UnderwritingService>) -> Router {
    Router::new()
        .route(
            "/api/v1/loan-applications",
            post(submit_application).get(list_applications),
        )
        .route(
            "/api/v1/loan-applications/pending",
            get(pending_applications),
        )
        .route("/api/v1/loan-applications/:id", get(get_application))
        .route(
            "/api/v1/loan-applications/:id/approve",
            post(approve_application),
        )
        .route(
            "/api/v1/loan-applications/:id/reject",
            post(reject_application),
        )
        .route(
            "/api/v1/loan-applications/:id/reprocess",
            post(reprocess_application),
        )
        .route("/api/v1/approval-log", get(approval_log))
        .route("/api/v1/notifications", get(list_notifications))
        .route("/api/v1/notifications/read", post(mark_notifications_read))
        .route("/api/v1/dashboard/overview", get(dashboard_overview))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    pub(crate) status: Option<String>,
    pub(crate) review_status: Option<String>,
    pub(crate) region: Option<String>,
    pub(crate) applicant: Option<String>,
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PendingQuery {
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApproveRequest {
    pub(crate) actor: Option<Actor>,
    pub(crate) stage: Option<String>,
    pub(crate) notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RejectRequest {
    pub(crate) actor: Option<Actor>,
    pub(crate) reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalLogQuery {
    pub(crate) application_id: Option<String>,
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationsQuery {
    pub(crate) email: Option<String>,
    pub(crate) role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarkReadRequest {
    #[serde(default)]
    pub(crate) ids: Vec<u64>,
}

pub(crate) async fn submit_application(
    State(service): State<Arc<UnderwritingService>>,
    Json(payload): Json<super::domain::SubmissionRequest>,
) -> Response {
    match service.submit(payload).await {
        Ok(application) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Loan application submitted and pending manual review",
                "application": {
                    "application_id": application.application_id,
                    "review_status": application.review_status,
                    "submitted_at": application.created_at,
                },
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_applications(
    State(service): State<Arc<UnderwritingService>>,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Some(applicant) = query.applicant.as_deref() {
        let limit = query.limit.unwrap_or(DEFAULT_APPLICANT_LIMIT);
        return match service.list_for_applicant(applicant, limit).await {
            Ok(applications) => applications_response(applications),
            Err(error) => error_response(error),
        };
    }
    let final_status = match parse_status_param(query.status.as_deref(), "status") {
        Ok(status) => status,
        Err(response) => return response,
    };
    let review_status =
        match parse_status_param(query.review_status.as_deref(), "review_status") {
            Ok(status) => status,
            Err(response) => return response,
        };
    let filter = ApplicationFilter {
        final_status,
        review_status,
        region: query.region.map(|region| region.to_uppercase()),
        limit: Some(query.limit.unwrap_or(DEFAULT_LIST_LIMIT)),
    };
    match service.list(&filter).await {
        Ok(applications) => applications_response(applications),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pending_applications(
    State(service): State<Arc<UnderwritingService>>,
    Query(query): Query<PendingQuery>,
) -> Response {
    match service
        .pending_review(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await
    {
        Ok(applications) => applications_response(applications),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn get_application(
    State(service): State<Arc<UnderwritingService>>,
    Path(id): Path<String>,
) -> Response {
    match service.get(&ApplicationId(id)).await {
        Ok(application) => (StatusCode::OK, Json(application)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_application(
    State(service): State<Arc<UnderwritingService>>,
    Path(id): Path<String>,
    Json(payload): Json<ApproveRequest>,
) -> Response {
    let stage = match payload.stage.as_deref() {
        None => None,
        Some(raw) => match Stage::parse(raw) {
            Some(stage) => Some(stage),
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "Unknown stage"})),
                )
                    .into_response()
            }
        },
    };
    match service
        .approve(&ApplicationId(id), payload.actor, stage, payload.notes)
        .await
    {
        Ok(approval) => {
            let message = if approval.fully_approved {
                "Application fully approved".to_string()
            } else {
                format!("{} stage approved", approval.stage.label())
            };
            (
                StatusCode::OK,
                Json(json!({
                    "message": message,
                    "application": approval.application,
                })),
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reject_application(
    State(service): State<Arc<UnderwritingService>>,
    Path(id): Path<String>,
    Json(payload): Json<RejectRequest>,
) -> Response {
    match service
        .reject(&ApplicationId(id), payload.actor, payload.reason)
        .await
    {
        Ok(application) => (
            StatusCode::OK,
            Json(json!({
                "message": "Application rejected",
                "application": application,
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reprocess_application(
    State(service): State<Arc<UnderwritingService>>,
    Path(id): Path<String>,
) -> Response {
    match service.reprocess(&ApplicationId(id)).await {
        Ok(application) => (
            StatusCode::OK,
            Json(json!({
                "message": "Application reprocessed successfully",
                "application": application,
            })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approval_log(
    State(service): State<Arc<UnderwritingService>>,
    Query(query): Query<ApprovalLogQuery>,
) -> Response {
    let application_id = query.application_id.map(ApplicationId);
    match service
        .decision_log(
            application_id.as_ref(),
            query.limit.unwrap_or(DEFAULT_LOG_LIMIT),
        )
        .await
    {
        Ok(entries) => logs_response(entries),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_notifications(
    State(service): State<Arc<UnderwritingService>>,
    Query(query): Query<NotificationsQuery>,
) -> Response {
    let (email, role) = match (query.email, query.role) {
        (Some(email), Some(role)) => (email, role),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "email and role are required"})),
            )
                .into_response()
        }
    };
    let Some(role) = RecipientRole::parse(&role) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Unknown role"})),
        )
            .into_response();
    };
    match service.unread_notifications(&email, role).await {
        Ok(notifications) => (
            StatusCode::OK,
            Json(json!({"notifications": notifications})),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn mark_notifications_read(
    State(service): State<Arc<UnderwritingService>>,
    Json(payload): Json<MarkReadRequest>,
) -> Response {
    let ids: Vec<NotificationId> = payload.ids.into_iter().map(NotificationId).collect();
    match service.mark_notifications_read(&ids).await {
        Ok(updated) => (StatusCode::OK, Json(json!({"updated": updated}))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn dashboard_overview(
    State(service): State<Arc<UnderwritingService>>,
) -> Response {
    match service.stats().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

fn applications_response(applications: Vec<super::domain::LoanApplication>) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "total": applications.len(),
            "applications": applications,
        })),
    )
        .into_response()
}

fn logs_response(entries: Vec<ApprovalLogEntry>) -> Response {
    (StatusCode::OK, Json(json!({"logs": entries}))).into_response()
}

fn parse_status_param(value: Option<&str>, field: &str) -> Result<Option<Status>, Response> {
    match value {
        None => Ok(None),
        Some(raw) => Status::parse(raw).map(Some).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": format!("Unknown {field} value")})),
            )
                .into_response()
        }),
    }
}

fn error_response(error: UnderwritingError) -> Response {
    match error {
        UnderwritingError::MissingFields { fields } => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing required fields", "missing": fields})),
        )
            .into_response(),
        UnderwritingError::InvalidNumeric { fields } => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid numeric values", "invalid": fields})),
        )
            .into_response(),
        UnderwritingError::NotFound(_) | UnderwritingError::Store(StoreError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Application not found"})),
        )
            .into_response(),
        UnderwritingError::ReviewClosed => (
            StatusCode::CONFLICT,
            Json(json!({"error": "Application is not pending review"})),
        )
            .into_response(),
        UnderwritingError::AlreadyApproved => (
            StatusCode::CONFLICT,
            Json(json!({"error": "Application already fully approved"})),
        )
            .into_response(),
        UnderwritingError::StageOrder { requested, pending } => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": format!(
                    "Cannot approve the {} stage while {} is pending",
                    requested.label(),
                    pending.label()
                ),
            })),
        )
            .into_response(),
        UnderwritingError::Store(StoreError::Conflict) => (
            StatusCode::CONFLICT,
            Json(json!({"error": "Application was modified concurrently"})),
        )
            .into_response(),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": other.to_string()})),
        )
            .into_response(),
    }
}
