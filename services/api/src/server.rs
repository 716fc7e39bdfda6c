use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryApplicationStore, InMemoryApprovalLedger, InMemoryFundsGateway,
    InMemoryNotificationStore, StaticReviewerDirectory,
};
use crate::routes::with_underwriting_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lendflow::config::AppConfig;
use lendflow::error::AppError;
use lendflow::telemetry;
use lendflow::workflows::underwriting::{
    AdvisoryScorer, HttpModelClient, NotificationDispatcher, UnderwritingPolicy,
    UnderwritingService,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryApplicationStore::default());
    let ledger = Arc::new(InMemoryApprovalLedger::default());
    let notifications = Arc::new(InMemoryNotificationStore::default());
    let reviewers = Arc::new(StaticReviewerDirectory::new(
        config.review.reviewer_emails.clone(),
    ));
    let funds = Arc::new(InMemoryFundsGateway::default());
    let notifier = NotificationDispatcher::new(notifications, reviewers);

    let mut service = UnderwritingService::new(
        store,
        ledger,
        notifier,
        funds,
        UnderwritingPolicy::default(),
    );
    if let Some(endpoint) = config.model.endpoint.clone() {
        let client = Arc::new(HttpModelClient::new(endpoint));
        service = service.with_scorer(AdvisoryScorer::new(client, config.model.timeout));
    }

    let app = with_underwriting_routes(Arc::new(service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan underwriting service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
