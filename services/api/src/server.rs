use crate::cli::ServeArgs;
use crate::infra::{AppState, ConfiguredItemSource, ConfiguredRulesetSource};
use crate::routes::with_screening_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};
use wearguard::config::AppConfig;
use wearguard::error::AppError;
use wearguard::screening::{EvaluationEngine, RulesetStore, ScreeningService};
use wearguard::telemetry;

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

    let rulesets = ConfiguredRulesetSource::from_config(&config.screening)?;
    let items = ConfiguredItemSource::from_config(&config.screening)?;
    let screening_service = Arc::new(ScreeningService::with_engine(
        Arc::new(items),
        Arc::new(RulesetStore::new(rulesets)),
        EvaluationEngine::new(config.screening.suppression),
    )
    .with_concurrency(config.screening.concurrency));

    // A failed warm-up is retried by the first request that needs the ruleset.
    if let Err(error) = screening_service.ruleset().await {
        warn!(%error, "ruleset warm-up failed");
    }

    let app = with_screening_routes(screening_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        scope = ?config.screening.suppression,
        concurrency = config.screening.concurrency,
        "wearguard screening service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
