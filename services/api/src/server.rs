use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use conduct_engine::config::AppConfig;
use conduct_engine::telemetry;
use conduct_engine::{
    import_ledger_from_path, AppError, ConductService, EngineState, RecomputeWorker, RuleTable,
};

use crate::cli::ServeArgs;
use crate::infra::{seed_ledger, AppState, InMemoryConductStore};
use crate::routes::with_conduct_routes;

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

    let store = Arc::new(InMemoryConductStore::default());
    if let Some(path) = args.ledger.take() {
        let ledger = import_ledger_from_path(&path)?;
        let (subjects, sanctions) = seed_ledger(&store, ledger)?;
        info!(?path, subjects, sanctions, "bulletin ledger imported");
    }

    let service = Arc::new(ConductService::new(store, RuleTable::default())?);
    let worker = Arc::new(RecomputeWorker::new(Arc::clone(&service)));
    worker.start(config.worker.recompute_interval)?;

    let app = with_conduct_routes(EngineState { service, worker })
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        interval_secs = config.worker.recompute_interval.as_secs(),
        "disciplinary conduct engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
