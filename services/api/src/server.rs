use crate::cli::ServeArgs;
use crate::infra::{application_router, AppState, Integrations};
use crate::routes::with_operational_routes;
use academy_intake::config::AppConfig;
use academy_intake::error::AppError;
use academy_intake::store::{MemoryStore, SqliteStore};
use academy_intake::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
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

    let integrations = Integrations::from_config(&config)?;
    let workflows = if args.ephemeral {
        info!("ephemeral run; records live in memory only");
        application_router(Arc::new(MemoryStore::new()), &config, integrations)
    } else {
        let store = SqliteStore::open(&config.database.path)?;
        info!(path = %config.database.path.display(), "record store opened");
        application_router(Arc::new(store), &config, integrations)
    };

    let app = with_operational_routes(workflows)
        .layer(Extension(app_state))
        .layer(prometheus_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "academy intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
