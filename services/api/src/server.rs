use crate::cli::ServeArgs;
use crate::infra::{build_enrollment_service, AppState};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use enrollment_pay::config::{AppConfig, ConfigError};
use enrollment_pay::error::AppError;
use enrollment_pay::telemetry;
use enrollment_pay::workflows::enrollment::CorsPolicy;
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

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let settings = &config.enrollment;
    let cors = CorsPolicy::new(&settings.allowed_origin).map_err(|_| {
        ConfigError::InvalidOrigin {
            value: settings.allowed_origin.clone(),
        }
    })?;
    let service = Arc::new(build_enrollment_service(settings)?);
    let tiers = service.catalog().tiers().len();

    let app = with_enrollment_routes(service, cors)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, tiers, "enrollment payment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
