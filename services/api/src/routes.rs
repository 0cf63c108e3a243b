use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

pub(crate) fn with_operational_routes(router: Router) -> Router {
    router
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{application_router, Integrations};
    use academy_intake::config::{
        AppConfig, AppEnvironment, DatabaseConfig, LmsConfig, MailConfig, ReportingConfig,
        ServerConfig, TelemetryConfig, UploadConfig,
    };
    use academy_intake::store::MemoryStore;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn config(upload_dir: &std::path::Path) -> AppConfig {
        AppConfig {
            environment: AppEnvironment::Test,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
            database: DatabaseConfig {
                path: upload_dir.join("unused.db"),
            },
            uploads: UploadConfig {
                dir: upload_dir.to_path_buf(),
                public_base_url: "http://localhost:3000".to_string(),
            },
            lms: LmsConfig {
                url: None,
                token: None,
                student_role_id: 5,
                timeout: Duration::from_millis(200),
                password_prefix: "Mp".to_string(),
                password_suffix: "*".to_string(),
            },
            mail: MailConfig {
                from: "no-reply@academy.local".to_string(),
                brand: "Academy".to_string(),
                contact_inbox: None,
                smtp: None,
            },
            reporting: ReportingConfig::default(),
        }
    }

    fn app(ready: bool) -> Router {
        let config = config(&std::env::temp_dir().join("academy-intake-route-tests"));
        let integrations = Integrations::from_config(&config).expect("integrations");
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_operational_routes(application_router(
            Arc::new(MemoryStore::new()),
            &config,
            integrations,
        ))
        .layer(Extension(state))
    }

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::get(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("route executes")
            .status()
    }

    #[tokio::test]
    async fn readiness_tracks_the_flag() {
        assert_eq!(status_of(app(false), "/ready").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(app(true), "/ready").await, StatusCode::OK);
        assert_eq!(status_of(app(false), "/health").await, StatusCode::OK);
        assert_eq!(status_of(app(false), "/metrics").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn workflow_routes_are_mounted() {
        assert_eq!(status_of(app(true), "/api/v1/courses").await, StatusCode::OK);
        assert_eq!(status_of(app(true), "/api/v1/enrollments").await, StatusCode::OK);
        assert_eq!(status_of(app(true), "/api/v1/payments").await, StatusCode::OK);
        assert_eq!(status_of(app(true), "/api/v1/contact").await, StatusCode::OK);
        assert_eq!(status_of(app(true), "/api/v1/certificates").await, StatusCode::OK);
        assert_eq!(
            status_of(app(true), "/api/v1/dashboard/payments").await,
            StatusCode::OK
        );
        assert_eq!(
            status_of(app(true), "/api/v1/enrollments/999").await,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn readiness_flag_is_shared() {
        let flag = Arc::new(AtomicBool::new(false));
        let state = AppState {
            readiness: flag.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        flag.store(true, Ordering::Release);
        assert!(state.readiness.load(Ordering::Acquire));
    }
}
