use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::service::{
    DashboardError, DashboardService, EnrollmentDashboardQuery, ObservationDashboardQuery,
    PaymentDashboardQuery,
};
use crate::store::RecordStore;

pub fn dashboard_router<S>(service: Arc<DashboardService<S>>) -> Router
where
    S: RecordStore + 'static,
{
    Router::new()
        .route("/api/v1/dashboard/enrollments", get(enrollments_handler::<S>))
        .route("/api/v1/dashboard/observations", get(observations_handler::<S>))
        .route("/api/v1/dashboard/payments", get(payments_handler::<S>))
        .with_state(service)
}

pub(crate) async fn enrollments_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    Query(query): Query<EnrollmentDashboardQuery>,
) -> Response
where
    S: RecordStore + 'static,
{
    respond(service.enrollments(query))
}

pub(crate) async fn observations_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    Query(query): Query<ObservationDashboardQuery>,
) -> Response
where
    S: RecordStore + 'static,
{
    respond(service.observations(query))
}

pub(crate) async fn payments_handler<S>(
    State(service): State<Arc<DashboardService<S>>>,
    Query(query): Query<PaymentDashboardQuery>,
) -> Response
where
    S: RecordStore + 'static,
{
    respond(service.payments(query))
}

fn respond<T: serde::Serialize>(result: Result<T, DashboardError>) -> Response {
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(DashboardError::Validation(reason)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "dashboard query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
