use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::domain::EnrollmentRequest;
use super::service::{EnrollmentError, EnrollmentService};
use crate::records::{EnrollmentId, EnrollmentPatch};
use crate::store::RecordStore;

/// Router builder for enrollment intake and staff CRUD.
pub fn enrollment_router<S>(service: Arc<EnrollmentService<S>>) -> Router
where
    S: RecordStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/enrollments",
            get(list_handler::<S>).post(enroll_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id",
            get(get_handler::<S>)
                .put(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn enroll_handler<S>(
    State(service): State<Arc<EnrollmentService<S>>>,
    Json(request): Json<EnrollmentRequest>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.enroll(request).await {
        // Pending registrations are still accepted; the body says which.
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<S>(State(service): State<Arc<EnrollmentService<S>>>) -> Response
where
    S: RecordStore + 'static,
{
    match service.list() {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<S>(
    State(service): State<Arc<EnrollmentService<S>>>,
    Path(enrollment_id): Path<i64>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.get(EnrollmentId(enrollment_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_handler<S>(
    State(service): State<Arc<EnrollmentService<S>>>,
    Path(enrollment_id): Path<i64>,
    Json(patch): Json<EnrollmentPatch>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.update(EnrollmentId(enrollment_id), patch) {
        Ok(enrollment) => (StatusCode::OK, Json(enrollment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<S>(
    State(service): State<Arc<EnrollmentService<S>>>,
    Path(enrollment_id): Path<i64>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.delete(EnrollmentId(enrollment_id)).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: EnrollmentError) -> Response {
    let status = match &err {
        EnrollmentError::Validation(_) => StatusCode::BAD_REQUEST,
        EnrollmentError::CourseNotFound(_) | EnrollmentError::NotFound(_) => {
            StatusCode::NOT_FOUND
        }
        EnrollmentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "enrollment request failed");
    }
    let payload = json!({ "error": err.to_string() });
    (status, Json(payload)).into_response()
}
