use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::service::{ContactError, ContactService, ContactSubmission};
use crate::records::{ContactId, ContactPatch};
use crate::store::ContactStore;

pub fn contact_router<S>(service: Arc<ContactService<S>>) -> Router
where
    S: ContactStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/contact",
            get(list_handler::<S>).post(submit_handler::<S>),
        )
        .route(
            "/api/v1/contact/:contact_id",
            get(get_handler::<S>)
                .put(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<ContactService<S>>>,
    Json(submission): Json<ContactSubmission>,
) -> Response
where
    S: ContactStore + 'static,
{
    match service.submit(submission).await {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_handler<S>(State(service): State<Arc<ContactService<S>>>) -> Response
where
    S: ContactStore + 'static,
{
    match service.list() {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<S>(
    State(service): State<Arc<ContactService<S>>>,
    Path(contact_id): Path<i64>,
) -> Response
where
    S: ContactStore + 'static,
{
    match service.get(ContactId(contact_id)) {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_handler<S>(
    State(service): State<Arc<ContactService<S>>>,
    Path(contact_id): Path<i64>,
    Json(patch): Json<ContactPatch>,
) -> Response
where
    S: ContactStore + 'static,
{
    match service.update(ContactId(contact_id), patch) {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<S>(
    State(service): State<Arc<ContactService<S>>>,
    Path(contact_id): Path<i64>,
) -> Response
where
    S: ContactStore + 'static,
{
    match service.delete(ContactId(contact_id)) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: ContactError) -> Response {
    let status = match &err {
        ContactError::Validation(_) => StatusCode::BAD_REQUEST,
        ContactError::NotFound(_) => StatusCode::NOT_FOUND,
        ContactError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "contact request failed");
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::workflows::contact::ContactSettings;
    use crate::workflows::test_support::RecordingMailer;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn router() -> Router {
        contact_router(Arc::new(ContactService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingMailer::default()),
            ContactSettings::default(),
        )))
    }

    fn post(body: &str) -> Request<Body> {
        Request::post("/api/v1/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds")
    }

    #[tokio::test]
    async fn submit_route_returns_created_or_bad_request() {
        let router = router();

        let response = router
            .clone()
            .oneshot(post(
                r#"{"name":"Luis","email":"luis@example.org","message":"Hola"}"#,
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = router
            .clone()
            .oneshot(post(r#"{"name":"Luis","message":"Hola"}"#))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(
                Request::delete("/api/v1/contact/1")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_message_is_not_found() {
        let response = router()
            .oneshot(
                Request::get("/api/v1/contact/42")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
