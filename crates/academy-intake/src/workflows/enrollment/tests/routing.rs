use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::records::CourseId;
use crate::workflows::enrollment::router::enroll_handler;
use crate::workflows::enrollment::{enrollment_router, EnrollmentRequest};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn post_returns_created_with_enrollment() {
    let h = harness(ScriptedRegistry::confirming("42"));
    let router = enrollment_router(h.service.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/enrollments",
            json!({
                "email": "a@x.com",
                "course_id": 7,
                "national_id": "1712345678",
                "first_name": "Ana",
                "accepted": true
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["person"]["external_id"], "42");
    assert_eq!(payload["registration"]["status"], "confirmed");
    assert_eq!(payload["enrollment"]["course_id"], 7);
    assert_eq!(payload["notified"], true);
}

#[tokio::test]
async fn post_reports_pending_registration_without_enrollment() {
    let h = harness(ScriptedRegistry::new(Script::Fail));

    let response = enroll_handler::<crate::store::MemoryStore>(
        State(h.service.clone()),
        axum::Json(request()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["enrollment"], Value::Null);
    assert_eq!(payload["registration"]["status"], "failed");
    assert!(payload["message"]
        .as_str()
        .unwrap_or_default()
        .contains("pending"));
}

#[tokio::test]
async fn post_without_email_is_bad_request() {
    let h = harness(ScriptedRegistry::confirming("42"));
    let router = enrollment_router(h.service.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/enrollments",
            json!({ "course_id": 7 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "email is required");
}

#[tokio::test]
async fn post_for_unknown_course_is_not_found() {
    let h = harness(ScriptedRegistry::confirming("42"));

    let response = enroll_handler::<crate::store::MemoryStore>(
        State(h.service.clone()),
        axum::Json(EnrollmentRequest {
            course_id: Some(CourseId(99)),
            ..request()
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn staff_routes_read_update_and_delete() {
    let h = harness(ScriptedRegistry::confirming("42"));
    let id = h
        .service
        .enroll(request())
        .await
        .expect("enroll")
        .enrollment
        .expect("enrolled")
        .id;
    let router = enrollment_router(h.service.clone());
    let item = format!("/api/v1/enrollments/{id}");

    let response = router
        .clone()
        .oneshot(json_request("GET", "/api/v1/enrollments/999", Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &item,
            json!({ "observation": "Falta copia de cédula", "edited_by": "secretaria" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["observation"], "Falta copia de cédula");
    assert_eq!(payload["edited_by"], "secretaria");

    let response = router
        .clone()
        .oneshot(json_request("GET", "/api/v1/enrollments", Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let rows = payload.as_array().expect("list payload");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["person"]["email"], "a@x.com");

    let response = router
        .oneshot(json_request("DELETE", &item, Value::Null))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(enrollment_count(h.store.as_ref()), 0);
}

#[tokio::test]
async fn store_outage_maps_to_internal_error() {
    let h = harness_with(
        Arc::new(UnavailableStore),
        ScriptedRegistry::confirming("42"),
        RecordingMailer::default(),
    );
    let router = enrollment_router(h.service.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/enrollments",
            json!({ "email": "a@x.com", "course_id": 7 }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(h.registry.calls().is_empty());
}
