//! Public lookup answering "am I enrolled, and what have I paid?".
//!
//! Read-only: nothing here writes to the store or calls the LMS.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::records::{Enrollment, Payment, PersonSummary};
use crate::store::{RecordStore, StoreError};
use crate::workflows::enrollment::domain::non_blank;
use crate::workflows::enrollment::normalize_email;

/// How the caller identifies themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonKey {
    Email(String),
    NationalId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub exists: bool,
    pub enrolled: bool,
    pub message: String,
    pub person: Option<PersonSummary>,
    pub enrollment: Option<Enrollment>,
    /// Newest first.
    pub payments: Vec<Payment>,
}

impl VerificationReport {
    fn unknown() -> Self {
        Self {
            exists: false,
            enrolled: false,
            message: "no registered person matches the given identifier".to_string(),
            person: None,
            enrollment: None,
            payments: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct VerificationService<S> {
    store: Arc<S>,
}

impl<S> VerificationService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Finds the person by `key`, then the enrollment whose course label
    /// equals `code`, then that enrollment's payments.
    pub fn lookup(&self, key: PersonKey, code: &str) -> Result<VerificationReport, VerificationError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(VerificationError::Validation("code is required".to_string()));
        }

        let person = match &key {
            PersonKey::Email(email) => self.store.person_by_email(&normalize_email(email))?,
            PersonKey::NationalId(national_id) => {
                self.store.person_by_national_id(national_id.trim())?
            }
        };
        let Some(person) = person else {
            return Ok(VerificationReport::unknown());
        };

        let enrollment = self
            .store
            .enrollments_for_person(person.id)?
            .into_iter()
            .find(|enrollment| enrollment.course_label.as_deref() == Some(code));
        let Some(enrollment) = enrollment else {
            return Ok(VerificationReport {
                exists: true,
                enrolled: false,
                message: format!("no enrollment found for course {code}"),
                person: Some(person.summary()),
                enrollment: None,
                payments: Vec::new(),
            });
        };

        let payments = self.store.payments_for_enrollment(enrollment.id)?;
        let message = if payments.is_empty() {
            "enrolled, no payments registered yet".to_string()
        } else {
            format!("enrolled with {} registered payment(s)", payments.len())
        };
        Ok(VerificationReport {
            exists: true,
            enrolled: true,
            message,
            person: Some(person.summary()),
            enrollment: Some(enrollment),
            payments,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailLookup {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NationalIdLookup {
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

pub fn verification_router<S>(service: Arc<VerificationService<S>>) -> Router
where
    S: RecordStore + 'static,
{
    Router::new()
        .route("/api/v1/enrollments/validate", post(by_email_handler::<S>))
        .route("/api/v1/payments/validate", post(by_national_id_handler::<S>))
        .with_state(service)
}

pub(crate) async fn by_email_handler<S>(
    State(service): State<Arc<VerificationService<S>>>,
    Json(body): Json<EmailLookup>,
) -> Response
where
    S: RecordStore + 'static,
{
    let Some(email) = non_blank(body.email) else {
        return error_response(VerificationError::Validation("email is required".to_string()));
    };
    respond(service.lookup(PersonKey::Email(email), body.code.as_deref().unwrap_or_default()))
}

pub(crate) async fn by_national_id_handler<S>(
    State(service): State<Arc<VerificationService<S>>>,
    Json(body): Json<NationalIdLookup>,
) -> Response
where
    S: RecordStore + 'static,
{
    let Some(national_id) = non_blank(body.national_id) else {
        return error_response(VerificationError::Validation(
            "national_id is required".to_string(),
        ));
    };
    respond(service.lookup(
        PersonKey::NationalId(national_id),
        body.code.as_deref().unwrap_or_default(),
    ))
}

fn respond(result: Result<VerificationReport, VerificationError>) -> Response {
    match result {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: VerificationError) -> Response {
    let status = match &err {
        VerificationError::Validation(_) => StatusCode::BAD_REQUEST,
        VerificationError::Store(_) => {
            tracing::error!(error = %err, "verification lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
