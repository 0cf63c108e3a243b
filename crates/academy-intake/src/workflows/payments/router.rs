use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use super::domain::{PaymentForm, PaymentQuery};
use super::receipts::receipt_router;
use super::service::{PaymentError, PaymentService, ReceiptUpload};
use crate::records::{PaymentId, PaymentPatch};
use crate::store::RecordStore;

/// Largest accepted multipart body, receipt included.
pub const MAX_RECEIPT_BYTES: usize = 10 * 1024 * 1024;

const RECEIPT_FIELD: &str = "receipt";

/// Router builder for payment intake, staff CRUD and receipt downloads.
pub fn payment_router<S>(service: Arc<PaymentService<S>>) -> Router
where
    S: RecordStore + 'static,
{
    let receipts = receipt_router(service.receipts());
    Router::new()
        .route(
            "/api/v1/payments",
            get(list_handler::<S>).post(create_handler::<S>),
        )
        .route(
            "/api/v1/payments/:payment_id",
            get(get_handler::<S>)
                .put(update_handler::<S>)
                .delete(delete_handler::<S>),
        )
        .layer(DefaultBodyLimit::max(MAX_RECEIPT_BYTES))
        .with_state(service)
        .merge(receipts)
}

pub(crate) async fn create_handler<S>(
    State(service): State<Arc<PaymentService<S>>>,
    multipart: Multipart,
) -> Response
where
    S: RecordStore + 'static,
{
    let (form, upload) = match read_submission(multipart).await {
        Ok(parts) => parts,
        Err(err) => return error_response(err),
    };
    match service.create(form, upload).await {
        Ok(payment) => (StatusCode::CREATED, Json(payment)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn read_submission(
    mut multipart: Multipart,
) -> Result<(PaymentForm, Option<ReceiptUpload>), PaymentError> {
    let mut form = PaymentForm::default();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| PaymentError::Validation(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == RECEIPT_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(|err| {
                PaymentError::Validation(format!("failed to read receipt: {err}"))
            })?;
            upload = Some(ReceiptUpload {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(|err| {
                PaymentError::Validation(format!("failed to read field {name}: {err}"))
            })?;
            form.set(&name, &value).map_err(PaymentError::Validation)?;
        }
    }
    Ok((form, upload))
}

pub(crate) async fn list_handler<S>(
    State(service): State<Arc<PaymentService<S>>>,
    Query(query): Query<PaymentQuery>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.list(query) {
        Ok(listings) => (StatusCode::OK, Json(listings)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn get_handler<S>(
    State(service): State<Arc<PaymentService<S>>>,
    Path(payment_id): Path<i64>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.get(PaymentId(payment_id)) {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn update_handler<S>(
    State(service): State<Arc<PaymentService<S>>>,
    Path(payment_id): Path<i64>,
    Json(patch): Json<PaymentPatch>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.update(PaymentId(payment_id), patch) {
        Ok(payment) => (StatusCode::OK, Json(payment)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler<S>(
    State(service): State<Arc<PaymentService<S>>>,
    Path(payment_id): Path<i64>,
) -> Response
where
    S: RecordStore + 'static,
{
    match service.delete(PaymentId(payment_id)).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: PaymentError) -> Response {
    let status = match &err {
        PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
        PaymentError::EnrollmentNotFound(_) | PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::Receipt(_) | PaymentError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "payment request failed");
    }
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
