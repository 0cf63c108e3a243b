//! Certificates issued outside the service. They are loaded from CSV and only
//! read over HTTP.

use std::io::Read;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::courses::{ImportError, ImportSummary};
use crate::records::Certificate;
use crate::store::CertificateStore;

/// Records every `national_id,course_label,url` row, replacing earlier
/// certificates for the same pair. Nothing is written when a row is invalid.
pub fn import_certificates<S, R>(store: &S, reader: R) -> Result<ImportSummary, ImportError>
where
    S: CertificateStore + ?Sized,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut certificates = Vec::new();
    for (index, record) in csv_reader.deserialize::<Certificate>().enumerate() {
        let certificate = record?;
        let line = index + 2;
        let blank = [
            ("national_id", &certificate.national_id),
            ("course_label", &certificate.course_label),
            ("url", &certificate.url),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty());
        if let Some((column, _)) = blank {
            return Err(ImportError::InvalidRow {
                row: line,
                reason: format!("{column} is empty"),
            });
        }
        certificates.push(certificate);
    }

    for certificate in &certificates {
        store.record_certificate(certificate)?;
    }
    tracing::info!(imported = certificates.len(), "certificates imported");
    Ok(ImportSummary {
        imported: certificates.len(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct CertificateQuery {
    #[serde(default)]
    pub national_id: Option<String>,
}

pub fn certificate_router<S>(store: Arc<S>) -> Router
where
    S: CertificateStore + 'static,
{
    Router::new()
        .route("/api/v1/certificates", get(list_handler::<S>))
        .with_state(store)
}

pub(crate) async fn list_handler<S>(
    State(store): State<Arc<S>>,
    Query(query): Query<CertificateQuery>,
) -> Response
where
    S: CertificateStore + 'static,
{
    let national_id = query
        .national_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match store.certificates() {
        Ok(certificates) => {
            let rows: Vec<Certificate> = certificates
                .into_iter()
                .filter(|certificate| {
                    national_id
                        .as_deref()
                        .map_or(true, |wanted| certificate.national_id == wanted)
                })
                .collect();
            (StatusCode::OK, Json(rows)).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "certificate listing failed");
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
