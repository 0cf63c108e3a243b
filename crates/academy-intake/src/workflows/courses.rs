//! Course catalog: read-only HTTP listing plus the CSV import used to seed it.

use std::io::Read;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::records::{Course, CourseId};
use crate::store::{CourseStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
}

#[derive(Debug, Deserialize)]
struct CourseRow {
    id: i64,
    shortname: String,
    name: String,
}

/// Upserts every `id,shortname,name` row. Rows are validated before any
/// write, so a bad file leaves the catalog untouched.
pub fn import_courses<S, R>(store: &S, reader: R) -> Result<ImportSummary, ImportError>
where
    S: CourseStore + ?Sized,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut courses = Vec::new();
    for (index, record) in csv_reader.deserialize::<CourseRow>().enumerate() {
        let row = record?;
        // Header is line 1.
        let line = index + 2;
        if row.shortname.is_empty() {
            return Err(ImportError::InvalidRow {
                row: line,
                reason: "shortname is empty".to_string(),
            });
        }
        if row.name.is_empty() {
            return Err(ImportError::InvalidRow {
                row: line,
                reason: "name is empty".to_string(),
            });
        }
        courses.push(Course {
            id: CourseId(row.id),
            shortname: row.shortname,
            name: row.name,
        });
    }

    for course in &courses {
        store.upsert_course(course)?;
    }
    tracing::info!(imported = courses.len(), "course catalog imported");
    Ok(ImportSummary {
        imported: courses.len(),
    })
}

pub fn course_router<S>(store: Arc<S>) -> Router
where
    S: CourseStore + 'static,
{
    Router::new()
        .route("/api/v1/courses", get(list_handler::<S>))
        .route("/api/v1/courses/:course_id", get(get_handler::<S>))
        .with_state(store)
}

pub(crate) async fn list_handler<S>(State(store): State<Arc<S>>) -> Response
where
    S: CourseStore + 'static,
{
    match store.courses() {
        Ok(courses) => (StatusCode::OK, Json(courses)).into_response(),
        Err(err) => internal_error(err),
    }
}

pub(crate) async fn get_handler<S>(
    State(store): State<Arc<S>>,
    Path(course_id): Path<i64>,
) -> Response
where
    S: CourseStore + 'static,
{
    match store.course(CourseId(course_id)) {
        Ok(Some(course)) => (StatusCode::OK, Json(course)).into_response(),
        Ok(None) => {
            let payload = json!({ "error": format!("course {course_id} not found") });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(err) => internal_error(err),
    }
}

fn internal_error(err: StoreError) -> Response {
    let payload = json!({ "error": err.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}
