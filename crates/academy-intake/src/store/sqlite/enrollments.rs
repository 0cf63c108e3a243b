use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};

use super::{parse_timestamp, timestamp, write_error, SqliteStore};
use crate::records::{
    CourseId, Enrollment, EnrollmentId, EnrollmentPatch, EnrollmentView, NewEnrollment, PersonId,
    PersonSummary,
};
use crate::store::{EnrollmentFilter, EnrollmentStore, StoreError, TimeWindow};

const ENROLLMENT_COLUMNS: &str = "e.id, e.person_id, e.course_id, e.accepted, e.course_label, \
                                  e.observation, e.edited_by, e.created_at, e.updated_at";

/// Number of columns in [`ENROLLMENT_COLUMNS`].
const ENROLLMENT_WIDTH: usize = 9;

pub(super) const SUMMARY_COLUMNS: &str =
    "p.first_name, p.last_name, p.national_id, p.grade, p.subsystem, p.email";

impl EnrollmentStore for SqliteStore {
    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        let conn = self.conn()?;
        fetch_enrollment(&conn, "e.id = ?1", params![id.0])
    }

    fn find_enrollment(
        &self,
        person: PersonId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        let conn = self.conn()?;
        fetch_enrollment(
            &conn,
            "e.person_id = ?1 AND e.course_id = ?2",
            params![person.0, course.0],
        )
    }

    fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<Enrollment, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO enrollments (person_id, course_id, accepted, course_label,
                                      created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                enrollment.person_id.0,
                enrollment.course_id.0,
                enrollment.accepted,
                enrollment.course_label,
                timestamp(Utc::now()),
            ],
        )
        .map_err(write_error)?;
        let id = conn.last_insert_rowid();
        fetch_enrollment(&conn, "e.id = ?1", params![id])?.ok_or(StoreError::NotFound)
    }

    fn update_enrollment(
        &self,
        id: EnrollmentId,
        patch: &EnrollmentPatch,
    ) -> Result<Enrollment, StoreError> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE enrollments
             SET accepted = COALESCE(?2, accepted),
                 course_label = COALESCE(?3, course_label),
                 observation = COALESCE(?4, observation),
                 edited_by = COALESCE(?5, edited_by),
                 updated_at = ?6
             WHERE id = ?1",
            params![
                id.0,
                patch.accepted,
                patch.course_label,
                patch.observation,
                patch.edited_by,
                timestamp(Utc::now()),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        fetch_enrollment(&conn, "e.id = ?1", params![id.0])?.ok_or(StoreError::NotFound)
    }

    fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, StoreError> {
        let affected = self
            .conn()?
            .execute("DELETE FROM enrollments WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }

    fn enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<EnrollmentView>, StoreError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        push_window(&mut clauses, &mut values, "e.created_at", &filter.created);
        push_window(&mut clauses, &mut values, "e.updated_at", &filter.updated);
        if let Some(label) = &filter.course_label {
            clauses.push("e.course_label = ?".to_string());
            values.push(Box::new(label.clone()));
        }
        if let Some(editor) = &filter.edited_by {
            clauses.push("e.edited_by = ?".to_string());
            values.push(Box::new(editor.clone()));
        }
        if filter.with_observation {
            clauses.push("TRIM(COALESCE(e.observation, '')) <> ''".to_string());
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS}, {SUMMARY_COLUMNS}
             FROM enrollments e
             JOIN persons p ON p.id = e.person_id
             {where_sql}
             ORDER BY e.created_at DESC, e.id DESC"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(EnrollmentView {
                enrollment: row_to_enrollment(row)?,
                person: row_to_summary(row, ENROLLMENT_WIDTH)?,
            })
        })?;

        let mut views = Vec::new();
        for row in rows {
            views.push(row?);
        }
        Ok(views)
    }

    fn enrollments_for_person(&self, person: PersonId) -> Result<Vec<Enrollment>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments e
             WHERE e.person_id = ?1
             ORDER BY e.created_at DESC, e.id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![person.0], row_to_enrollment)?;

        let mut enrollments = Vec::new();
        for row in rows {
            enrollments.push(row?);
        }
        Ok(enrollments)
    }
}

/// Appends half-open bounds on `column` for a set window.
pub(super) fn push_window(
    clauses: &mut Vec<String>,
    values: &mut Vec<Box<dyn ToSql>>,
    column: &str,
    window: &TimeWindow,
) {
    if let Some(from) = window.from {
        clauses.push(format!("{column} >= ?"));
        values.push(Box::new(timestamp(from)));
    }
    if let Some(until) = window.until {
        clauses.push(format!("{column} < ?"));
        values.push(Box::new(timestamp(until)));
    }
}

fn fetch_enrollment(
    conn: &Connection,
    predicate: &str,
    values: &[&dyn ToSql],
) -> Result<Option<Enrollment>, StoreError> {
    let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments e WHERE {predicate}");
    Ok(conn.query_row(&sql, values, row_to_enrollment).optional()?)
}

fn row_to_enrollment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: EnrollmentId(row.get(0)?),
        person_id: PersonId(row.get(1)?),
        course_id: CourseId(row.get(2)?),
        accepted: row.get(3)?,
        course_label: row.get(4)?,
        observation: row.get(5)?,
        edited_by: row.get(6)?,
        created_at: parse_timestamp(row, 7)?,
        updated_at: parse_timestamp(row, 8)?,
    })
}

/// Reads [`SUMMARY_COLUMNS`] starting at `base`.
pub(super) fn row_to_summary(
    row: &rusqlite::Row<'_>,
    base: usize,
) -> rusqlite::Result<PersonSummary> {
    Ok(PersonSummary {
        first_name: row.get(base)?,
        last_name: row.get(base + 1)?,
        national_id: row.get(base + 2)?,
        grade: row.get(base + 3)?,
        subsystem: row.get(base + 4)?,
        email: row.get(base + 5)?,
    })
}
