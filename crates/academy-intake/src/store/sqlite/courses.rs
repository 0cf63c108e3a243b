use rusqlite::{params, OptionalExtension};

use super::{write_error, SqliteStore};
use crate::records::{Course, CourseId};
use crate::store::{CourseStore, StoreError};

impl CourseStore for SqliteStore {
    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id, shortname, name FROM courses WHERE id = ?1",
                params![id.0],
                row_to_course,
            )
            .optional()?)
    }

    fn courses(&self) -> Result<Vec<Course>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, shortname, name FROM courses ORDER BY id ASC")?;
        let rows = stmt.query_map([], row_to_course)?;

        let mut courses = Vec::new();
        for row in rows {
            courses.push(row?);
        }
        Ok(courses)
    }

    fn upsert_course(&self, course: &Course) -> Result<Course, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO courses (id, shortname, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(shortname) DO UPDATE SET name = excluded.name",
            params![course.id.0, course.shortname, course.name],
        )
        .map_err(write_error)?;
        Ok(conn.query_row(
            "SELECT id, shortname, name FROM courses WHERE shortname = ?1",
            params![course.shortname],
            row_to_course,
        )?)
    }
}

fn row_to_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: CourseId(row.get(0)?),
        shortname: row.get(1)?,
        name: row.get(2)?,
    })
}
