use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_timestamp, timestamp, write_error, SqliteStore};
use crate::records::{NewPerson, Person, PersonId, ProfileUpdate};
use crate::store::{PersonStore, StoreError};

const PERSON_COLUMNS: &str = "id, email, national_id, first_name, last_name, phone, grade, \
                              subsystem, external_id, created_at, updated_at";

impl PersonStore for SqliteStore {
    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        let conn = self.conn()?;
        fetch_person(&conn, "id = ?1", &id.0)
    }

    fn person_by_email(&self, email: &str) -> Result<Option<Person>, StoreError> {
        let conn = self.conn()?;
        fetch_person(&conn, "email = ?1", &email)
    }

    fn person_by_national_id(&self, national_id: &str) -> Result<Option<Person>, StoreError> {
        let conn = self.conn()?;
        fetch_person(&conn, "national_id = ?1", &national_id)
    }

    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO persons (email, national_id, first_name, last_name, phone, grade,
                                  subsystem, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                person.email,
                person.national_id,
                person.first_name,
                person.last_name,
                person.phone,
                person.grade,
                person.subsystem,
                timestamp(now),
            ],
        )
        .map_err(write_error)?;
        let id = PersonId(conn.last_insert_rowid());
        fetch_person(&conn, "id = ?1", &id.0)?.ok_or(StoreError::NotFound)
    }

    fn update_profile(&self, id: PersonId, update: &ProfileUpdate) -> Result<Person, StoreError> {
        let conn = self.conn()?;
        let affected = conn
            .execute(
                "UPDATE persons
                 SET national_id = COALESCE(?2, national_id),
                     phone = COALESCE(?3, phone),
                     grade = COALESCE(?4, grade),
                     subsystem = COALESCE(?5, subsystem),
                     updated_at = ?6
                 WHERE id = ?1",
                params![
                    id.0,
                    update.national_id,
                    update.phone,
                    update.grade,
                    update.subsystem,
                    timestamp(Utc::now()),
                ],
            )
            .map_err(write_error)?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        fetch_person(&conn, "id = ?1", &id.0)?.ok_or(StoreError::NotFound)
    }

    fn assign_external_id(&self, id: PersonId, external_id: &str) -> Result<Person, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE persons SET external_id = ?2, updated_at = ?3
             WHERE id = ?1 AND external_id IS NULL",
            params![id.0, external_id, timestamp(Utc::now())],
        )?;
        fetch_person(&conn, "id = ?1", &id.0)?.ok_or(StoreError::NotFound)
    }
}

fn fetch_person(
    conn: &Connection,
    predicate: &str,
    value: &dyn rusqlite::ToSql,
) -> Result<Option<Person>, StoreError> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE {predicate}");
    Ok(conn.query_row(&sql, params![value], row_to_person).optional()?)
}

/// Map a `rusqlite::Row` selected with [`PERSON_COLUMNS`] to a [`Person`].
fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: PersonId(row.get(0)?),
        email: row.get(1)?,
        national_id: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        grade: row.get(6)?,
        subsystem: row.get(7)?,
        external_id: row.get(8)?,
        created_at: parse_timestamp(row, 9)?,
        updated_at: parse_timestamp(row, 10)?,
    })
}
