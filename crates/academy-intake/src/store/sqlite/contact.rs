use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_timestamp, timestamp, SqliteStore};
use crate::records::{ContactId, ContactMessage, ContactPatch, NewContactMessage};
use crate::store::{ContactStore, StoreError};

const CONTACT_COLUMNS: &str = "id, name, email, phone, message, created_at, updated_at";

impl ContactStore for SqliteStore {
    fn contact(&self, id: ContactId) -> Result<Option<ContactMessage>, StoreError> {
        let conn = self.conn()?;
        fetch_contact(&conn, id)
    }

    fn contacts(&self) -> Result<Vec<ContactMessage>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contact_messages ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_contact)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    fn insert_contact(&self, message: NewContactMessage) -> Result<ContactMessage, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO contact_messages (name, email, phone, message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                message.name,
                message.email,
                message.phone,
                message.message,
                timestamp(Utc::now()),
            ],
        )?;
        let id = ContactId(conn.last_insert_rowid());
        fetch_contact(&conn, id)?.ok_or(StoreError::NotFound)
    }

    fn update_contact(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<ContactMessage, StoreError> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE contact_messages
             SET name = COALESCE(?2, name),
                 email = COALESCE(?3, email),
                 phone = COALESCE(?4, phone),
                 message = COALESCE(?5, message),
                 updated_at = ?6
             WHERE id = ?1",
            params![
                id.0,
                patch.name,
                patch.email,
                patch.phone,
                patch.message,
                timestamp(Utc::now()),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        fetch_contact(&conn, id)?.ok_or(StoreError::NotFound)
    }

    fn delete_contact(&self, id: ContactId) -> Result<bool, StoreError> {
        let affected = self
            .conn()?
            .execute("DELETE FROM contact_messages WHERE id = ?1", params![id.0])?;
        Ok(affected > 0)
    }
}

fn fetch_contact(conn: &Connection, id: ContactId) -> Result<Option<ContactMessage>, StoreError> {
    let sql = format!("SELECT {CONTACT_COLUMNS} FROM contact_messages WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.0], row_to_contact)
        .optional()?)
}

fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactMessage> {
    Ok(ContactMessage {
        id: ContactId(row.get(0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        message: row.get(4)?,
        created_at: parse_timestamp(row, 5)?,
        updated_at: parse_timestamp(row, 6)?,
    })
}
