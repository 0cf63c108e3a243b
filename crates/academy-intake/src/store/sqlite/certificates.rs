use rusqlite::{params, OptionalExtension};

use super::SqliteStore;
use crate::records::Certificate;
use crate::store::{CertificateStore, StoreError};

impl CertificateStore for SqliteStore {
    fn certificate(
        &self,
        national_id: &str,
        course_label: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT national_id, course_label, url FROM certificates
                 WHERE national_id = ?1 AND course_label = ?2",
                params![national_id, course_label],
                row_to_certificate,
            )
            .optional()?)
    }

    fn certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT national_id, course_label, url FROM certificates
             ORDER BY national_id, course_label",
        )?;
        let rows = stmt.query_map([], row_to_certificate)?;

        let mut certificates = Vec::new();
        for row in rows {
            certificates.push(row?);
        }
        Ok(certificates)
    }

    fn record_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO certificates (national_id, course_label, url)
             VALUES (?1, ?2, ?3)",
            params![
                certificate.national_id,
                certificate.course_label,
                certificate.url
            ],
        )?;
        Ok(())
    }
}

fn row_to_certificate(row: &rusqlite::Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        national_id: row.get(0)?,
        course_label: row.get(1)?,
        url: row.get(2)?,
    })
}
