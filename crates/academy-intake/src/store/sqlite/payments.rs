use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};

use super::enrollments::{push_window, row_to_summary, SUMMARY_COLUMNS};
use super::{parse_timestamp, timestamp, write_error, SqliteStore};
use crate::records::{
    EnrollmentId, EnrollmentRef, NewPayment, Payment, PaymentId, PaymentPatch, PaymentView,
    PersonId,
};
use crate::store::{PaymentFilter, PaymentStore, StoreError};

const PAYMENT_COLUMNS: &str = "pay.id, pay.enrollment_id, pay.course_label, \
                               pay.amount_deposited, pay.confirmed, pay.verified, pay.badge, \
                               pay.coin, pay.delivered, pay.observation, pay.edited_by, \
                               pay.receipt_url, pay.created_at, pay.updated_at";

/// Number of columns in [`PAYMENT_COLUMNS`].
const PAYMENT_WIDTH: usize = 14;

impl PaymentStore for SqliteStore {
    fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let conn = self.conn()?;
        fetch_payment(&conn, id)
    }

    fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO payments (enrollment_id, course_label, amount_deposited, confirmed,
                                   verified, badge, coin, delivered, observation, edited_by,
                                   receipt_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                payment.enrollment_id.0,
                payment.course_label,
                payment.amount_deposited,
                payment.confirmed,
                payment.verified,
                payment.badge,
                payment.coin,
                payment.delivered,
                payment.observation,
                payment.edited_by,
                payment.receipt_url,
                timestamp(Utc::now()),
            ],
        )
        .map_err(write_error)?;
        let id = PaymentId(conn.last_insert_rowid());
        fetch_payment(&conn, id)?.ok_or(StoreError::NotFound)
    }

    fn update_payment(&self, id: PaymentId, patch: &PaymentPatch) -> Result<Payment, StoreError> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "UPDATE payments
             SET course_label = COALESCE(?2, course_label),
                 amount_deposited = COALESCE(?3, amount_deposited),
                 confirmed = COALESCE(?4, confirmed),
                 verified = COALESCE(?5, verified),
                 badge = COALESCE(?6, badge),
                 coin = COALESCE(?7, coin),
                 delivered = COALESCE(?8, delivered),
                 observation = COALESCE(?9, observation),
                 edited_by = COALESCE(?10, edited_by),
                 updated_at = ?11
             WHERE id = ?1",
            params![
                id.0,
                patch.course_label,
                patch.amount_deposited,
                patch.confirmed,
                patch.verified,
                patch.badge,
                patch.coin,
                patch.delivered,
                patch.observation,
                patch.edited_by,
                timestamp(Utc::now()),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        fetch_payment(&conn, id)?.ok_or(StoreError::NotFound)
    }

    fn delete_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let conn = self.conn()?;
        let Some(existing) = fetch_payment(&conn, id)? else {
            return Ok(None);
        };
        conn.execute("DELETE FROM payments WHERE id = ?1", params![id.0])?;
        Ok(Some(existing))
    }

    fn payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentView>, StoreError> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        push_window(&mut clauses, &mut values, "pay.created_at", &filter.created);
        if let Some(label) = &filter.course_label {
            clauses.push("pay.course_label = ?".to_string());
            values.push(Box::new(label.clone()));
        }
        let flags = [
            ("pay.confirmed", filter.confirmed),
            ("pay.verified", filter.verified),
            ("pay.coin", filter.coin),
            ("pay.badge", filter.badge),
            ("pay.delivered", filter.delivered),
        ];
        for (column, wanted) in flags {
            if let Some(wanted) = wanted {
                clauses.push(format!("{column} = ?"));
                values.push(Box::new(wanted));
            }
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS}, e.id, e.person_id, e.course_label, {SUMMARY_COLUMNS}
             FROM payments pay
             JOIN enrollments e ON e.id = pay.enrollment_id
             JOIN persons p ON p.id = e.person_id
             {where_sql}
             ORDER BY pay.created_at DESC, pay.id DESC"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(PaymentView {
                payment: row_to_payment(row)?,
                enrollment: EnrollmentRef {
                    id: EnrollmentId(row.get(PAYMENT_WIDTH)?),
                    person_id: PersonId(row.get(PAYMENT_WIDTH + 1)?),
                    course_label: row.get(PAYMENT_WIDTH + 2)?,
                },
                person: row_to_summary(row, PAYMENT_WIDTH + 3)?,
            })
        })?;

        // Unicode case folding happens in Rust; SQLite's LIKE only folds ASCII.
        let mut views = Vec::new();
        for row in rows {
            let view = row?;
            if filter.matches_search(&view) {
                views.push(view);
            }
        }
        Ok(views)
    }

    fn payments_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Vec<Payment>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments pay
             WHERE pay.enrollment_id = ?1
             ORDER BY pay.created_at DESC, pay.id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![enrollment.0], row_to_payment)?;

        let mut payments = Vec::new();
        for row in rows {
            payments.push(row?);
        }
        Ok(payments)
    }
}

fn fetch_payment(conn: &Connection, id: PaymentId) -> Result<Option<Payment>, StoreError> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments pay WHERE pay.id = ?1");
    Ok(conn
        .query_row(&sql, params![id.0], row_to_payment)
        .optional()?)
}

fn row_to_payment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: PaymentId(row.get(0)?),
        enrollment_id: EnrollmentId(row.get(1)?),
        course_label: row.get(2)?,
        amount_deposited: row.get(3)?,
        confirmed: row.get(4)?,
        verified: row.get(5)?,
        badge: row.get(6)?,
        coin: row.get(7)?,
        delivered: row.get(8)?,
        observation: row.get(9)?,
        edited_by: row.get(10)?,
        receipt_url: row.get(11)?,
        created_at: parse_timestamp(row, 12)?,
        updated_at: parse_timestamp(row, 13)?,
    })
}
