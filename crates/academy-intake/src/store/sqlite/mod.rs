//! SQLite-backed record store.
//!
//! [`SqliteStore`] owns a single [`rusqlite::Connection`] behind a mutex and
//! runs migrations before handing out any access. Each entity's queries live
//! in their own module as a trait impl on the store.

mod certificates;
mod contact;
mod courses;
mod enrollments;
pub mod migrations;
mod payments;
mod people;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ffi, Connection, ErrorCode};

use super::StoreError;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        tracing::info!(path = %path.display(), "opening database");
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }
}

/// RFC 3339 with fixed millisecond precision so stored values sort as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Translates constraint failures into store-level outcomes.
fn write_error(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StoreError::Conflict
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::NotFound,
                _ => {}
            }
        }
    }
    StoreError::Sqlite(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        Certificate, ContactPatch, Course, CourseId, EnrollmentPatch, NewContactMessage,
        NewEnrollment, NewPayment, NewPerson, PaymentPatch, ProfileUpdate,
    };
    use crate::store::{
        CertificateStore, ContactStore, CourseStore, EnrollmentFilter, EnrollmentStore,
        PaymentFilter, PaymentStore, PersonStore, TimeWindow,
    };

    fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("nested").join("academy.db"))
            .expect("database opens");
        (dir, store)
    }

    fn seed_course(store: &SqliteStore) -> Course {
        store
            .upsert_course(&Course {
                id: CourseId(7),
                shortname: "cbpea".to_string(),
                name: "Curso básico".to_string(),
            })
            .expect("course stored")
    }

    fn new_person(email: &str, national_id: &str) -> NewPerson {
        NewPerson {
            email: email.to_string(),
            national_id: Some(national_id.to_string()),
            first_name: Some("María".to_string()),
            last_name: Some("Quishpe".to_string()),
            phone: Some("0991111111".to_string()),
            grade: Some("Sargento".to_string()),
            subsystem: Some("Policía".to_string()),
        }
    }

    fn new_payment(enrollment: crate::records::EnrollmentId) -> NewPayment {
        NewPayment {
            enrollment_id: enrollment,
            course_label: Some("CBPEA".to_string()),
            amount_deposited: 55.5,
            confirmed: true,
            verified: false,
            badge: true,
            coin: false,
            delivered: false,
            observation: None,
            edited_by: None,
            receipt_url: Some("http://localhost/uploads/pagos/a.png".to_string()),
        }
    }

    #[test]
    fn reopening_keeps_schema_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("academy.db");
        {
            let store = SqliteStore::open(&path).expect("first open");
            seed_course(&store);
        }
        let store = SqliteStore::open(&path).expect("second open");
        let version: u32 = store
            .conn()
            .expect("conn")
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("version");
        assert_eq!(version, migrations::CURRENT_VERSION);
        assert_eq!(store.courses().expect("courses").len(), 1);
    }

    #[test]
    fn person_email_is_unique() {
        let (_dir, store) = open_temp();
        store
            .insert_person(new_person("maria@example.org", "1700000001"))
            .expect("insert");
        match store.insert_person(new_person("maria@example.org", "1700000002")) {
            Err(StoreError::Conflict) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn profile_update_keeps_unspecified_fields() {
        let (_dir, store) = open_temp();
        let person = store
            .insert_person(new_person("maria@example.org", "1700000001"))
            .expect("insert");
        let updated = store
            .update_profile(
                person.id,
                &ProfileUpdate {
                    grade: Some("Cabo".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .expect("update");
        assert_eq!(updated.grade.as_deref(), Some("Cabo"));
        assert_eq!(updated.phone.as_deref(), Some("0991111111"));
        assert_eq!(
            store
                .person_by_national_id("1700000001")
                .expect("lookup")
                .map(|row| row.id),
            Some(person.id)
        );
    }

    #[test]
    fn external_id_is_written_once() {
        let (_dir, store) = open_temp();
        let person = store
            .insert_person(new_person("maria@example.org", "1700000001"))
            .expect("insert");
        store.assign_external_id(person.id, "42").expect("assign");
        let again = store.assign_external_id(person.id, "77").expect("assign");
        assert_eq!(again.external_id.as_deref(), Some("42"));
    }

    #[test]
    fn enrollment_pair_conflicts_and_unknown_person_is_not_found() {
        let (_dir, store) = open_temp();
        let course = seed_course(&store);
        let person = store
            .insert_person(new_person("maria@example.org", "1700000001"))
            .expect("insert");
        let new = NewEnrollment {
            person_id: person.id,
            course_id: course.id,
            accepted: true,
            course_label: Some("CBPEA".to_string()),
        };
        let first = store.insert_enrollment(new.clone()).expect("enroll");
        assert!(matches!(
            store.insert_enrollment(new.clone()),
            Err(StoreError::Conflict)
        ));
        assert_eq!(
            store
                .find_enrollment(person.id, course.id)
                .expect("find")
                .map(|row| row.id),
            Some(first.id)
        );

        let orphan = NewEnrollment {
            person_id: crate::records::PersonId(9999),
            ..new
        };
        assert!(matches!(
            store.insert_enrollment(orphan),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn observation_filter_and_updates() {
        let (_dir, store) = open_temp();
        let course = seed_course(&store);
        let person = store
            .insert_person(new_person("maria@example.org", "1700000001"))
            .expect("insert");
        let enrollment = store
            .insert_enrollment(NewEnrollment {
                person_id: person.id,
                course_id: course.id,
                accepted: false,
                course_label: Some("CBPEA".to_string()),
            })
            .expect("enroll");

        let filter = EnrollmentFilter {
            with_observation: true,
            ..EnrollmentFilter::default()
        };
        assert!(store.enrollments(&filter).expect("list").is_empty());

        store
            .update_enrollment(
                enrollment.id,
                &EnrollmentPatch {
                    observation: Some("Falta cédula".to_string()),
                    edited_by: Some("secretaria".to_string()),
                    ..EnrollmentPatch::default()
                },
            )
            .expect("patch");

        let rows = store.enrollments(&filter).expect("list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].person.email, "maria@example.org");
        assert_eq!(rows[0].enrollment.edited_by.as_deref(), Some("secretaria"));

        let by_other_editor = EnrollmentFilter {
            edited_by: Some("admin".to_string()),
            ..filter
        };
        assert!(store.enrollments(&by_other_editor).expect("list").is_empty());
    }

    #[test]
    fn payment_listing_filters_and_searches() {
        let (_dir, store) = open_temp();
        let course = seed_course(&store);
        let person = store
            .insert_person(new_person("maria@example.org", "1700000001"))
            .expect("insert");
        let enrollment = store
            .insert_enrollment(NewEnrollment {
                person_id: person.id,
                course_id: course.id,
                accepted: true,
                course_label: Some("CBPEA".to_string()),
            })
            .expect("enroll");
        let payment = store
            .insert_payment(new_payment(enrollment.id))
            .expect("payment");

        let searched = store
            .payments(&PaymentFilter {
                search: Some("QUISH".to_string()),
                badge: Some(true),
                ..PaymentFilter::default()
            })
            .expect("list");
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].payment.id, payment.id);
        assert_eq!(searched[0].enrollment.course_label.as_deref(), Some("CBPEA"));

        let unverified_only = PaymentFilter {
            verified: Some(true),
            ..PaymentFilter::default()
        };
        assert!(store.payments(&unverified_only).expect("list").is_empty());

        let future = PaymentFilter {
            created: TimeWindow {
                from: Some(Utc::now() + chrono::Duration::days(1)),
                until: None,
            },
            ..PaymentFilter::default()
        };
        assert!(store.payments(&future).expect("list").is_empty());

        let updated = store
            .update_payment(
                payment.id,
                &PaymentPatch {
                    verified: Some(true),
                    ..PaymentPatch::default()
                },
            )
            .expect("patch");
        assert!(updated.verified);
        assert_eq!(updated.amount_deposited, 55.5);
        assert_eq!(
            store.payments_for_enrollment(enrollment.id).expect("list").len(),
            1
        );

        let removed = store.delete_payment(payment.id).expect("delete");
        assert_eq!(removed.map(|row| row.id), Some(payment.id));
        assert!(store.delete_payment(payment.id).expect("delete").is_none());
    }

    #[test]
    fn payment_for_missing_enrollment_is_not_found() {
        let (_dir, store) = open_temp();
        match store.insert_payment(new_payment(crate::records::EnrollmentId(404))) {
            Err(StoreError::NotFound) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn course_upsert_renames_by_shortname() {
        let (_dir, store) = open_temp();
        seed_course(&store);
        let renamed = store
            .upsert_course(&Course {
                id: CourseId(99),
                shortname: "cbpea".to_string(),
                name: "Curso básico 2025".to_string(),
            })
            .expect("upsert");
        assert_eq!(renamed.id, CourseId(7));
        assert_eq!(renamed.name, "Curso básico 2025");
    }

    #[test]
    fn certificates_replace_by_pair() {
        let (_dir, store) = open_temp();
        let mut certificate = Certificate {
            national_id: "1700000001".to_string(),
            course_label: "CBPEA".to_string(),
            url: "https://certs.example.org/1.pdf".to_string(),
        };
        store.record_certificate(&certificate).expect("record");
        certificate.url = "https://certs.example.org/2.pdf".to_string();
        store.record_certificate(&certificate).expect("replace");

        assert_eq!(store.certificates().expect("list").len(), 1);
        let found = store
            .certificate("1700000001", "CBPEA")
            .expect("lookup")
            .expect("present");
        assert_eq!(found.url, "https://certs.example.org/2.pdf");
    }

    #[test]
    fn contact_messages_crud() {
        let (_dir, store) = open_temp();
        let message = store
            .insert_contact(NewContactMessage {
                name: "Carla".to_string(),
                email: "carla@example.org".to_string(),
                phone: None,
                message: "¿Hay cupos?".to_string(),
            })
            .expect("insert");
        let edited = store
            .update_contact(
                message.id,
                &ContactPatch {
                    phone: Some("022222222".to_string()),
                    ..ContactPatch::default()
                },
            )
            .expect("update");
        assert_eq!(edited.phone.as_deref(), Some("022222222"));
        assert_eq!(edited.message, "¿Hay cupos?");
        assert_eq!(store.contacts().expect("list").len(), 1);
        assert!(store.delete_contact(message.id).expect("delete"));
        assert!(!store.delete_contact(message.id).expect("delete"));
        assert!(store.contact(message.id).expect("get").is_none());
    }
}
