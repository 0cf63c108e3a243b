//! Record storage for people, courses, enrollments, payments, certificates and
//! contact messages.
//!
//! The traits are synchronous: every call is a short critical section and no
//! implementation holds a lock across an `.await`. Services compose them
//! through the [`RecordStore`] umbrella.

pub mod filter;
pub mod memory;
pub mod sqlite;

use crate::records::{
    Certificate, ContactId, ContactMessage, ContactPatch, Course, CourseId, Enrollment,
    EnrollmentId, EnrollmentPatch, EnrollmentView, NewContactMessage, NewEnrollment, NewPayment,
    NewPerson, Payment, PaymentId, PaymentPatch, PaymentView, Person, PersonId, ProfileUpdate,
};

pub use filter::{EnrollmentFilter, PaymentFilter, TimeWindow};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Failures surfaced by a record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("migration error: {0}")]
    Migration(String),
}

pub trait PersonStore: Send + Sync {
    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError>;
    /// Emails are stored normalized, callers pass the normalized form.
    fn person_by_email(&self, email: &str) -> Result<Option<Person>, StoreError>;
    fn person_by_national_id(&self, national_id: &str) -> Result<Option<Person>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError>;
    fn update_profile(&self, id: PersonId, update: &ProfileUpdate)
        -> Result<Person, StoreError>;
    /// Sets the LMS account id only if none is recorded yet and returns the
    /// stored row, so a second writer observes the first value.
    fn assign_external_id(&self, id: PersonId, external_id: &str) -> Result<Person, StoreError>;
}

pub trait CourseStore: Send + Sync {
    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError>;
    fn courses(&self) -> Result<Vec<Course>, StoreError>;
    /// Inserts the course or renames the existing row with the same shortname.
    fn upsert_course(&self, course: &Course) -> Result<Course, StoreError>;
}

pub trait EnrollmentStore: Send + Sync {
    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError>;
    fn find_enrollment(
        &self,
        person: PersonId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the (person, course) pair exists.
    fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<Enrollment, StoreError>;
    fn update_enrollment(
        &self,
        id: EnrollmentId,
        patch: &EnrollmentPatch,
    ) -> Result<Enrollment, StoreError>;
    /// Removes the enrollment and its payments. Returns whether a row existed.
    fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, StoreError>;
    /// Newest first.
    fn enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<EnrollmentView>, StoreError>;
    fn enrollments_for_person(&self, person: PersonId) -> Result<Vec<Enrollment>, StoreError>;
}

pub trait PaymentStore: Send + Sync {
    fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;
    /// Fails with [`StoreError::NotFound`] when the enrollment is missing.
    fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;
    fn update_payment(&self, id: PaymentId, patch: &PaymentPatch) -> Result<Payment, StoreError>;
    /// Returns the removed row so the caller can clean up its receipt.
    fn delete_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;
    /// Newest first.
    fn payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentView>, StoreError>;
    /// Newest first.
    fn payments_for_enrollment(&self, enrollment: EnrollmentId)
        -> Result<Vec<Payment>, StoreError>;
}

pub trait CertificateStore: Send + Sync {
    fn certificate(
        &self,
        national_id: &str,
        course_label: &str,
    ) -> Result<Option<Certificate>, StoreError>;
    fn certificates(&self) -> Result<Vec<Certificate>, StoreError>;
    /// Replaces any certificate already recorded for the same pair.
    fn record_certificate(&self, certificate: &Certificate) -> Result<(), StoreError>;
}

pub trait ContactStore: Send + Sync {
    fn contact(&self, id: ContactId) -> Result<Option<ContactMessage>, StoreError>;
    /// Newest first.
    fn contacts(&self) -> Result<Vec<ContactMessage>, StoreError>;
    fn insert_contact(&self, message: NewContactMessage) -> Result<ContactMessage, StoreError>;
    fn update_contact(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<ContactMessage, StoreError>;
    fn delete_contact(&self, id: ContactId) -> Result<bool, StoreError>;
}

/// Everything the workflows need from persistence.
pub trait RecordStore:
    PersonStore + CourseStore + EnrollmentStore + PaymentStore + CertificateStore + ContactStore
{
}

impl<T> RecordStore for T where
    T: PersonStore
        + CourseStore
        + EnrollmentStore
        + PaymentStore
        + CertificateStore
        + ContactStore
{
}
