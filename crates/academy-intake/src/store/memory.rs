use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::filter::{EnrollmentFilter, PaymentFilter};
use super::{
    CertificateStore, ContactStore, CourseStore, EnrollmentStore, PaymentStore, PersonStore,
    StoreError,
};
use crate::records::{
    Certificate, ContactId, ContactMessage, ContactPatch, Course, CourseId, Enrollment,
    EnrollmentId, EnrollmentPatch, EnrollmentRef, EnrollmentView, NewContactMessage,
    NewEnrollment, NewPayment, NewPerson, Payment, PaymentId, PaymentPatch, PaymentView, Person,
    PersonId, ProfileUpdate,
};

/// Process-local store used by tests and `--ephemeral` runs. Enforces the
/// same uniqueness rules as the SQLite schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    people: BTreeMap<PersonId, Person>,
    courses: BTreeMap<CourseId, Course>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    payments: BTreeMap<PaymentId, Payment>,
    certificates: Vec<Certificate>,
    contacts: BTreeMap<ContactId, ContactMessage>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn enrollment_view(&self, enrollment: &Enrollment) -> Option<EnrollmentView> {
        let person = self.people.get(&enrollment.person_id)?;
        Some(EnrollmentView {
            enrollment: enrollment.clone(),
            person: person.summary(),
        })
    }

    fn payment_view(&self, payment: &Payment) -> Option<PaymentView> {
        let enrollment = self.enrollments.get(&payment.enrollment_id)?;
        let person = self.people.get(&enrollment.person_id)?;
        Some(PaymentView {
            payment: payment.clone(),
            enrollment: EnrollmentRef {
                id: enrollment.id,
                person_id: enrollment.person_id,
                course_label: enrollment.course_label.clone(),
            },
            person: person.summary(),
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store preloaded with a course catalog.
    pub fn with_courses(courses: impl IntoIterator<Item = Course>) -> Self {
        let store = Self::default();
        if let Ok(mut tables) = store.tables.lock() {
            for course in courses {
                tables.next_id = tables.next_id.max(course.id.0);
                tables.courses.insert(course.id, course);
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, i64)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl PersonStore for MemoryStore {
    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        Ok(self.lock()?.people.get(&id).cloned())
    }

    fn person_by_email(&self, email: &str) -> Result<Option<Person>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .people
            .values()
            .find(|person| person.email == email)
            .cloned())
    }

    fn person_by_national_id(&self, national_id: &str) -> Result<Option<Person>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .people
            .values()
            .find(|person| person.national_id.as_deref() == Some(national_id))
            .cloned())
    }

    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError> {
        let mut tables = self.lock()?;
        if tables.people.values().any(|row| row.email == person.email) {
            return Err(StoreError::Conflict);
        }
        let now = Utc::now();
        let id = PersonId(tables.next_id());
        let row = Person {
            id,
            email: person.email,
            national_id: person.national_id,
            first_name: person.first_name,
            last_name: person.last_name,
            phone: person.phone,
            grade: person.grade,
            subsystem: person.subsystem,
            external_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.people.insert(id, row.clone());
        Ok(row)
    }

    fn update_profile(&self, id: PersonId, update: &ProfileUpdate) -> Result<Person, StoreError> {
        let mut tables = self.lock()?;
        let person = tables.people.get_mut(&id).ok_or(StoreError::NotFound)?;
        person.apply_profile(update, Utc::now());
        Ok(person.clone())
    }

    fn assign_external_id(&self, id: PersonId, external_id: &str) -> Result<Person, StoreError> {
        let mut tables = self.lock()?;
        let person = tables.people.get_mut(&id).ok_or(StoreError::NotFound)?;
        if person.external_id.is_none() {
            person.external_id = Some(external_id.to_string());
            person.updated_at = Utc::now();
        }
        Ok(person.clone())
    }
}

impl CourseStore for MemoryStore {
    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    fn courses(&self) -> Result<Vec<Course>, StoreError> {
        Ok(self.lock()?.courses.values().cloned().collect())
    }

    fn upsert_course(&self, course: &Course) -> Result<Course, StoreError> {
        let mut tables = self.lock()?;
        if let Some(existing) = tables
            .courses
            .values_mut()
            .find(|row| row.shortname == course.shortname)
        {
            existing.name = course.name.clone();
            return Ok(existing.clone());
        }
        if tables.courses.contains_key(&course.id) {
            return Err(StoreError::Conflict);
        }
        tables.next_id = tables.next_id.max(course.id.0);
        tables.courses.insert(course.id, course.clone());
        Ok(course.clone())
    }
}

impl EnrollmentStore for MemoryStore {
    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.lock()?.enrollments.get(&id).cloned())
    }

    fn find_enrollment(
        &self,
        person: PersonId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .enrollments
            .values()
            .find(|row| row.person_id == person && row.course_id == course)
            .cloned())
    }

    fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<Enrollment, StoreError> {
        let mut tables = self.lock()?;
        if tables.enrollments.values().any(|row| {
            row.person_id == enrollment.person_id && row.course_id == enrollment.course_id
        }) {
            return Err(StoreError::Conflict);
        }
        if !tables.people.contains_key(&enrollment.person_id)
            || !tables.courses.contains_key(&enrollment.course_id)
        {
            return Err(StoreError::NotFound);
        }
        let now = Utc::now();
        let id = EnrollmentId(tables.next_id());
        let row = Enrollment {
            id,
            person_id: enrollment.person_id,
            course_id: enrollment.course_id,
            accepted: enrollment.accepted,
            course_label: enrollment.course_label,
            observation: None,
            edited_by: None,
            created_at: now,
            updated_at: now,
        };
        tables.enrollments.insert(id, row.clone());
        Ok(row)
    }

    fn update_enrollment(
        &self,
        id: EnrollmentId,
        patch: &EnrollmentPatch,
    ) -> Result<Enrollment, StoreError> {
        let mut tables = self.lock()?;
        let row = tables.enrollments.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.apply(patch, Utc::now());
        Ok(row.clone())
    }

    fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, StoreError> {
        let mut tables = self.lock()?;
        let removed = tables.enrollments.remove(&id).is_some();
        if removed {
            tables.payments.retain(|_, payment| payment.enrollment_id != id);
        }
        Ok(removed)
    }

    fn enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<EnrollmentView>, StoreError> {
        let tables = self.lock()?;
        let mut rows: Vec<EnrollmentView> = tables
            .enrollments
            .values()
            .filter_map(|row| tables.enrollment_view(row))
            .filter(|view| filter.matches(view))
            .collect();
        newest_first(&mut rows, |view| {
            (view.enrollment.created_at, view.enrollment.id.0)
        });
        Ok(rows)
    }

    fn enrollments_for_person(&self, person: PersonId) -> Result<Vec<Enrollment>, StoreError> {
        let tables = self.lock()?;
        let mut rows: Vec<Enrollment> = tables
            .enrollments
            .values()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect();
        newest_first(&mut rows, |row| (row.created_at, row.id.0));
        Ok(rows)
    }
}

impl PaymentStore for MemoryStore {
    fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.lock()?.payments.get(&id).cloned())
    }

    fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut tables = self.lock()?;
        if !tables.enrollments.contains_key(&payment.enrollment_id) {
            return Err(StoreError::NotFound);
        }
        let now = Utc::now();
        let id = PaymentId(tables.next_id());
        let row = Payment {
            id,
            enrollment_id: payment.enrollment_id,
            course_label: payment.course_label,
            amount_deposited: payment.amount_deposited,
            confirmed: payment.confirmed,
            verified: payment.verified,
            badge: payment.badge,
            coin: payment.coin,
            delivered: payment.delivered,
            observation: payment.observation,
            edited_by: payment.edited_by,
            receipt_url: payment.receipt_url,
            created_at: now,
            updated_at: now,
        };
        tables.payments.insert(id, row.clone());
        Ok(row)
    }

    fn update_payment(&self, id: PaymentId, patch: &PaymentPatch) -> Result<Payment, StoreError> {
        let mut tables = self.lock()?;
        let row = tables.payments.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.apply(patch, Utc::now());
        Ok(row.clone())
    }

    fn delete_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.lock()?.payments.remove(&id))
    }

    fn payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentView>, StoreError> {
        let tables = self.lock()?;
        let mut rows: Vec<PaymentView> = tables
            .payments
            .values()
            .filter_map(|row| tables.payment_view(row))
            .filter(|view| filter.matches(view))
            .collect();
        newest_first(&mut rows, |view| (view.payment.created_at, view.payment.id.0));
        Ok(rows)
    }

    fn payments_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Vec<Payment>, StoreError> {
        let tables = self.lock()?;
        let mut rows: Vec<Payment> = tables
            .payments
            .values()
            .filter(|row| row.enrollment_id == enrollment)
            .cloned()
            .collect();
        newest_first(&mut rows, |row| (row.created_at, row.id.0));
        Ok(rows)
    }
}

impl CertificateStore for MemoryStore {
    fn certificate(
        &self,
        national_id: &str,
        course_label: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        let tables = self.lock()?;
        Ok(tables
            .certificates
            .iter()
            .find(|row| row.national_id == national_id && row.course_label == course_label)
            .cloned())
    }

    fn certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        Ok(self.lock()?.certificates.clone())
    }

    fn record_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        let mut tables = self.lock()?;
        tables.certificates.retain(|row| {
            !(row.national_id == certificate.national_id
                && row.course_label == certificate.course_label)
        });
        tables.certificates.push(certificate.clone());
        Ok(())
    }
}

impl ContactStore for MemoryStore {
    fn contact(&self, id: ContactId) -> Result<Option<ContactMessage>, StoreError> {
        Ok(self.lock()?.contacts.get(&id).cloned())
    }

    fn contacts(&self) -> Result<Vec<ContactMessage>, StoreError> {
        let tables = self.lock()?;
        let mut rows: Vec<ContactMessage> = tables.contacts.values().cloned().collect();
        newest_first(&mut rows, |row| (row.created_at, row.id.0));
        Ok(rows)
    }

    fn insert_contact(&self, message: NewContactMessage) -> Result<ContactMessage, StoreError> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        let id = ContactId(tables.next_id());
        let row = ContactMessage {
            id,
            name: message.name,
            email: message.email,
            phone: message.phone,
            message: message.message,
            created_at: now,
            updated_at: now,
        };
        tables.contacts.insert(id, row.clone());
        Ok(row)
    }

    fn update_contact(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<ContactMessage, StoreError> {
        let mut tables = self.lock()?;
        let row = tables.contacts.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.apply(patch, Utc::now());
        Ok(row.clone())
    }

    fn delete_contact(&self, id: ContactId) -> Result<bool, StoreError> {
        Ok(self.lock()?.contacts.remove(&id).is_some())
    }
}
