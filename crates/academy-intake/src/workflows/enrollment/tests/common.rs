use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;
use tempfile::TempDir;

use crate::config::LmsConfig;
use crate::integrations::{
    EnrollmentRegistry, RegistrationOutcome, RegistrationReceipt, RegistrationRequest,
    RegistryError,
};
use crate::records::{
    Certificate, ContactId, ContactMessage, ContactPatch, Course, CourseId, Enrollment,
    EnrollmentId, EnrollmentPatch, EnrollmentView, NewContactMessage, NewEnrollment, NewPayment,
    NewPerson, Payment, PaymentId, PaymentPatch, PaymentView, Person, PersonId, ProfileUpdate,
};
use crate::store::{
    CertificateStore, ContactStore, CourseStore, EnrollmentFilter, EnrollmentStore,
    MemoryStore, PaymentFilter, PaymentStore, PersonStore, RecordStore, StoreError,
};
use crate::workflows::enrollment::{EnrollmentRequest, EnrollmentService, EnrollmentSettings};
use crate::workflows::payments::ReceiptStore;
pub(super) use crate::workflows::test_support::{RecordingEvents, RecordingMailer};

pub(super) fn course() -> Course {
    Course {
        id: CourseId(7),
        shortname: "cbpea".to_string(),
        name: "Curso básico de policía".to_string(),
    }
}

pub(super) fn second_course() -> Course {
    Course {
        id: CourseId(8),
        shortname: "avz".to_string(),
        name: "Curso avanzado".to_string(),
    }
}

pub(super) fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_courses([course(), second_course()]))
}

pub(super) fn settings() -> EnrollmentSettings {
    EnrollmentSettings {
        lms: LmsConfig {
            url: Some("https://campus.example.org".to_string()),
            token: Some("token".to_string()),
            student_role_id: 5,
            timeout: Duration::from_millis(200),
            password_prefix: "Mp".to_string(),
            password_suffix: "*".to_string(),
        },
        brand: "Academy".to_string(),
    }
}

pub(super) fn request() -> EnrollmentRequest {
    EnrollmentRequest {
        email: Some("a@x.com".to_string()),
        course_id: Some(CourseId(7)),
        national_id: Some("1712345678".to_string()),
        first_name: Some("Ana".to_string()),
        last_name: Some("Paredes".to_string()),
        phone: Some("0991234567".to_string()),
        grade: Some("Cabo".to_string()),
        subsystem: Some("Preventivo".to_string()),
        course_label: Some("CBPEA-2025".to_string()),
        accepted: true,
    }
}

#[derive(Debug, Clone)]
pub(super) enum Script {
    Confirm {
        remote_person_id: &'static str,
        created_person: bool,
    },
    Decline(&'static str),
    Fail,
    Hang,
}

pub(super) struct ScriptedRegistry {
    script: Mutex<Script>,
    calls: Mutex<Vec<RegistrationRequest>>,
}

impl ScriptedRegistry {
    pub(super) fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn confirming(remote_person_id: &'static str) -> Self {
        Self::new(Script::Confirm {
            remote_person_id,
            created_person: true,
        })
    }

    pub(super) fn set_script(&self, script: Script) {
        *self.script.lock().expect("script mutex poisoned") = script;
    }

    pub(super) fn calls(&self) -> Vec<RegistrationRequest> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait]
impl EnrollmentRegistry for ScriptedRegistry {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistryError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(request);
        let script = self.script.lock().expect("script mutex poisoned").clone();
        match script {
            Script::Confirm {
                remote_person_id,
                created_person,
            } => Ok(RegistrationOutcome::Confirmed(RegistrationReceipt {
                remote_person_id: remote_person_id.to_string(),
                remote_course_id: 31,
                created_person,
            })),
            Script::Decline(reason) => Ok(RegistrationOutcome::Declined {
                reason: reason.to_string(),
            }),
            Script::Fail => Err(RegistryError::Transport("connection refused".to_string())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(RegistryError::Transport("unreachable".to_string()))
            }
        }
    }
}

pub(super) struct Harness<S> {
    pub(super) service: Arc<EnrollmentService<S>>,
    pub(super) store: Arc<S>,
    pub(super) registry: Arc<ScriptedRegistry>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) events: Arc<RecordingEvents>,
    pub(super) receipts: Arc<ReceiptStore>,
    pub(super) uploads: TempDir,
}

impl<S> Harness<S> {
    pub(super) fn receipt_files(&self) -> usize {
        std::fs::read_dir(self.uploads.path().join("pagos"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub(super) fn harness(registry: ScriptedRegistry) -> Harness<MemoryStore> {
    harness_with(seeded_store(), registry, RecordingMailer::default())
}

pub(super) fn harness_with<S>(
    store: Arc<S>,
    registry: ScriptedRegistry,
    mailer: RecordingMailer,
) -> Harness<S>
where
    S: RecordStore + 'static,
{
    let registry = Arc::new(registry);
    let mailer = Arc::new(mailer);
    let events = Arc::new(RecordingEvents::default());
    let uploads = tempfile::tempdir().expect("tempdir");
    let receipts = Arc::new(ReceiptStore::new(uploads.path(), "https://api.example.org"));
    let service = Arc::new(EnrollmentService::new(
        store.clone(),
        registry.clone(),
        mailer.clone(),
        events.clone(),
        receipts.clone(),
        settings(),
    ));
    Harness {
        service,
        store,
        registry,
        mailer,
        events,
        receipts,
        uploads,
    }
}

pub(super) fn enrollment_count<S: RecordStore>(store: &S) -> usize {
    store
        .enrollments(&EnrollmentFilter::default())
        .expect("list enrollments")
        .len()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store that lets a simulated concurrent writer commit between the
/// service's existence check and its insert.
pub(super) struct RacingStore {
    pub(super) inner: MemoryStore,
    person_race: AtomicBool,
    enrollment_race: AtomicBool,
}

impl RacingStore {
    pub(super) fn new() -> Self {
        Self {
            inner: MemoryStore::with_courses([course()]),
            person_race: AtomicBool::new(false),
            enrollment_race: AtomicBool::new(false),
        }
    }

    /// Next email lookup misses, then another writer inserts that email.
    pub(super) fn race_next_person(&self) {
        self.person_race.store(true, Ordering::SeqCst);
    }

    /// Next enrollment lookup misses, then another writer inserts the pair.
    pub(super) fn race_next_enrollment(&self) {
        self.enrollment_race.store(true, Ordering::SeqCst);
    }
}

impl PersonStore for RacingStore {
    fn person(&self, id: PersonId) -> Result<Option<Person>, StoreError> {
        self.inner.person(id)
    }

    fn person_by_email(&self, email: &str) -> Result<Option<Person>, StoreError> {
        if self.person_race.swap(false, Ordering::SeqCst) {
            self.inner.insert_person(NewPerson {
                email: email.to_string(),
                national_id: None,
                first_name: Some("Winner".to_string()),
                last_name: None,
                phone: None,
                grade: None,
                subsystem: None,
            })?;
            return Ok(None);
        }
        self.inner.person_by_email(email)
    }

    fn person_by_national_id(&self, national_id: &str) -> Result<Option<Person>, StoreError> {
        self.inner.person_by_national_id(national_id)
    }

    fn insert_person(&self, person: NewPerson) -> Result<Person, StoreError> {
        self.inner.insert_person(person)
    }

    fn update_profile(&self, id: PersonId, update: &ProfileUpdate) -> Result<Person, StoreError> {
        self.inner.update_profile(id, update)
    }

    fn assign_external_id(&self, id: PersonId, external_id: &str) -> Result<Person, StoreError> {
        self.inner.assign_external_id(id, external_id)
    }
}

impl CourseStore for RacingStore {
    fn course(&self, id: CourseId) -> Result<Option<Course>, StoreError> {
        self.inner.course(id)
    }

    fn courses(&self) -> Result<Vec<Course>, StoreError> {
        self.inner.courses()
    }

    fn upsert_course(&self, course: &Course) -> Result<Course, StoreError> {
        self.inner.upsert_course(course)
    }
}

impl EnrollmentStore for RacingStore {
    fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        self.inner.enrollment(id)
    }

    fn find_enrollment(
        &self,
        person: PersonId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        if self.enrollment_race.swap(false, Ordering::SeqCst) {
            self.inner.insert_enrollment(NewEnrollment {
                person_id: person,
                course_id: course,
                accepted: false,
                course_label: Some("winner".to_string()),
            })?;
            return Ok(None);
        }
        self.inner.find_enrollment(person, course)
    }

    fn insert_enrollment(&self, enrollment: NewEnrollment) -> Result<Enrollment, StoreError> {
        self.inner.insert_enrollment(enrollment)
    }

    fn update_enrollment(
        &self,
        id: EnrollmentId,
        patch: &EnrollmentPatch,
    ) -> Result<Enrollment, StoreError> {
        self.inner.update_enrollment(id, patch)
    }

    fn delete_enrollment(&self, id: EnrollmentId) -> Result<bool, StoreError> {
        self.inner.delete_enrollment(id)
    }

    fn enrollments(&self, filter: &EnrollmentFilter) -> Result<Vec<EnrollmentView>, StoreError> {
        self.inner.enrollments(filter)
    }

    fn enrollments_for_person(&self, person: PersonId) -> Result<Vec<Enrollment>, StoreError> {
        self.inner.enrollments_for_person(person)
    }
}

impl PaymentStore for RacingStore {
    fn payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        self.inner.payment(id)
    }

    fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        self.inner.insert_payment(payment)
    }

    fn update_payment(&self, id: PaymentId, patch: &PaymentPatch) -> Result<Payment, StoreError> {
        self.inner.update_payment(id, patch)
    }

    fn delete_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        self.inner.delete_payment(id)
    }

    fn payments(&self, filter: &PaymentFilter) -> Result<Vec<PaymentView>, StoreError> {
        self.inner.payments(filter)
    }

    fn payments_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Vec<Payment>, StoreError> {
        self.inner.payments_for_enrollment(enrollment)
    }
}

impl CertificateStore for RacingStore {
    fn certificate(
        &self,
        national_id: &str,
        course_label: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        self.inner.certificate(national_id, course_label)
    }

    fn certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        self.inner.certificates()
    }

    fn record_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        self.inner.record_certificate(certificate)
    }
}

impl ContactStore for RacingStore {
    fn contact(&self, id: ContactId) -> Result<Option<ContactMessage>, StoreError> {
        self.inner.contact(id)
    }

    fn contacts(&self) -> Result<Vec<ContactMessage>, StoreError> {
        self.inner.contacts()
    }

    fn insert_contact(&self, message: NewContactMessage) -> Result<ContactMessage, StoreError> {
        self.inner.insert_contact(message)
    }

    fn update_contact(
        &self,
        id: ContactId,
        patch: &ContactPatch,
    ) -> Result<ContactMessage, StoreError> {
        self.inner.update_contact(id, patch)
    }

    fn delete_contact(&self, id: ContactId) -> Result<bool, StoreError> {
        self.inner.delete_contact(id)
    }
}

/// Store whose every call fails, for 500 mapping.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl PersonStore for UnavailableStore {
    fn person(&self, _id: PersonId) -> Result<Option<Person>, StoreError> {
        offline()
    }
    fn person_by_email(&self, _email: &str) -> Result<Option<Person>, StoreError> {
        offline()
    }
    fn person_by_national_id(&self, _national_id: &str) -> Result<Option<Person>, StoreError> {
        offline()
    }
    fn insert_person(&self, _person: NewPerson) -> Result<Person, StoreError> {
        offline()
    }
    fn update_profile(&self, _id: PersonId, _update: &ProfileUpdate) -> Result<Person, StoreError> {
        offline()
    }
    fn assign_external_id(&self, _id: PersonId, _external_id: &str) -> Result<Person, StoreError> {
        offline()
    }
}

impl CourseStore for UnavailableStore {
    fn course(&self, _id: CourseId) -> Result<Option<Course>, StoreError> {
        offline()
    }
    fn courses(&self) -> Result<Vec<Course>, StoreError> {
        offline()
    }
    fn upsert_course(&self, _course: &Course) -> Result<Course, StoreError> {
        offline()
    }
}

impl EnrollmentStore for UnavailableStore {
    fn enrollment(&self, _id: EnrollmentId) -> Result<Option<Enrollment>, StoreError> {
        offline()
    }
    fn find_enrollment(
        &self,
        _person: PersonId,
        _course: CourseId,
    ) -> Result<Option<Enrollment>, StoreError> {
        offline()
    }
    fn insert_enrollment(&self, _enrollment: NewEnrollment) -> Result<Enrollment, StoreError> {
        offline()
    }
    fn update_enrollment(
        &self,
        _id: EnrollmentId,
        _patch: &EnrollmentPatch,
    ) -> Result<Enrollment, StoreError> {
        offline()
    }
    fn delete_enrollment(&self, _id: EnrollmentId) -> Result<bool, StoreError> {
        offline()
    }
    fn enrollments(&self, _filter: &EnrollmentFilter) -> Result<Vec<EnrollmentView>, StoreError> {
        offline()
    }
    fn enrollments_for_person(&self, _person: PersonId) -> Result<Vec<Enrollment>, StoreError> {
        offline()
    }
}

impl PaymentStore for UnavailableStore {
    fn payment(&self, _id: PaymentId) -> Result<Option<Payment>, StoreError> {
        offline()
    }
    fn insert_payment(&self, _payment: NewPayment) -> Result<Payment, StoreError> {
        offline()
    }
    fn update_payment(&self, _id: PaymentId, _patch: &PaymentPatch) -> Result<Payment, StoreError> {
        offline()
    }
    fn delete_payment(&self, _id: PaymentId) -> Result<Option<Payment>, StoreError> {
        offline()
    }
    fn payments(&self, _filter: &PaymentFilter) -> Result<Vec<PaymentView>, StoreError> {
        offline()
    }
    fn payments_for_enrollment(
        &self,
        _enrollment: EnrollmentId,
    ) -> Result<Vec<Payment>, StoreError> {
        offline()
    }
}

impl CertificateStore for UnavailableStore {
    fn certificate(
        &self,
        _national_id: &str,
        _course_label: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        offline()
    }
    fn certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        offline()
    }
    fn record_certificate(&self, _certificate: &Certificate) -> Result<(), StoreError> {
        offline()
    }
}

impl ContactStore for UnavailableStore {
    fn contact(&self, _id: ContactId) -> Result<Option<ContactMessage>, StoreError> {
        offline()
    }
    fn contacts(&self) -> Result<Vec<ContactMessage>, StoreError> {
        offline()
    }
    fn insert_contact(&self, _message: NewContactMessage) -> Result<ContactMessage, StoreError> {
        offline()
    }
    fn update_contact(
        &self,
        _id: ContactId,
        _patch: &ContactPatch,
    ) -> Result<ContactMessage, StoreError> {
        offline()
    }
    fn delete_contact(&self, _id: ContactId) -> Result<bool, StoreError> {
        offline()
    }
}
