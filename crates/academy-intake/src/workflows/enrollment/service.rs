use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{
    EnrollmentOutcome, EnrollmentRequest, EnrollmentSettings, RegistrationStatus,
    ValidEnrollment,
};
use super::templates::confirmation_email;
use crate::integrations::{
    DomainEvent, EnrollmentRegistry, EventSink, Notifier, RegistrationOutcome,
    RegistrationReceipt, RegistrationRequest,
};
use crate::records::{
    Course, CourseId, Enrollment, EnrollmentId, EnrollmentPatch, EnrollmentView, NewEnrollment,
    Person,
};
use crate::store::{EnrollmentFilter, RecordStore, StoreError};
use crate::workflows::payments::ReceiptStore;

/// Coordinates local enrollment state with the LMS.
///
/// A local enrollment row is only written after the LMS confirms the
/// registration. LMS and email failures are folded into the outcome; only
/// validation, a missing course and store failures surface as errors.
pub struct EnrollmentService<S> {
    store: Arc<S>,
    registry: Arc<dyn EnrollmentRegistry>,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn EventSink>,
    receipts: Arc<ReceiptStore>,
    settings: EnrollmentSettings,
}

impl<S> EnrollmentService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        registry: Arc<dyn EnrollmentRegistry>,
        notifier: Arc<dyn Notifier>,
        events: Arc<dyn EventSink>,
        receipts: Arc<ReceiptStore>,
        settings: EnrollmentSettings,
    ) -> Self {
        Self {
            store,
            registry,
            notifier,
            events,
            receipts,
            settings,
        }
    }

    /// Runs one enrollment attempt. Safe to retry: repeated calls converge
    /// on a single person and a single enrollment row. Pending outcomes send
    /// no email.
    pub async fn enroll(
        &self,
        request: EnrollmentRequest,
    ) -> Result<EnrollmentOutcome, EnrollmentError> {
        let request = request.validate().map_err(EnrollmentError::Validation)?;

        let course = self
            .store
            .course(request.course_id)?
            .ok_or(EnrollmentError::CourseNotFound(request.course_id))?;

        let (person, person_created) = self.upsert_person(&request)?;

        let registration = self.register(&person, &course).await;
        let Some(receipt) = registration.receipt().cloned() else {
            let message = pending_message(&registration);
            return Ok(EnrollmentOutcome {
                enrollment: None,
                person,
                course,
                person_created,
                registration,
                notified: false,
                message,
            });
        };

        let person = match person.external_id {
            Some(_) => person,
            None => self
                .store
                .assign_external_id(person.id, &receipt.remote_person_id)?,
        };

        let enrollment = self.find_or_create_enrollment(&person, &course, &request)?;
        let notified = self.notify(&person, &course, &receipt).await;

        self.events.publish(DomainEvent::EnrollmentCreated {
            enrollment: enrollment.clone(),
            person: person.clone(),
            course: course.clone(),
        });
        info!(
            enrollment_id = %enrollment.id,
            person_id = %person.id,
            course = %course.shortname,
            notified,
            "enrollment confirmed"
        );

        Ok(EnrollmentOutcome {
            enrollment: Some(enrollment),
            person,
            course,
            person_created,
            registration,
            notified,
            message: "enrollment registered".to_string(),
        })
    }

    pub fn list(&self) -> Result<Vec<EnrollmentView>, EnrollmentError> {
        Ok(self.store.enrollments(&EnrollmentFilter::default())?)
    }

    pub fn get(&self, id: EnrollmentId) -> Result<EnrollmentView, EnrollmentError> {
        let enrollment = self
            .store
            .enrollment(id)?
            .ok_or(EnrollmentError::NotFound(id))?;
        let person = self
            .store
            .person(enrollment.person_id)?
            .ok_or(StoreError::NotFound)?;
        Ok(EnrollmentView {
            enrollment,
            person: person.summary(),
        })
    }

    pub fn update(
        &self,
        id: EnrollmentId,
        patch: EnrollmentPatch,
    ) -> Result<Enrollment, EnrollmentError> {
        let enrollment = match self.store.update_enrollment(id, &patch) {
            Ok(enrollment) => enrollment,
            Err(StoreError::NotFound) => return Err(EnrollmentError::NotFound(id)),
            Err(err) => return Err(err.into()),
        };
        self.events.publish(DomainEvent::EnrollmentUpdated {
            enrollment: enrollment.clone(),
        });
        Ok(enrollment)
    }

    /// Returns whether a row was removed. Payments go with the enrollment;
    /// their receipt files are removed on a best-effort basis.
    pub async fn delete(&self, id: EnrollmentId) -> Result<bool, EnrollmentError> {
        let payments = self.store.payments_for_enrollment(id)?;
        if !self.store.delete_enrollment(id)? {
            return Ok(false);
        }
        for payment in payments {
            let Some(url) = payment.receipt_url else {
                continue;
            };
            if let Err(err) = self.receipts.remove_url(&url).await {
                warn!(
                    enrollment_id = %id,
                    payment_id = %payment.id,
                    error = %err,
                    "failed to remove payment receipt"
                );
            }
        }
        Ok(true)
    }

    fn upsert_person(&self, request: &ValidEnrollment) -> Result<(Person, bool), EnrollmentError> {
        let profile = request.profile_update();
        if let Some(existing) = self.store.person_by_email(&request.email)? {
            let person = self.store.update_profile(existing.id, &profile)?;
            return Ok((person, false));
        }

        match self.store.insert_person(request.new_person()) {
            Ok(person) => Ok((person, true)),
            // A concurrent attempt created the same email first.
            Err(StoreError::Conflict) => {
                let winner = self
                    .store
                    .person_by_email(&request.email)?
                    .ok_or(StoreError::NotFound)?;
                let person = self.store.update_profile(winner.id, &profile)?;
                Ok((person, false))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn register(&self, person: &Person, course: &Course) -> RegistrationStatus {
        let request = RegistrationRequest {
            national_id: person.national_id.clone(),
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
            email: person.email.clone(),
            course_shortname: course.shortname.clone(),
        };
        let timeout = self.settings.registry_timeout();

        match tokio::time::timeout(timeout, self.registry.register(request)).await {
            Ok(Ok(RegistrationOutcome::Confirmed(receipt))) => {
                RegistrationStatus::Confirmed(receipt)
            }
            Ok(Ok(RegistrationOutcome::Declined { reason })) => {
                warn!(
                    person_id = %person.id,
                    course = %course.shortname,
                    %reason,
                    "LMS declined registration, enrollment left pending"
                );
                RegistrationStatus::Declined { reason }
            }
            Ok(Err(err)) => {
                warn!(
                    person_id = %person.id,
                    course = %course.shortname,
                    error = %err,
                    "LMS registration failed, enrollment left pending"
                );
                RegistrationStatus::Failed {
                    reason: err.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    person_id = %person.id,
                    course = %course.shortname,
                    timeout_secs = timeout.as_secs(),
                    "LMS registration timed out, enrollment left pending"
                );
                RegistrationStatus::TimedOut {
                    after_secs: timeout.as_secs(),
                }
            }
        }
    }

    fn find_or_create_enrollment(
        &self,
        person: &Person,
        course: &Course,
        request: &ValidEnrollment,
    ) -> Result<Enrollment, EnrollmentError> {
        if let Some(existing) = self.store.find_enrollment(person.id, course.id)? {
            return Ok(existing);
        }

        let new = NewEnrollment {
            person_id: person.id,
            course_id: course.id,
            accepted: request.accepted,
            course_label: request.course_label.clone(),
        };
        match self.store.insert_enrollment(new) {
            Ok(enrollment) => Ok(enrollment),
            // Lost the race on UNIQUE(person, course): reuse the winner's row.
            Err(StoreError::Conflict) => Ok(self
                .store
                .find_enrollment(person.id, course.id)?
                .ok_or(StoreError::NotFound)?),
            Err(err) => Err(err.into()),
        }
    }

    async fn notify(&self, person: &Person, course: &Course, receipt: &RegistrationReceipt) -> bool {
        let email = confirmation_email(&self.settings, person, course, receipt);
        match self.notifier.send(email).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    person_id = %person.id,
                    error = %err,
                    "enrollment confirmation email failed"
                );
                false
            }
        }
    }
}

fn pending_message(status: &RegistrationStatus) -> String {
    match status {
        RegistrationStatus::Confirmed(_) => "enrollment registered".to_string(),
        RegistrationStatus::Declined { reason } => {
            format!("enrollment pending: the LMS declined the registration ({reason})")
        }
        RegistrationStatus::Failed { .. } => {
            "enrollment pending: the LMS could not be reached".to_string()
        }
        RegistrationStatus::TimedOut { after_secs } => {
            format!("enrollment pending: the LMS did not answer within {after_secs}s")
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("{0}")]
    Validation(String),
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("enrollment {0} not found")]
    NotFound(EnrollmentId),
    #[error(transparent)]
    Store(#[from] StoreError),
}
