use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{PaymentForm, PaymentListing, PaymentQuery, PaymentSettings};
use super::receipts::{ReceiptError, ReceiptStore, StoredReceipt};
use super::templates::payment_registered_email;
use crate::integrations::{DomainEvent, EventSink, Notifier};
use crate::records::{EnrollmentId, Payment, PaymentId, PaymentPatch, Person};
use crate::store::{RecordStore, StoreError};

/// Uploaded receipt file as received from the client.
#[derive(Debug, Clone, Default)]
pub struct ReceiptUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct PaymentService<S> {
    store: Arc<S>,
    receipts: Arc<ReceiptStore>,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn EventSink>,
    settings: PaymentSettings,
}

impl<S> PaymentService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        receipts: Arc<ReceiptStore>,
        notifier: Arc<dyn Notifier>,
        events: Arc<dyn EventSink>,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            receipts,
            notifier,
            events,
            settings,
        }
    }

    pub fn receipts(&self) -> Arc<ReceiptStore> {
        self.receipts.clone()
    }

    /// Stores the receipt, then the payment row. The file is removed again
    /// when the row cannot be written.
    pub async fn create(
        &self,
        form: PaymentForm,
        upload: Option<ReceiptUpload>,
    ) -> Result<Payment, PaymentError> {
        let upload = upload
            .filter(|upload| !upload.bytes.is_empty())
            .ok_or_else(|| PaymentError::Validation("a receipt file is required".to_string()))?;
        let enrollment_id = form.require_enrollment().map_err(PaymentError::Validation)?;

        let stored = self
            .receipts
            .save(upload.file_name.as_deref(), &upload.bytes)
            .await?;

        let enrollment = match self.store.enrollment(enrollment_id) {
            Ok(Some(enrollment)) => enrollment,
            Ok(None) => {
                self.discard(&stored).await;
                return Err(PaymentError::EnrollmentNotFound(enrollment_id));
            }
            Err(err) => {
                self.discard(&stored).await;
                return Err(err.into());
            }
        };

        let payment = match self
            .store
            .insert_payment(form.into_new_payment(enrollment.id, stored.url.clone()))
        {
            Ok(payment) => payment,
            Err(err) => {
                self.discard(&stored).await;
                return Err(match err {
                    // Enrollment deleted between the lookup and the insert.
                    StoreError::NotFound => PaymentError::EnrollmentNotFound(enrollment_id),
                    other => other.into(),
                });
            }
        };

        let notified = self.notify(&payment).await;
        self.events.publish(DomainEvent::PaymentCreated {
            payment: payment.clone(),
        });
        info!(
            payment_id = %payment.id,
            enrollment_id = %payment.enrollment_id,
            notified,
            "payment registered"
        );
        Ok(payment)
    }

    pub fn list(&self, query: PaymentQuery) -> Result<Vec<PaymentListing>, PaymentError> {
        let criteria = query
            .into_criteria(self.settings.offset)
            .map_err(PaymentError::Validation)?;

        let certificates: HashMap<(String, String), String> = self
            .store
            .certificates()?
            .into_iter()
            .map(|cert| ((cert.national_id, cert.course_label), cert.url))
            .collect();

        let listings = self
            .store
            .payments(&criteria.filter)?
            .into_iter()
            .map(|view| {
                let certificate_url = match (
                    view.person.national_id.as_ref(),
                    view.enrollment.course_label.as_ref(),
                ) {
                    (Some(national_id), Some(label)) => certificates
                        .get(&(national_id.clone(), label.clone()))
                        .cloned(),
                    _ => None,
                };
                PaymentListing {
                    has_certificate: certificate_url.is_some(),
                    certificate_url,
                    view,
                }
            })
            .filter(|listing| {
                criteria
                    .certificate
                    .map_or(true, |wanted| listing.has_certificate == wanted)
            })
            .collect();
        Ok(listings)
    }

    pub fn get(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        self.store
            .payment(id)?
            .ok_or(PaymentError::NotFound(id))
    }

    pub fn update(&self, id: PaymentId, patch: PaymentPatch) -> Result<Payment, PaymentError> {
        let payment = match self.store.update_payment(id, &patch) {
            Ok(payment) => payment,
            Err(StoreError::NotFound) => return Err(PaymentError::NotFound(id)),
            Err(err) => return Err(err.into()),
        };
        self.events.publish(DomainEvent::PaymentUpdated {
            payment: payment.clone(),
        });
        Ok(payment)
    }

    /// Deletes the row; the receipt file goes on a best-effort basis.
    pub async fn delete(&self, id: PaymentId) -> Result<Payment, PaymentError> {
        let payment = self
            .store
            .delete_payment(id)?
            .ok_or(PaymentError::NotFound(id))?;
        if let Some(url) = &payment.receipt_url {
            if let Err(err) = self.receipts.remove_url(url).await {
                warn!(payment_id = %id, error = %err, "failed to remove payment receipt");
            }
        }
        Ok(payment)
    }

    async fn discard(&self, stored: &StoredReceipt) {
        if let Err(err) = self.receipts.remove_url(&stored.url).await {
            warn!(file = %stored.file_name, error = %err, "failed to discard orphaned receipt");
        }
    }

    async fn notify(&self, payment: &Payment) -> bool {
        let (person, course_name) = match self.recipient(payment) {
            Ok(Some(found)) => found,
            Ok(None) => {
                warn!(payment_id = %payment.id, "payment has no reachable person, email skipped");
                return false;
            }
            Err(err) => {
                warn!(payment_id = %payment.id, error = %err, "payment email lookup failed");
                return false;
            }
        };
        let email =
            payment_registered_email(&self.settings.brand, &person, &course_name, payment);
        match self.notifier.send(email).await {
            Ok(()) => true,
            Err(err) => {
                warn!(payment_id = %payment.id, error = %err, "payment confirmation email failed");
                false
            }
        }
    }

    fn recipient(
        &self,
        payment: &Payment,
    ) -> Result<Option<(Person, String)>, StoreError> {
        let Some(enrollment) = self.store.enrollment(payment.enrollment_id)? else {
            return Ok(None);
        };
        let Some(person) = self.store.person(enrollment.person_id)? else {
            return Ok(None);
        };
        let course_name = match self.store.course(enrollment.course_id)? {
            Some(course) => course.name,
            None => payment
                .course_label
                .clone()
                .or(enrollment.course_label)
                .unwrap_or_default(),
        };
        Ok(Some((person, course_name)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(EnrollmentId),
    #[error("payment {0} not found")]
    NotFound(PaymentId),
    #[error(transparent)]
    Receipt(#[from] ReceiptError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
