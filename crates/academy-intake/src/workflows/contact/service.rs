use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::templates::{acknowledgement, staff_notice};
use crate::config::AppConfig;
use crate::integrations::{Notifier, OutgoingEmail};
use crate::records::{ContactId, ContactMessage, ContactPatch, NewContactMessage};
use crate::store::{ContactStore, StoreError};
use crate::workflows::enrollment::domain::non_blank;
use crate::workflows::enrollment::normalize_email;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ContactSubmission {
    fn validate(self) -> Result<NewContactMessage, String> {
        let name = non_blank(self.name).ok_or_else(|| "name is required".to_string())?;
        let email = self
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| "email is required".to_string())?;
        let message = non_blank(self.message).ok_or_else(|| "message is required".to_string())?;
        Ok(NewContactMessage {
            name,
            email,
            phone: non_blank(self.phone),
            message,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactOutcome {
    #[serde(flatten)]
    pub message: ContactMessage,
    pub staff_notified: bool,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContactSettings {
    pub brand: String,
    /// Staff mailbox; the staff notice is skipped when unset.
    pub inbox: Option<String>,
}

impl ContactSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            brand: config.mail.brand.clone(),
            inbox: config.mail.contact_inbox.clone(),
        }
    }
}

pub struct ContactService<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    settings: ContactSettings,
}

impl<S> ContactService<S>
where
    S: ContactStore + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, settings: ContactSettings) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    /// Persists the message, then emails staff and the sender. Email
    /// failures are reported in the outcome only.
    pub async fn submit(&self, submission: ContactSubmission) -> Result<ContactOutcome, ContactError> {
        let new = submission.validate().map_err(ContactError::Validation)?;
        let message = self.store.insert_contact(new)?;

        let staff_notified = match &self.settings.inbox {
            Some(inbox) => {
                self.deliver(staff_notice(&self.settings.brand, inbox, &message), message.id)
                    .await
            }
            None => {
                info!(contact_id = %message.id, "no contact inbox configured, staff notice skipped");
                false
            }
        };
        let acknowledged = self
            .deliver(acknowledgement(&self.settings.brand, &message), message.id)
            .await;

        Ok(ContactOutcome {
            message,
            staff_notified,
            acknowledged,
        })
    }

    pub fn list(&self) -> Result<Vec<ContactMessage>, ContactError> {
        Ok(self.store.contacts()?)
    }

    pub fn get(&self, id: ContactId) -> Result<ContactMessage, ContactError> {
        self.store.contact(id)?.ok_or(ContactError::NotFound(id))
    }

    pub fn update(&self, id: ContactId, patch: ContactPatch) -> Result<ContactMessage, ContactError> {
        let patch = ContactPatch {
            email: patch.email.as_deref().map(normalize_email),
            ..patch
        };
        match self.store.update_contact(id, &patch) {
            Ok(message) => Ok(message),
            Err(StoreError::NotFound) => Err(ContactError::NotFound(id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns whether a row was removed.
    pub fn delete(&self, id: ContactId) -> Result<bool, ContactError> {
        Ok(self.store.delete_contact(id)?)
    }

    async fn deliver(&self, email: OutgoingEmail, id: ContactId) -> bool {
        let to = email.to.clone();
        match self.notifier.send(email).await {
            Ok(()) => true,
            Err(err) => {
                warn!(contact_id = %id, %to, error = %err, "contact email failed");
                false
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    Validation(String),
    #[error("contact message {0} not found")]
    NotFound(ContactId),
    #[error(transparent)]
    Store(#[from] StoreError),
}
