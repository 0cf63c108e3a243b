//! In-memory notifier and event sink shared by the workflow tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::integrations::{DomainEvent, EventSink, Notifier, NotifyError, OutgoingEmail};

#[derive(Default)]
pub(crate) struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub(crate) fn failing() -> Self {
        let mailer = Self::default();
        mailer.failing.store(true, Ordering::SeqCst);
        mailer
    }

    pub(crate) fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("mailbox full".to_string()));
        }
        self.sent.lock().expect("mailer mutex poisoned").push(email);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingEvents {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEvents {
    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .expect("events mutex poisoned")
            .iter()
            .map(DomainEvent::name)
            .collect()
    }

    pub(crate) fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().expect("events mutex poisoned").clone()
    }
}

impl EventSink for RecordingEvents {
    fn publish(&self, event: DomainEvent) {
        self.events
            .lock()
            .expect("events mutex poisoned")
            .push(event);
    }
}
