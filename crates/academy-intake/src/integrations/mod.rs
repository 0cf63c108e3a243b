//! Adapters for the systems outside the record store: the Moodle LMS, SMTP
//! delivery and the live event feed.

pub mod events;
pub mod mailer;
pub mod moodle;
pub mod registry;

pub use events::{event_router, BroadcastHub, DomainEvent, EventSink};
pub use mailer::{DisabledMailer, Notifier, NotifyError, OutgoingEmail, SmtpMailer};
pub use moodle::MoodleRegistry;
pub use registry::{
    DisabledRegistry, EnrollmentRegistry, RegistrationOutcome, RegistrationReceipt,
    RegistrationRequest, RegistryError,
};
