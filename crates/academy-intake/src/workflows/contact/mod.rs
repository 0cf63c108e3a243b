//! Public contact form with staff CRUD over the stored messages.

pub mod router;
pub mod service;
mod templates;

pub use router::contact_router;
pub use service::{ContactError, ContactOutcome, ContactService, ContactSettings, ContactSubmission};
