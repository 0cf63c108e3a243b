//! Enrollment intake reconciled against the LMS, plus staff CRUD.

pub mod domain;
pub mod router;
pub mod service;
mod templates;

#[cfg(test)]
mod tests;

pub use domain::{
    normalize_email, EnrollmentOutcome, EnrollmentRequest, EnrollmentSettings,
    RegistrationStatus,
};
pub use router::enrollment_router;
pub use service::{EnrollmentError, EnrollmentService};
