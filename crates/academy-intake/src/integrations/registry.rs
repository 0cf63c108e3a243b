use async_trait::async_trait;
use serde::Serialize;

/// Identity and course key sent to the LMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub national_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub course_shortname: String,
}

/// Identifiers returned once the LMS has the person enrolled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationReceipt {
    pub remote_person_id: String,
    pub remote_course_id: i64,
    /// The LMS account did not exist before this call.
    pub created_person: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Confirmed(RegistrationReceipt),
    /// The LMS answered but refused, e.g. an unknown course.
    Declined { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry transport failed: {0}")]
    Transport(String),
    #[error("registry rejected call {function}: {message}")]
    Remote { function: String, message: String },
    #[error("registry returned an unexpected payload: {0}")]
    Payload(String),
    #[error("registry is not configured")]
    Disabled,
}

/// External system of record for enrollments. Calls are slow and may fail.
#[async_trait]
pub trait EnrollmentRegistry: Send + Sync {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistryError>;
}

/// Stand-in used when no LMS is configured. Every call fails softly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRegistry;

#[async_trait]
impl EnrollmentRegistry for DisabledRegistry {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistryError> {
        tracing::debug!(
            course = %request.course_shortname,
            "registry disabled, skipping LMS registration"
        );
        Err(RegistryError::Disabled)
    }
}
