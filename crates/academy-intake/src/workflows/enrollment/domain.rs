use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, LmsConfig};
use crate::integrations::RegistrationReceipt;
use crate::records::{Course, CourseId, Enrollment, NewPerson, Person, ProfileUpdate};

/// Enrollment form as submitted by the public site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub course_id: Option<CourseId>,
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub subsystem: Option<String>,
    #[serde(default)]
    pub course_label: Option<String>,
    #[serde(default)]
    pub accepted: bool,
}

/// Request after validation: email normalized, blanks dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidEnrollment {
    pub(crate) email: String,
    pub(crate) course_id: CourseId,
    pub(crate) national_id: Option<String>,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) grade: Option<String>,
    pub(crate) subsystem: Option<String>,
    pub(crate) course_label: Option<String>,
    pub(crate) accepted: bool,
}

impl EnrollmentRequest {
    pub(crate) fn validate(self) -> Result<ValidEnrollment, String> {
        let email = self
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| "email is required".to_string())?;
        let course_id = self
            .course_id
            .ok_or_else(|| "course_id is required".to_string())?;

        Ok(ValidEnrollment {
            email,
            course_id,
            national_id: non_blank(self.national_id),
            first_name: non_blank(self.first_name),
            last_name: non_blank(self.last_name),
            phone: non_blank(self.phone),
            grade: non_blank(self.grade),
            subsystem: non_blank(self.subsystem),
            course_label: non_blank(self.course_label),
            accepted: self.accepted,
        })
    }
}

impl ValidEnrollment {
    pub(crate) fn new_person(&self) -> NewPerson {
        NewPerson {
            email: self.email.clone(),
            national_id: self.national_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            grade: self.grade.clone(),
            subsystem: self.subsystem.clone(),
        }
    }

    pub(crate) fn profile_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            national_id: self.national_id.clone(),
            phone: self.phone.clone(),
            grade: self.grade.clone(),
            subsystem: self.subsystem.clone(),
        }
    }
}

/// Emails are compared and stored trimmed and lowercase.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// What happened on the LMS side of an enrollment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationStatus {
    Confirmed(RegistrationReceipt),
    Declined { reason: String },
    Failed { reason: String },
    TimedOut { after_secs: u64 },
}

impl RegistrationStatus {
    pub fn receipt(&self) -> Option<&RegistrationReceipt> {
        match self {
            RegistrationStatus::Confirmed(receipt) => Some(receipt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentOutcome {
    /// `None` while the LMS has not confirmed the enrollment.
    pub enrollment: Option<Enrollment>,
    pub person: Person,
    pub course: Course,
    pub person_created: bool,
    pub registration: RegistrationStatus,
    pub notified: bool,
    pub message: String,
}

impl EnrollmentOutcome {
    pub fn is_enrolled(&self) -> bool {
        self.enrollment.is_some()
    }
}

/// Runtime knobs for the enrollment workflow.
#[derive(Debug, Clone)]
pub struct EnrollmentSettings {
    pub lms: LmsConfig,
    pub brand: String,
}

impl EnrollmentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lms: config.lms.clone(),
            brand: config.mail.brand.clone(),
        }
    }

    pub fn registry_timeout(&self) -> Duration {
        self.lms.timeout
    }

    pub fn course_url(&self, remote_course_id: i64) -> String {
        format!(
            "{}/course/view.php?id={remote_course_id}",
            self.lms.base_url()
        )
    }
}
