//! Persistent entities shared by every workflow.
//!
//! Identifiers are thin newtypes over the database row id so a payment id can
//! never be handed to an enrollment lookup by accident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Local person (student) identifier.
    PersonId
);
row_id!(
    /// Internal course identifier. Distinct from the LMS course id.
    CourseId
);
row_id!(EnrollmentId);
row_id!(PaymentId);
row_id!(ContactId);

/// A student known to the platform, keyed by unique email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub email: String,
    pub national_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub grade: Option<String>,
    pub subsystem: Option<String>,
    /// LMS account id. Written once, never cleared.
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }

    pub fn summary(&self) -> PersonSummary {
        PersonSummary {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            national_id: self.national_id.clone(),
            grade: self.grade.clone(),
            subsystem: self.subsystem.clone(),
            email: self.email.clone(),
        }
    }

    /// Overwrites the refreshable profile fields that the update carries.
    pub fn apply_profile(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) {
        if let Some(national_id) = &update.national_id {
            self.national_id = Some(national_id.clone());
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(grade) = &update.grade {
            self.grade = Some(grade.clone());
        }
        if let Some(subsystem) = &update.subsystem {
            self.subsystem = Some(subsystem.clone());
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub email: String,
    pub national_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub grade: Option<String>,
    pub subsystem: Option<String>,
}

/// Fields refreshed on every enrollment attempt by a known person.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub national_id: Option<String>,
    pub phone: Option<String>,
    pub grade: Option<String>,
    pub subsystem: Option<String>,
}

/// Person columns exposed alongside enrollment and payment listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub national_id: Option<String>,
    pub grade: Option<String>,
    pub subsystem: Option<String>,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    /// Key used to address the course in the LMS.
    pub shortname: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub person_id: PersonId,
    pub course_id: CourseId,
    pub accepted: bool,
    pub course_label: Option<String>,
    pub observation: Option<String>,
    pub edited_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn apply(&mut self, patch: &EnrollmentPatch, now: DateTime<Utc>) {
        if let Some(accepted) = patch.accepted {
            self.accepted = accepted;
        }
        if let Some(label) = &patch.course_label {
            self.course_label = Some(label.clone());
        }
        if let Some(observation) = &patch.observation {
            self.observation = Some(observation.clone());
        }
        if let Some(edited_by) = &patch.edited_by {
            self.edited_by = Some(edited_by.clone());
        }
        self.updated_at = now;
    }

    pub fn has_observation(&self) -> bool {
        self.observation
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub person_id: PersonId,
    pub course_id: CourseId,
    pub accepted: bool,
    pub course_label: Option<String>,
}

/// Staff-editable enrollment fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentPatch {
    #[serde(default)]
    pub accepted: Option<bool>,
    #[serde(default)]
    pub course_label: Option<String>,
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub edited_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentView {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub person: PersonSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub enrollment_id: EnrollmentId,
    pub course_label: Option<String>,
    pub amount_deposited: f64,
    pub confirmed: bool,
    pub verified: bool,
    pub badge: bool,
    pub coin: bool,
    pub delivered: bool,
    pub observation: Option<String>,
    pub edited_by: Option<String>,
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn apply(&mut self, patch: &PaymentPatch, now: DateTime<Utc>) {
        if let Some(label) = &patch.course_label {
            self.course_label = Some(label.clone());
        }
        if let Some(amount) = patch.amount_deposited {
            self.amount_deposited = amount;
        }
        if let Some(confirmed) = patch.confirmed {
            self.confirmed = confirmed;
        }
        if let Some(verified) = patch.verified {
            self.verified = verified;
        }
        if let Some(badge) = patch.badge {
            self.badge = badge;
        }
        if let Some(coin) = patch.coin {
            self.coin = coin;
        }
        if let Some(delivered) = patch.delivered {
            self.delivered = delivered;
        }
        if let Some(observation) = &patch.observation {
            self.observation = Some(observation.clone());
        }
        if let Some(edited_by) = &patch.edited_by {
            self.edited_by = Some(edited_by.clone());
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub enrollment_id: EnrollmentId,
    pub course_label: Option<String>,
    pub amount_deposited: f64,
    pub confirmed: bool,
    pub verified: bool,
    pub badge: bool,
    pub coin: bool,
    pub delivered: bool,
    pub observation: Option<String>,
    pub edited_by: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentPatch {
    #[serde(default)]
    pub course_label: Option<String>,
    #[serde(default)]
    pub amount_deposited: Option<f64>,
    #[serde(default)]
    pub confirmed: Option<bool>,
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub badge: Option<bool>,
    #[serde(default)]
    pub coin: Option<bool>,
    #[serde(default)]
    pub delivered: Option<bool>,
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub edited_by: Option<String>,
}

/// Enrollment columns a payment listing needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentRef {
    pub id: EnrollmentId,
    pub person_id: PersonId,
    pub course_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: Payment,
    pub enrollment: EnrollmentRef,
    pub person: PersonSummary,
}

/// Certificate issued outside this system, matched by national id and course label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub national_id: String,
    pub course_label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: ContactId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactMessage {
    pub fn apply(&mut self, patch: &ContactPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(message) = &patch.message {
            self.message = message.clone();
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
