//! Moodle web-service client.
//!
//! Speaks the REST protocol at `{base}/webservice/rest/server.php`: every call
//! is a form POST carrying `wstoken`, `wsfunction` and
//! `moodlewsrestformat=json`. Errors come back as HTTP 200 with an
//! `exception` object, so the body is inspected before decoding.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::registry::{
    EnrollmentRegistry, RegistrationOutcome, RegistrationReceipt, RegistrationRequest,
    RegistryError,
};
use crate::config::LmsConfig;

pub struct MoodleRegistry {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    config: LmsConfig,
}

#[derive(Debug, Deserialize)]
struct MoodleUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CourseSearch {
    #[serde(default)]
    courses: Vec<MoodleCourse>,
}

#[derive(Debug, Deserialize)]
struct MoodleCourse {
    id: i64,
}

impl MoodleRegistry {
    /// Returns `None` when the LMS url or token is unset.
    pub fn from_config(config: &LmsConfig) -> Result<Option<Self>, RegistryError> {
        let (Some(_), Some(token)) = (config.url.as_deref(), config.token.as_deref()) else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| RegistryError::Transport(err.to_string()))?;
        Ok(Some(Self {
            client,
            endpoint: format!("{}/webservice/rest/server.php", config.base_url()),
            token: token.to_string(),
            config: config.clone(),
        }))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &[(String, String)],
    ) -> Result<T, RegistryError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("wstoken", self.token.as_str()),
            ("wsfunction", function),
            ("moodlewsrestformat", "json"),
        ];
        form.extend(args.iter().map(|(key, value)| (key.as_str(), value.as_str())));

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|err| RegistryError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(RegistryError::Transport(format!(
                "{function} answered {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| RegistryError::Payload(err.to_string()))?;
        decode(function, body)
    }

    async fn find_user(&self, email: &str) -> Result<Option<MoodleUser>, RegistryError> {
        let users: Vec<MoodleUser> = self
            .call(
                "core_user_get_users_by_field",
                &[
                    ("field".to_string(), "email".to_string()),
                    ("values[0]".to_string(), email.to_string()),
                ],
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn create_user(
        &self,
        request: &RegistrationRequest,
        national_id: &str,
    ) -> Result<MoodleUser, RegistryError> {
        let users: Vec<MoodleUser> = self
            .call(
                "core_user_create_users",
                &[
                    ("users[0][username]".to_string(), national_id.to_lowercase()),
                    (
                        "users[0][password]".to_string(),
                        self.config.initial_password(national_id),
                    ),
                    (
                        "users[0][firstname]".to_string(),
                        non_blank(request.first_name.as_deref()),
                    ),
                    (
                        "users[0][lastname]".to_string(),
                        non_blank(request.last_name.as_deref()),
                    ),
                    ("users[0][email]".to_string(), request.email.clone()),
                ],
            )
            .await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::Payload("user creation returned no id".to_string()))
    }

    async fn find_course(&self, shortname: &str) -> Result<Option<i64>, RegistryError> {
        let search: CourseSearch = self
            .call(
                "core_course_get_courses_by_field",
                &[
                    ("field".to_string(), "shortname".to_string()),
                    ("value".to_string(), shortname.to_string()),
                ],
            )
            .await?;
        Ok(search.courses.first().map(|course| course.id))
    }

    async fn enrol(&self, user_id: i64, course_id: i64) -> Result<(), RegistryError> {
        let _: Value = self
            .call(
                "enrol_manual_enrol_users",
                &[
                    (
                        "enrolments[0][roleid]".to_string(),
                        self.config.student_role_id.to_string(),
                    ),
                    ("enrolments[0][userid]".to_string(), user_id.to_string()),
                    ("enrolments[0][courseid]".to_string(), course_id.to_string()),
                ],
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRegistry for MoodleRegistry {
    async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistryError> {
        let Some(course_id) = self.find_course(&request.course_shortname).await? else {
            return Ok(RegistrationOutcome::Declined {
                reason: format!("course '{}' does not exist in the LMS", request.course_shortname),
            });
        };

        let (user, created_person) = match self.find_user(&request.email).await? {
            Some(user) => (user, false),
            None => {
                let Some(national_id) = request
                    .national_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                else {
                    return Ok(RegistrationOutcome::Declined {
                        reason: "a national id is required to create the LMS account".to_string(),
                    });
                };
                (self.create_user(&request, national_id).await?, true)
            }
        };

        self.enrol(user.id, course_id).await?;
        tracing::info!(
            remote_user = user.id,
            remote_course = course_id,
            created_person,
            "LMS enrollment confirmed"
        );

        Ok(RegistrationOutcome::Confirmed(RegistrationReceipt {
            remote_person_id: user.id.to_string(),
            remote_course_id: course_id,
            created_person,
        }))
    }
}

/// Splits Moodle exception envelopes from regular payloads.
fn decode<T: DeserializeOwned>(function: &str, body: Value) -> Result<T, RegistryError> {
    if let Some(exception) = body.get("exception") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| exception.to_string());
        return Err(RegistryError::Remote {
            function: function.to_string(),
            message,
        });
    }
    serde_json::from_value(body).map_err(|err| RegistryError::Payload(err.to_string()))
}

fn non_blank(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("-")
        .to_string()
}
