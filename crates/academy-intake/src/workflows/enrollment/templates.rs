use crate::integrations::{OutgoingEmail, RegistrationReceipt};
use crate::records::{Course, Person};
use crate::workflows::templates::{escape_html, frame, link, paragraph};

use super::domain::EnrollmentSettings;

pub(crate) fn confirmation_email(
    settings: &EnrollmentSettings,
    person: &Person,
    course: &Course,
    receipt: &RegistrationReceipt,
) -> OutgoingEmail {
    let mut body = paragraph(&format!("Hello {},", person.display_name()));
    body.push_str(&paragraph(&format!(
        "Your enrollment in \"{}\" is confirmed.",
        course.name
    )));

    match person.national_id.as_deref() {
        Some(national_id) if receipt.created_person => {
            body.push_str(&paragraph(
                "An account was created for you on the virtual campus:",
            ));
            body.push_str(&format!(
                "<ul><li>Username: <strong>{}</strong></li><li>Password: <strong>{}</strong></li></ul>",
                escape_html(&national_id.to_lowercase()),
                escape_html(&settings.lms.initial_password(national_id)),
            ));
            body.push_str(&paragraph("Please change your password after the first login."));
        }
        _ => {
            body.push_str(&paragraph(
                "Sign in to the virtual campus with your existing credentials.",
            ));
        }
    }

    body.push_str(&link(
        &settings.course_url(receipt.remote_course_id),
        "Go to the course",
    ));

    OutgoingEmail {
        to: person.email.clone(),
        subject: format!("Enrollment confirmed: {}", course.name),
        html_body: frame(&settings.brand, "Enrollment confirmed", &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LmsConfig;
    use crate::records::{CourseId, PersonId};
    use chrono::Utc;
    use std::time::Duration;

    fn settings() -> EnrollmentSettings {
        EnrollmentSettings {
            lms: LmsConfig {
                url: Some("https://campus.example.org".to_string()),
                token: Some("token".to_string()),
                student_role_id: 5,
                timeout: Duration::from_secs(1),
                password_prefix: "Mp".to_string(),
                password_suffix: "*".to_string(),
            },
            brand: "Academy".to_string(),
        }
    }

    fn person() -> Person {
        let now = Utc::now();
        Person {
            id: PersonId(1),
            email: "a@x.com".to_string(),
            national_id: Some("1712345678".to_string()),
            first_name: Some("Ana".to_string()),
            last_name: None,
            phone: None,
            grade: None,
            subsystem: None,
            external_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn course() -> Course {
        Course {
            id: CourseId(7),
            shortname: "cbpea".to_string(),
            name: "Basic <course>".to_string(),
        }
    }

    #[test]
    fn new_accounts_receive_credentials() {
        let receipt = RegistrationReceipt {
            remote_person_id: "42".to_string(),
            remote_course_id: 31,
            created_person: true,
        };
        let email = confirmation_email(&settings(), &person(), &course(), &receipt);
        assert_eq!(email.to, "a@x.com");
        assert!(email.html_body.contains("Mp1712345678*"));
        assert!(email.html_body.contains("https://campus.example.org/course/view.php?id=31"));
        assert!(email.html_body.contains("Basic &lt;course&gt;"));
    }

    #[test]
    fn existing_accounts_are_pointed_at_their_credentials() {
        let receipt = RegistrationReceipt {
            remote_person_id: "42".to_string(),
            remote_course_id: 31,
            created_person: false,
        };
        let email = confirmation_email(&settings(), &person(), &course(), &receipt);
        assert!(!email.html_body.contains("Mp1712345678*"));
        assert!(email.html_body.contains("existing credentials"));
    }
}
