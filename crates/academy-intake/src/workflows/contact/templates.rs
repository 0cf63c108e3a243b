use crate::integrations::OutgoingEmail;
use crate::records::ContactMessage;
use crate::workflows::templates::{escape_html, frame, paragraph};

pub(crate) fn staff_notice(brand: &str, inbox: &str, message: &ContactMessage) -> OutgoingEmail {
    let mut body = paragraph(&format!("Name: {}", message.name));
    body.push_str(&paragraph(&format!("Email: {}", message.email)));
    if let Some(phone) = &message.phone {
        body.push_str(&paragraph(&format!("Phone: {phone}")));
    }
    body.push_str(&format!(
        "<blockquote style=\"border-left:4px solid #1a3d7c;padding-left:12px;\">{}</blockquote>",
        escape_html(&message.message)
    ));

    OutgoingEmail {
        to: inbox.to_string(),
        subject: format!("New contact message - {brand}"),
        html_body: frame(brand, "New contact message", &body),
    }
}

pub(crate) fn acknowledgement(brand: &str, message: &ContactMessage) -> OutgoingEmail {
    let mut body = paragraph(&format!("Hello {},", message.name));
    body.push_str(&paragraph(&format!(
        "Thank you for writing to {brand}. We received your message and will get back to you soon."
    )));

    OutgoingEmail {
        to: message.email.clone(),
        subject: format!("We received your message - {brand}"),
        html_body: frame(brand, "Message received", &body),
    }
}
