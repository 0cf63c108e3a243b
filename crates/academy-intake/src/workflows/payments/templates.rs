use crate::integrations::OutgoingEmail;
use crate::records::{Payment, Person};
use crate::workflows::templates::{frame, link, paragraph};

pub(crate) fn payment_registered_email(
    brand: &str,
    person: &Person,
    course_name: &str,
    payment: &Payment,
) -> OutgoingEmail {
    let mut body = paragraph(&format!("Hello {},", person.display_name()));
    body.push_str(&paragraph(&format!(
        "We received your payment receipt for the course \"{course_name}\"."
    )));
    body.push_str(&paragraph(&format!(
        "Amount deposited: ${:.2}",
        payment.amount_deposited
    )));

    let extras: Vec<&str> = [
        (payment.coin, "commemorative coin"),
        (payment.badge, "badge"),
    ]
    .into_iter()
    .filter_map(|(included, label)| included.then_some(label))
    .collect();
    if !extras.is_empty() {
        body.push_str(&paragraph(&format!("Includes: {}", extras.join(" and "))));
    }

    body.push_str(&paragraph(
        "Your certificate is issued once the payment is verified. Physical items \
         are announced in a separate email when ready for pickup.",
    ));
    if let Some(url) = &payment.receipt_url {
        body.push_str(&link(url, "View payment receipt"));
    }

    OutgoingEmail {
        to: person.email.clone(),
        subject: format!("Payment registered - {brand}"),
        html_body: frame(brand, "Payment registered", &body),
    }
}
