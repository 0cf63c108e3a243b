use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;

/// A rendered HTML email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp delivery failed: {0}")]
    Transport(String),
}

/// Transactional email delivery. Callers treat failures as soft.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Returns `None` when SMTP is not configured. Uses implicit TLS on 465
    /// and STARTTLS on any other port.
    pub fn from_config(config: &MailConfig) -> Result<Option<Self>, NotifyError> {
        let Some(smtp) = &config.smtp else {
            return Ok(None);
        };
        let from = parse_mailbox(&format!("{} <{}>", config.brand, config.from))?;

        let builder = if smtp.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        }
        .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let mut builder = builder.port(smtp.port);
        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

#[async_trait]
impl Notifier for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&email.to)?)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body)
            .map_err(|err| NotifyError::Build(err.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        tracing::debug!(to = %email.to, subject = %email.subject, "email delivered");
        Ok(())
    }
}

/// Logs instead of sending. Used when SMTP is unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl Notifier for DisabledMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), NotifyError> {
        tracing::info!(to = %email.to, subject = %email.subject, "smtp disabled, email not sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse::<Mailbox>().map_err(|err| NotifyError::Address {
        address: address.to_string(),
        reason: err.to_string(),
    })
}
