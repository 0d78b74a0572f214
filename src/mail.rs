//! Outbound mail: report message composition and SMTP delivery.
//!
//! A thin abstraction over [lettre](https://lettre.rs). The [`MailTransport`]
//! trait sits at the delivery seam so the reporting code can be exercised
//! against a mock transport in tests; [`SmtpMailer`] is the production
//! implementation (STARTTLS relay with password authentication).

use std::future::Future;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

/// Filename of the CSV attached to every report message.
pub const ATTACHMENT_FILENAME: &str = "unsubscribed_emails_report.csv";

/// Errors that can occur while composing or sending mail.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// Delivers a composed message to the mail relay.
///
/// Implementations must not panic on transport failure; errors are returned
/// so the reporting cycle can log and skip pruning.
///
/// # Example (mock for testing)
///
/// ```ignore
/// #[derive(Clone, Default)]
/// struct MockMailer {
///     sent: Arc<Mutex<Vec<Message>>>,
/// }
///
/// impl MailTransport for MockMailer {
///     async fn send(&self, message: Message) -> Result<(), MailError> {
///         self.sent.lock().unwrap().push(message);
///         Ok(())
///     }
/// }
/// ```
pub trait MailTransport: Send + Sync {
    /// Sends one message, returning once the relay has accepted it.
    fn send(&self, message: Message) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Production SMTP mailer: STARTTLS to the configured relay, authenticated
/// with the sender's credentials.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Builds a mailer from relay settings.
    ///
    /// This does not open a connection; the relay is first contacted on send.
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.relay_host)
            .map_err(|e| MailError::Smtp(e.to_string()))?
            .port(config.relay_port)
            .credentials(Credentials::new(
                config.sender.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(SmtpMailer { transport })
    }
}

impl MailTransport for SmtpMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Smtp(e.to_string()))
    }
}

/// Composes the report message: a plain-text body plus the CSV attachment,
/// addressed from the configured sender to every recipient.
pub fn build_report_message(
    sender: &str,
    recipients: &[String],
    csv: String,
    report_window_hours: u32,
) -> Result<Message, MailError> {
    let from: Mailbox = sender
        .parse()
        .map_err(|_| MailError::Address(sender.to_string()))?;

    let mut builder = Message::builder().from(from).subject("Unsubscribe Report");
    for recipient in recipients {
        let to: Mailbox = recipient
            .parse()
            .map_err(|_| MailError::Address(recipient.clone()))?;
        builder = builder.to(to);
    }

    let body = format!(
        "Here is the unsubscribe report for the last {report_window_hours} hours. \
         The attached CSV contains the unsubscribed emails."
    );

    let csv_type = ContentType::parse("text/csv").map_err(|e| MailError::Build(e.to_string()))?;
    let attachment = Attachment::new(ATTACHMENT_FILENAME.to_string()).body(csv, csv_type);

    builder
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body))
                .singlepart(attachment),
        )
        .map_err(|e| MailError::Build(e.to_string()))
}
