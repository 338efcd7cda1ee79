use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use std::sync::{Arc, Mutex};

use crate::config::{AppConfig, SmtpConfig};

/// OutgoingMail
///
/// A plain-text message ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Error type for mail delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// Simulated failure from [`MockMailer`].
    #[error("Mock mailer failure")]
    Mock,
}

// 1. Mailer Contract
/// Mailer
///
/// Abstract contract for outgoing mail, so handlers can run against the SMTP
/// relay in production, the log in local development, and a recorder in tests.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// MailerState
///
/// The concrete type used to share the mailer across the application state.
pub type MailerState = Arc<dyn Mailer>;

/// Picks the mailer for the loaded configuration: SMTP when a relay is
/// configured, the console otherwise.
pub fn from_config(config: &AppConfig) -> MailerState {
    match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp.clone(), config.from_email.clone())),
        None => Arc::new(ConsoleMailer::new(config.from_email.clone())),
    }
}

/// Builds the confirmation-code message sent on signup.
pub fn confirmation_mail(to: &str, code: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Registration code".to_string(),
        body: format!("Confirmation code: {code}"),
    }
}

// 2. SMTP Implementation
/// SmtpMailer
///
/// Sends mail through a STARTTLS relay using lettre's tokio transport.
pub struct SmtpMailer {
    config: SmtpConfig,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig, from_address: String) -> Self {
        Self {
            config,
            from_address,
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(mail.to.parse()?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
                .port(self.config.port);

        if let (Some(user), Some(pass)) = (&self.config.user, &self.config.password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport_builder.build().send(email).await?;

        tracing::info!(to = %mail.to, "Mail sent");
        Ok(())
    }
}

// 3. Console Implementation (Local)
/// ConsoleMailer
///
/// Writes messages to the log instead of delivering them. Used when no SMTP
/// relay is configured.
pub struct ConsoleMailer {
    from_address: String,
}

impl ConsoleMailer {
    pub fn new(from_address: String) -> Self {
        Self { from_address }
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            from = %self.from_address,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "Outgoing mail (console backend)"
        );
        Ok(())
    }
}

// 4. Mock Implementation (Tests)
/// MockMailer
///
/// Records every message in memory so tests can read confirmation codes back.
#[derive(Default)]
pub struct MockMailer {
    /// When true, every send fails.
    pub should_fail: bool,
    outbox: Mutex<Vec<OutgoingMail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// The most recent message addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError::Mock);
        }
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.push(mail);
        }
        Ok(())
    }
}
