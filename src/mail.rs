//! Outbound email: the transport trait, two transports, and the
//! activation / password-reset messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    /// The mail service could not be reached.
    #[error("email service unavailable: {0}")]
    Unavailable(String),
    /// The mail service refused the message.
    #[error("email rejected: {0}")]
    Rejected(String),
}

impl MailError {
    pub fn code(&self) -> &'static str {
        match self {
            MailError::Unavailable(_) => "email_service_unavailable",
            MailError::Rejected(_) => "email_send_failed",
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, "Email dispatched");
        debug!(body = %mail.text_body, "Email body");
        Ok(())
    }
}

/// Keeps every sent message in memory. Can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<OutgoingMail>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `send` fails with [`MailError::Unavailable`] and records nothing.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<OutgoingMail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Unavailable("mailer switched off".into()));
        }
        self.outbox
            .lock()
            .map_err(|_| MailError::Rejected("outbox poisoned".into()))?
            .push(mail);
        Ok(())
    }
}

/// Builds the links embedded in emails from the public base URL.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: Url,
}

impl LinkBuilder {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn activation(&self, token: &str) -> Url {
        self.with_token("activate", token)
    }

    pub fn password_reset(&self, token: &str) -> Url {
        self.with_token("reset-password", token)
    }

    fn with_token(&self, page: &str, token: &str) -> Url {
        let mut url = self.base.clone();
        // Only cannot-be-a-base URLs refuse segments; http(s) never does.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(page);
        }
        url.query_pairs_mut().clear().append_pair("token", token);
        url
    }
}

/// Renders and sends account emails.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    links: LinkBuilder,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, links: LinkBuilder) -> Self {
        Self { mailer, links }
    }

    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    pub async fn send_activation(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = self.links.activation(token);
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: "Activate your account".to_string(),
                text_body: format!(
                    "An account was created for you.\n\n\
                     Choose a username and password here:\n{link}\n\n\
                     The link expires soon and stops working once a newer one is sent.\n"
                ),
            })
            .await
    }

    pub async fn send_password_reset(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = self.links.password_reset(token);
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: "Reset your password".to_string(),
                text_body: format!(
                    "A password reset was requested for your account.\n\n\
                     Set a new password here:\n{link}\n\n\
                     If you did not ask for this, ignore this email.\n"
                ),
            })
            .await
    }
}

/// Pull the `token` query parameter out of the first link in a message.
pub fn token_from_mail(mail: &OutgoingMail) -> Option<String> {
    mail.text_body
        .split_whitespace()
        .filter_map(|word| Url::parse(word).ok())
        .find_map(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(base: &str) -> LinkBuilder {
        LinkBuilder::new(Url::parse(base).unwrap())
    }

    #[test]
    fn test_links() {
        let links = links("https://accounts.example.com");
        assert_eq!(
            links.activation("abc.def").as_str(),
            "https://accounts.example.com/activate?token=abc.def"
        );
        assert_eq!(
            links.password_reset("xyz").as_str(),
            "https://accounts.example.com/reset-password?token=xyz"
        );
    }

    #[test]
    fn test_links_keep_base_path() {
        let links = links("https://example.com/app/");
        assert_eq!(
            links.activation("t").as_str(),
            "https://example.com/app/activate?token=t"
        );
    }

    #[tokio::test]
    async fn test_notifier_embeds_token() {
        let mailer = Arc::new(MemoryMailer::new());
        let notifier = Notifier::new(mailer.clone(), links("http://localhost:8080"));

        notifier
            .send_password_reset("a@example.com", "tok.en-1")
            .await
            .unwrap();

        let mail = mailer.last_to("a@example.com").unwrap();
        assert_eq!(mail.subject, "Reset your password");
        assert_eq!(token_from_mail(&mail).as_deref(), Some("tok.en-1"));
    }

    #[tokio::test]
    async fn test_failing_mailer() {
        let mailer = MemoryMailer::new();
        mailer.set_failing(true);
        let result = mailer
            .send(OutgoingMail {
                to: "a@example.com".into(),
                subject: "s".into(),
                text_body: "b".into(),
            })
            .await;
        assert!(matches!(result, Err(MailError::Unavailable(_))));
        assert!(mailer.sent().is_empty());
        assert_eq!(
            result.unwrap_err().code(),
            "email_service_unavailable"
        );
    }
}
