use axum::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;

mod smtp;
#[cfg(test)]
pub mod testing;

pub use smtp::SmtpMailer;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mailbox: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp transport: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// Outbound activation mail. Success means the message was accepted for delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation(&self, to: &str, token: &str) -> Result<(), MailError>;
}

/// Development mailer: writes the activation link to the log instead of sending it.
pub struct LogMailer {
    config: MailConfig,
}

impl LogMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation(&self, to: &str, token: &str) -> Result<(), MailError> {
        let url = self.config.activation_link(token);
        info!(%to, %url, "activation mail (log only)");
        Ok(())
    }
}

pub(crate) fn activation_html(link: &str) -> String {
    format!(
        r#"<div>
    <b>Please click the link below to activate your account</b>
</div>
<div>
    <a href="{link}">Activate</a>
</div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mailer = LogMailer::new(&crate::state::test_config().mail);
        assert!(mailer.send_activation("user1@mail.com", "abc").await.is_ok());
    }

    #[test]
    fn activation_html_contains_link() {
        let html = activation_html("http://localhost/token/0123456789abcdef");
        assert!(html.contains(r#"href="http://localhost/token/0123456789abcdef""#));
    }
}
