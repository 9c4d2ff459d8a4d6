use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, instrument};

use super::{activation_html, MailError, Mailer};
use crate::config::MailConfig;

const ACTIVATION_SUBJECT: &str = "Account Activation";

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, host: &str) -> Result<Self, MailError> {
        let builder = if config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.parse()?,
            config: config.clone(),
        })
    }

    fn activation_message(&self, to: &str, token: &str) -> Result<Message, MailError> {
        let link = self.config.activation_link(token);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>()?)
            .subject(ACTIVATION_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(activation_html(&link))?;
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, token))]
    async fn send_activation(&self, to: &str, token: &str) -> Result<(), MailError> {
        let message = self.activation_message(to, token)?;
        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            return Err(MailError::Rejected(response.code().to_string()));
        }
        debug!(code = %response.code(), "activation mail accepted");
        Ok(())
    }
}
