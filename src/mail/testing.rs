use std::sync::Mutex;

use axum::async_trait;

use super::{MailError, Mailer};

/// Records every activation mail it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// `(recipient, token)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.sent().last().map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_activation(&self, to: &str, token: &str) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), token.to_string()));
        Ok(())
    }
}

/// Rejects every message.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_activation(&self, _to: &str, _token: &str) -> Result<(), MailError> {
        Err(MailError::Rejected("550 mailbox unavailable".into()))
    }
}
