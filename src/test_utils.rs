//! Shared test utilities.

use std::sync::{Arc, Mutex};

use lettre::Message;

use crate::mail::{MailError, MailTransport};

/// In-memory [`MailTransport`] that records formatted messages instead of
/// delivering them. `failing()` simulates an unreachable relay.
#[derive(Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MockMailer {
    pub fn failing() -> Self {
        MockMailer {
            fail: true,
            ..Self::default()
        }
    }

    /// Formatted RFC 5322 text of every message sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailTransport for MockMailer {
    async fn send(&self, message: Message) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Smtp("simulated relay failure".to_string()));
        }
        let raw =
            String::from_utf8(message.formatted()).map_err(|e| MailError::Build(e.to_string()))?;
        self.sent.lock().unwrap().push(raw);
        Ok(())
    }
}
