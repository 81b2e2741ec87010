// Outbound email.
//
// The engine only ever sends verification codes, so the trait is a single
// `send`. Production deployments implement it over their provider of choice;
// tests use `MockMailer` and read the outbox.

use async_trait::async_trait;
use tokio::sync::Mutex;

use guardpost_core::error::Result;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Collects sent mail instead of delivering it.
#[derive(Default)]
pub struct MockMailer {
    outbox: Mutex<Vec<EmailMessage>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().await.clone()
    }

    pub async fn last(&self) -> Option<EmailMessage> {
        self.outbox.lock().await.last().cloned()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        self.outbox.lock().await.push(message);
        Ok(())
    }
}
