use anyhow::Context;
use std::future::Future;

/// Text of a single operator notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage(String);

impl NotificationMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait Sender: std::fmt::Debug + Send + Sync + 'static {
    fn send<'s>(
        &'s self,
        message: &'s NotificationMessage,
    ) -> impl Future<Output = anyhow::Result<()>> + Send + 's;
}

/// Posts messages to a Discord-compatible webhook as `{"content": "..."}`.
#[derive(Clone)]
pub struct WebhookSender {
    url: url::Url,
    http: reqwest::Client,
}

impl std::fmt::Debug for WebhookSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Webhook URLs embed their credential.
        f.debug_struct("WebhookSender")
            .field("host", &self.url.host_str())
            .finish_non_exhaustive()
    }
}

impl WebhookSender {
    async fn send(&self, message: &NotificationMessage) -> anyhow::Result<()> {
        #[derive(serde::Serialize)]
        struct Payload<'a> {
            content: &'a str,
        }

        let response = self
            .http
            .post(self.url.clone())
            .json(&Payload {
                content: message.as_str(),
            })
            .send()
            .await
            .context("posting to notification webhook")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("notification webhook responded with {status}: {body}");
        }

        tracing::debug!(%status, "delivered webhook notification");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Channel {
    /// No webhook is configured. Messages are only logged.
    Disabled,
    Webhook(WebhookSender),
}

impl Channel {
    pub fn webhook(url: url::Url, http: reqwest::Client) -> Channel {
        Channel::Webhook(WebhookSender { url, http })
    }
}

impl Sender for Channel {
    async fn send<'s>(&'s self, message: &'s NotificationMessage) -> anyhow::Result<()> {
        match self {
            Channel::Disabled => {
                tracing::warn!(notification = %message, "skipping notification (no webhook configured)");
                Ok(())
            }
            Channel::Webhook(webhook) => webhook.send(message).await,
        }
    }
}

/// Best-effort delivery of operator notifications.
///
/// Failures are logged and dropped. They are never retried, and never surface
/// to the caller.
#[derive(Debug)]
pub struct NotificationChannel<S> {
    sender: S,
}

impl<S: Sender> NotificationChannel<S> {
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub async fn notify(&self, message: NotificationMessage) {
        if let Err(error) = self.sender.send(&message).await {
            tracing::warn!(error = ?error, "failed to send notification");
        }
    }
}
