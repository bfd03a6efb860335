//! Slack incoming-webhook notifier.

use crate::traits::{error_for_response, Notification, Notifier, NotifyError};

/// Posts `{"text": ...}` messages to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackNotifier {
    webhook_url: String,
    channel: Option<String>,
    username: Option<String>,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn from_config(
        webhook_url: &str,
        channel: Option<String>,
        username: Option<String>,
    ) -> Result<Self, NotifyError> {
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::Config(
                "Slack webhook URL must not be empty".to_string(),
            ));
        }
        Ok(Self {
            webhook_url: webhook_url.to_string(),
            channel,
            username,
            client: reqwest::Client::new(),
        })
    }

    fn payload(&self, notification: &Notification) -> serde_json::Value {
        let mut body = serde_json::json!({
            "text": format!("*{}*\n{}", notification.subject, notification.body),
        });
        if let Some(ref channel) = self.channel {
            body["channel"] = serde_json::Value::String(channel.clone());
        }
        if let Some(ref username) = self.username {
            body["username"] = serde_json::Value::String(username.clone());
        }
        body
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&self.payload(notification))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        tracing::debug!(channel = "slack", subject = %notification.subject, "notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
