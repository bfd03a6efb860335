//! Discord webhook notifier.

use crate::traits::{error_for_response, Notification, Notifier, NotifyError};

/// Discord rejects message content longer than this.
const MAX_CONTENT_CHARS: usize = 2000;

/// Posts `{"content": ...}` messages to a Discord channel webhook.
#[derive(Debug)]
pub struct DiscordNotifier {
    webhook_url: String,
    username: Option<String>,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn from_config(webhook_url: &str, username: Option<String>) -> Result<Self, NotifyError> {
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::Config(
                "Discord webhook URL must not be empty".to_string(),
            ));
        }
        Ok(Self {
            webhook_url: webhook_url.to_string(),
            username,
            client: reqwest::Client::new(),
        })
    }

    fn payload(&self, notification: &Notification) -> serde_json::Value {
        let content = truncate_chars(
            &format!("**{}**\n{}", notification.subject, notification.body),
            MAX_CONTENT_CHARS,
        );
        let mut body = serde_json::json!({ "content": content });
        if let Some(ref username) = self.username {
            body["username"] = serde_json::Value::String(username.clone());
        }
        body
    }
}

/// Truncate to at most `max` characters, marking the cut with an ellipsis.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
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

        tracing::debug!(channel = "discord", subject = %notification.subject, "notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "discord"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn long_content_is_truncated() {
        let notifier = DiscordNotifier::from_config("https://discord.test/api/webhooks/1", None).unwrap();
        let notification = Notification {
            subject: "S".to_string(),
            body: "é".repeat(5000),
            metadata: HashMap::new(),
        };
        let body = notifier.payload(&notification);
        let content = body["content"].as_str().unwrap();
        assert_eq!(content.chars().count(), MAX_CONTENT_CHARS);
        assert!(content.ends_with('…'));
    }

    #[test]
    fn short_content_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn username_is_optional() {
        let notifier = DiscordNotifier::from_config(
            "https://discord.test/api/webhooks/1",
            Some("relay".to_string()),
        )
        .unwrap();
        let body = notifier.payload(&Notification {
            subject: "a".to_string(),
            body: "b".to_string(),
            metadata: HashMap::new(),
        });
        assert_eq!(body["username"], "relay");
        assert_eq!(body["content"], "**a**\nb");
    }
}
