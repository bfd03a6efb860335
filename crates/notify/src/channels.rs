//! Builds notifier instances from the `notifications` config section.

use relay_core::config::NotificationsConfig;

use crate::desktop::DesktopNotifier;
use crate::discord::DiscordNotifier;
use crate::email::EmailNotifier;
use crate::slack::SlackNotifier;
use crate::traits::{Notifier, NotifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Slack,
    Discord,
    Email,
    Desktop,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Email => "email",
            Self::Desktop => "desktop",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An enabled channel and the notifier that serves it.
pub struct Channel {
    pub kind: ChannelKind,
    pub notifier: Box<dyn Notifier>,
}

impl Channel {
    pub fn new(kind: ChannelKind, notifier: Box<dyn Notifier>) -> Self {
        Self { kind, notifier }
    }
}

/// Instantiate every enabled channel, in slack/discord/email/desktop order.
///
/// A channel that is enabled but misconfigured is an error; disabled
/// channels are never constructed.
pub fn build_channels(config: &NotificationsConfig) -> Result<Vec<Channel>, NotifyError> {
    let mut channels = Vec::new();

    if config.slack.enabled {
        let notifier = SlackNotifier::from_config(
            &config.slack.webhook_url,
            config.slack.channel.clone(),
            config.slack.username.clone(),
        )?;
        channels.push(Channel::new(ChannelKind::Slack, Box::new(notifier)));
    }

    if config.discord.enabled {
        let notifier =
            DiscordNotifier::from_config(&config.discord.webhook_url, config.discord.username.clone())?;
        channels.push(Channel::new(ChannelKind::Discord, Box::new(notifier)));
    }

    if config.email.enabled {
        let notifier = EmailNotifier::from_config(&config.email)?;
        channels.push(Channel::new(ChannelKind::Email, Box::new(notifier)));
    }

    if config.desktop.enabled {
        channels.push(Channel::new(
            ChannelKind::Desktop,
            Box::new(DesktopNotifier::new(config.desktop.sound)),
        ));
    }

    tracing::debug!(
        channels = ?channels.iter().map(|c| c.kind.as_str()).collect::<Vec<_>>(),
        "notification channels built"
    );
    Ok(channels)
}
