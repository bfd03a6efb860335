//! Fans notifications out to every enabled channel.
//!
//! Channels are sent to concurrently and each send is bounded by the
//! configured timeout. One channel failing or hanging never keeps the
//! others from receiving the message, and dispatch itself never errors.

use std::time::{Duration, Instant};

use futures::future::join_all;
use relay_core::config::NotificationsConfig;

use crate::channels::{build_channels, Channel};
use crate::event::NotificationEvent;
use crate::templating::TemplateRenderer;
use crate::traits::{DispatchResult, Notification, NotifyError};

/// Renders events and delivers them to all configured channels.
pub struct Dispatcher {
    channels: Vec<Channel>,
    renderer: TemplateRenderer,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(channels: Vec<Channel>, renderer: TemplateRenderer, timeout: Duration) -> Self {
        Self {
            channels,
            renderer,
            timeout,
        }
    }

    /// Build channels and template overrides from the `notifications` section.
    pub fn from_config(config: &NotificationsConfig) -> Result<Self, NotifyError> {
        let channels = build_channels(config)?;
        let renderer = TemplateRenderer::with_overrides(config.templates.clone())?;
        Ok(Self::new(
            channels,
            renderer,
            Duration::from_millis(config.timeout_ms),
        ))
    }

    /// A dispatcher with no channels. Every event is a no-op.
    pub fn empty() -> Self {
        Self::new(Vec::new(), TemplateRenderer::new(), Duration::from_secs(10))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Render an event and deliver it to every channel.
    pub async fn notify(&self, event: &NotificationEvent) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::debug!(event = event.kind(), "no notification channels enabled");
            return Vec::new();
        }
        let notification = self.renderer.render_event(event);
        self.dispatch(&notification).await
    }

    /// Deliver an already-rendered notification to every channel.
    ///
    /// Returns one result per channel in channel order.
    pub async fn dispatch(&self, notification: &Notification) -> Vec<DispatchResult> {
        let event = notification
            .metadata
            .get("event")
            .cloned()
            .unwrap_or_default();

        let sends = self
            .channels
            .iter()
            .map(|channel| self.send_one(channel, notification, &event));
        join_all(sends).await
    }

    async fn send_one(
        &self,
        channel: &Channel,
        notification: &Notification,
        event: &str,
    ) -> DispatchResult {
        let name = channel.kind.as_str();
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, channel.notifier.send(notification)).await {
            Ok(inner) => inner,
            Err(_) => Err(NotifyError::Timeout(self.timeout.as_millis() as u64)),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, error) = match result {
            Ok(()) => {
                tracing::info!(channel = name, event, duration_ms, "notification delivered");
                (true, None)
            }
            Err(e) => {
                if channel.notifier.best_effort() {
                    tracing::debug!(channel = name, event, error = %e, duration_ms, "notification delivery failed");
                } else {
                    tracing::warn!(channel = name, event, error = %e, duration_ms, "notification delivery failed");
                }
                (false, Some(e.to_string()))
            }
        };

        DispatchResult {
            channel: name.to_string(),
            event: event.to_string(),
            success,
            error,
            duration_ms,
        }
    }

    /// Send a test message through every channel.
    pub async fn test_all(&self) -> Vec<DispatchResult> {
        let tests = self.channels.iter().map(|channel| async move {
            let name = channel.kind.as_str();
            let start = Instant::now();
            let result =
                match tokio::time::timeout(self.timeout, channel.notifier.test()).await {
                    Ok(inner) => inner,
                    Err(_) => Err(NotifyError::Timeout(self.timeout.as_millis() as u64)),
                };
            DispatchResult {
                channel: name.to_string(),
                event: "test".to_string(),
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
                duration_ms: start.elapsed().as_millis() as u64,
            }
        });
        join_all(tests).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use relay_core::MeetingRecord;

    use super::*;
    use crate::channels::ChannelKind;
    use crate::traits::Notifier;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
        delay: Option<Duration>,
        best_effort: bool,
        last_subject: Arc<Mutex<Option<String>>>,
    }

    impl MockNotifier {
        fn new(name: &str, send_count: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                send_count,
                should_fail: false,
                delay: None,
                best_effort: false,
                last_subject: Arc::new(Mutex::new(None)),
            }
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.send_count.fetch_add(1, Ordering::SeqCst);
            *self.last_subject.lock().unwrap() = Some(notification.subject.clone());
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
        fn best_effort(&self) -> bool {
            self.best_effort
        }
    }

    fn channel(kind: ChannelKind, notifier: MockNotifier) -> Channel {
        Channel::new(kind, Box::new(notifier))
    }

    fn delivered() -> NotificationEvent {
        NotificationEvent::Delivered {
            meeting: MeetingRecord::new("m-1", "Weekly Sync", Utc::now()),
            organization: "OMAI".to_string(),
        }
    }

    #[tokio::test]
    async fn notify_reaches_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let subject = Arc::new(Mutex::new(None));
        let mut slack = MockNotifier::new("slack", count_a.clone());
        slack.last_subject = subject.clone();

        let dispatcher = Dispatcher::new(
            vec![
                channel(ChannelKind::Slack, slack),
                channel(ChannelKind::Discord, MockNotifier::new("discord", count_b.clone())),
            ],
            TemplateRenderer::new(),
            Duration::from_secs(1),
        );

        let results = dispatcher.notify(&delivered()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert!(results.iter().all(|r| r.event == "delivered"));
        assert_eq!(results[0].channel, "slack");
        assert_eq!(results[1].channel, "discord");
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
        assert_eq!(
            subject.lock().unwrap().as_deref(),
            Some("Meeting delivered: Weekly Sync")
        );
    }

    #[tokio::test]
    async fn one_failing_channel_doesnt_block_others() {
        let slack_count = Arc::new(AtomicUsize::new(0));
        let email_count = Arc::new(AtomicUsize::new(0));
        let mut discord = MockNotifier::new("discord", Arc::new(AtomicUsize::new(0)));
        discord.should_fail = true;

        let dispatcher = Dispatcher::new(
            vec![
                channel(ChannelKind::Slack, MockNotifier::new("slack", slack_count.clone())),
                channel(ChannelKind::Discord, discord),
                channel(ChannelKind::Email, MockNotifier::new("email", email_count.clone())),
            ],
            TemplateRenderer::new(),
            Duration::from_secs(1),
        );

        let results = dispatcher.notify(&delivered()).await;
        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("mock failure"));
        assert!(results[2].success);
        assert_eq!(slack_count.load(Ordering::SeqCst), 1);
        assert_eq!(email_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hanging_channel_times_out() {
        let fast_count = Arc::new(AtomicUsize::new(0));
        let mut slow = MockNotifier::new("desktop", Arc::new(AtomicUsize::new(0)));
        slow.delay = Some(Duration::from_secs(5));
        slow.best_effort = true;

        let dispatcher = Dispatcher::new(
            vec![
                channel(ChannelKind::Desktop, slow),
                channel(ChannelKind::Slack, MockNotifier::new("slack", fast_count.clone())),
            ],
            TemplateRenderer::new(),
            Duration::from_millis(50),
        );

        let start = Instant::now();
        let results = dispatcher.notify(&NotificationEvent::StreakAlert { count: 3 }).await;
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("timed out after 50ms"));
        assert!(results[1].success);
        assert_eq!(fast_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_dispatcher_is_noop() {
        let dispatcher = Dispatcher::empty();
        assert_eq!(dispatcher.channel_count(), 0);
        assert!(dispatcher.notify(&delivered()).await.is_empty());
    }

    #[tokio::test]
    async fn test_all_uses_test_message() {
        let count = Arc::new(AtomicUsize::new(0));
        let subject = Arc::new(Mutex::new(None));
        let mut slack = MockNotifier::new("slack", count.clone());
        slack.last_subject = subject.clone();

        let dispatcher = Dispatcher::new(
            vec![channel(ChannelKind::Slack, slack)],
            TemplateRenderer::new(),
            Duration::from_secs(1),
        );
        let results = dispatcher.test_all().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].event, "test");
        assert!(subject.lock().unwrap().as_deref().unwrap().starts_with("[TEST]"));
    }

    #[test]
    fn from_config_without_channels() {
        let dispatcher = Dispatcher::from_config(&NotificationsConfig::default()).unwrap();
        assert_eq!(dispatcher.channel_count(), 0);
    }
}
