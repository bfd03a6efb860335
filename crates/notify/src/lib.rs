//! Human-facing notifications for monitor events.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Slack, Discord, email, and desktop notifier implementations
//! - `NotificationEvent` and minijinja rendering of subject/body pairs
//! - `Dispatcher` that fans a notification out to every enabled channel

pub mod channels;
pub mod desktop;
pub mod discord;
pub mod dispatcher;
pub mod email;
pub mod event;
pub mod slack;
pub mod templating;
pub mod traits;

pub use channels::{build_channels, Channel, ChannelKind};
pub use dispatcher::Dispatcher;
pub use event::NotificationEvent;
pub use traits::{DispatchResult, Notification, Notifier, NotifyError};
