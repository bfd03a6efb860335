//! Local desktop notifications.
//!
//! Uses `osascript` on macOS and `notify-send` on Linux. Other platforms
//! report the channel as unsupported. Desktop delivery is best-effort: a
//! missing binary or headless session never counts as a channel failure
//! worth a warning.

use tokio::process::Command;

use crate::traits::{Notification, Notifier, NotifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    AppleScript,
    NotifySend,
    Unsupported,
}

impl Backend {
    fn detect() -> Self {
        if cfg!(target_os = "macos") {
            Self::AppleScript
        } else if cfg!(target_os = "linux") {
            Self::NotifySend
        } else {
            Self::Unsupported
        }
    }
}

/// Shows a notification banner on the machine running the monitor.
#[derive(Debug)]
pub struct DesktopNotifier {
    sound: bool,
    backend: Backend,
}

impl DesktopNotifier {
    pub fn new(sound: bool) -> Self {
        Self {
            sound,
            backend: Backend::detect(),
        }
    }

    fn command(&self, notification: &Notification) -> Option<Command> {
        match self.backend {
            Backend::AppleScript => {
                let mut script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_applescript(&notification.body),
                    escape_applescript(&notification.subject),
                );
                if self.sound {
                    script.push_str(" sound name \"default\"");
                }
                let mut cmd = Command::new("osascript");
                cmd.arg("-e").arg(script);
                Some(cmd)
            }
            Backend::NotifySend => {
                let mut cmd = Command::new("notify-send");
                cmd.arg("--app-name=meeting-relay")
                    .arg(&notification.subject)
                    .arg(&notification.body);
                Some(cmd)
            }
            Backend::Unsupported => None,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut cmd = self.command(notification).ok_or_else(|| {
            NotifyError::Desktop("desktop notifications are not supported on this platform".to_string())
        })?;

        let output = cmd
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NotifyError::Desktop(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::Desktop(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(channel = "desktop", subject = %notification.subject, "notification shown");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "desktop"
    }

    fn best_effort(&self) -> bool {
        true
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
