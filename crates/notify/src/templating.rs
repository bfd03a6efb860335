//! Minijinja template rendering for notification messages.
//!
//! Every [`NotificationEvent`] kind has a built-in subject and body
//! template. Either can be overridden from config under
//! `notifications.templates.<kind>`. Overrides are syntax-checked when the
//! renderer is built; if one still fails at render time the built-in
//! template is used instead, so an event always produces a message.

use std::collections::HashMap;

use relay_core::config::MessageTemplate;

use crate::event::NotificationEvent;
use crate::traits::{Notification, NotifyError};

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    /// Event kind (`delivered`, `skipped`, `failed`, `streakAlert`, `ledgerRecovered`).
    pub event: String,
    pub meeting: Option<MeetingContext>,
    pub organization: Option<String>,
    pub reason: Option<String>,
    pub error: Option<String>,
    pub attempt: Option<u32>,
    /// Failure streak length for streak alerts.
    pub count: Option<u32>,
    /// State file path for ledger recovery warnings.
    pub path: Option<String>,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

/// Meeting fields exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MeetingContext {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub attendees: Vec<String>,
}

impl TemplateContext {
    pub fn from_event(event: &NotificationEvent) -> Self {
        let mut ctx = Self {
            event: event.kind().to_string(),
            meeting: event.meeting().map(|m| MeetingContext {
                id: m.id.clone(),
                title: m.title.clone(),
                created_at: m.created_at.to_rfc3339(),
                attendees: m.attendees.clone(),
            }),
            organization: None,
            reason: None,
            error: None,
            attempt: None,
            count: None,
            path: None,
            now: chrono::Utc::now().to_rfc3339(),
        };
        match event {
            NotificationEvent::Delivered { organization, .. } => {
                ctx.organization = Some(organization.clone());
            }
            NotificationEvent::Skipped { reason, .. } => ctx.reason = Some(reason.clone()),
            NotificationEvent::Failed { error, attempt, .. } => {
                ctx.error = Some(error.clone());
                ctx.attempt = Some(*attempt);
            }
            NotificationEvent::StreakAlert { count } => ctx.count = Some(*count),
            NotificationEvent::LedgerRecovered { path, error } => {
                ctx.path = Some(path.clone());
                ctx.error = Some(error.clone());
            }
        }
        ctx
    }
}

/// Built-in (subject, body) templates per event kind.
fn default_templates(kind: &str) -> (&'static str, &'static str) {
    match kind {
        "delivered" => (
            "Meeting delivered: {{ meeting.title }}",
            "\"{{ meeting.title }}\" ({{ meeting.id }}) was sent to the webhook as {{ organization }}.",
        ),
        "skipped" => (
            "Meeting skipped: {{ meeting.title }}",
            "\"{{ meeting.title }}\" ({{ meeting.id }}) was skipped: {{ reason }}",
        ),
        "failed" => (
            "Meeting delivery failed: {{ meeting.title }}",
            "Delivering \"{{ meeting.title }}\" ({{ meeting.id }}) failed after {{ attempt }} attempt(s): {{ error }}",
        ),
        "streakAlert" => (
            "{{ count }} consecutive meeting deliveries failed",
            "The last {{ count }} meetings could not be delivered. Check the webhook endpoint and the monitor logs.",
        ),
        "ledgerRecovered" => (
            "Meeting ledger was reset",
            "State file {{ path }} could not be read ({{ error }}). A fresh ledger was started; meetings inside the lookback window may be sent again.",
        ),
        _ => ("{{ event }}", "{{ event }} at {{ now }}"),
    }
}

/// Renders notification templates using minijinja.
///
/// A fresh [`minijinja::Environment`] is created per render call since
/// templates are dynamic strings, not pre-registered files.
#[derive(Debug, Default)]
pub struct TemplateRenderer {
    overrides: HashMap<String, MessageTemplate>,
}

impl TemplateRenderer {
    /// Create a renderer using only the built-in templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a renderer with per-kind overrides, validating their syntax.
    pub fn with_overrides(overrides: HashMap<String, MessageTemplate>) -> Result<Self, NotifyError> {
        let renderer = Self { overrides };
        for (kind, tmpl) in &renderer.overrides {
            for source in [tmpl.subject.as_deref(), tmpl.body.as_deref()].into_iter().flatten() {
                renderer.validate(source).map_err(|e| {
                    NotifyError::Config(format!("invalid template for '{kind}': {e}"))
                })?;
            }
        }
        Ok(renderer)
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);
        env.add_function("env", env_function);
        env
    }

    /// Render a template string with the given context.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }

    /// Render the subject/body pair for an event.
    pub fn render_event(&self, event: &NotificationEvent) -> Notification {
        let ctx = TemplateContext::from_event(event);
        let kind = event.kind();
        let (default_subject, default_body) = default_templates(kind);
        let custom = self.overrides.get(kind);

        let subject = self.render_with_fallback(
            custom.and_then(|t| t.subject.as_deref()),
            default_subject,
            &ctx,
        );
        let body = self.render_with_fallback(
            custom.and_then(|t| t.body.as_deref()),
            default_body,
            &ctx,
        );

        let mut metadata = HashMap::from([("event".to_string(), kind.to_string())]);
        if let Some(m) = &ctx.meeting {
            metadata.insert("meeting_id".to_string(), m.id.clone());
        }
        if let Some(org) = &ctx.organization {
            metadata.insert("organization".to_string(), org.clone());
        }

        Notification {
            subject,
            body,
            metadata,
        }
    }

    fn render_with_fallback(
        &self,
        custom: Option<&str>,
        default: &str,
        ctx: &TemplateContext,
    ) -> String {
        if let Some(tmpl) = custom {
            match self.render(tmpl, ctx) {
                Ok(out) => return out,
                Err(e) => {
                    tracing::warn!(event = %ctx.event, error = %e, "custom template failed, using default");
                }
            }
        }
        self.render(default, ctx)
            .unwrap_or_else(|_| format!("meeting-relay: {}", ctx.event))
    }
}

/// Custom filter: lowercase a string.
fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

/// Custom filter: uppercase a string.
fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found
/// (with a warning logged via tracing).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use relay_core::MeetingRecord;

    use super::*;

    fn meeting() -> MeetingRecord {
        let mut m = MeetingRecord::new(
            "m-42",
            "Team Talk Tuesday",
            Utc.with_ymd_and_hms(2026, 3, 3, 15, 0, 0).unwrap(),
        );
        m.attendees = vec!["josh@omaihq.com".to_string()];
        m
    }

    #[test]
    fn delivered_uses_builtin_templates() {
        let renderer = TemplateRenderer::new();
        let n = renderer.render_event(&NotificationEvent::Delivered {
            meeting: meeting(),
            organization: "OMAI".to_string(),
        });
        assert_eq!(n.subject, "Meeting delivered: Team Talk Tuesday");
        assert!(n.body.contains("m-42"));
        assert!(n.body.contains("OMAI"));
        assert_eq!(n.metadata["event"], "delivered");
        assert_eq!(n.metadata["meeting_id"], "m-42");
        assert_eq!(n.metadata["organization"], "OMAI");
    }

    #[test]
    fn failed_includes_attempt_and_error() {
        let renderer = TemplateRenderer::new();
        let n = renderer.render_event(&NotificationEvent::Failed {
            meeting: meeting(),
            error: "HTTP 500".to_string(),
            attempt: 3,
        });
        assert!(n.body.contains("3 attempt(s)"));
        assert!(n.body.contains("HTTP 500"));
    }

    #[test]
    fn streak_alert_has_no_meeting() {
        let renderer = TemplateRenderer::new();
        let n = renderer.render_event(&NotificationEvent::StreakAlert { count: 4 });
        assert_eq!(n.subject, "4 consecutive meeting deliveries failed");
        assert!(!n.metadata.contains_key("meeting_id"));
    }

    #[test]
    fn override_replaces_subject_only() {
        let overrides = HashMap::from([(
            "skipped".to_string(),
            MessageTemplate {
                subject: Some("[skip] {{ meeting.title | upper }}".to_string()),
                body: None,
            },
        )]);
        let renderer = TemplateRenderer::with_overrides(overrides).unwrap();
        let n = renderer.render_event(&NotificationEvent::Skipped {
            meeting: meeting(),
            reason: "no template".to_string(),
        });
        assert_eq!(n.subject, "[skip] TEAM TALK TUESDAY");
        assert!(n.body.contains("no template"));
    }

    #[test]
    fn invalid_override_rejected_at_build() {
        let overrides = HashMap::from([(
            "failed".to_string(),
            MessageTemplate {
                subject: None,
                body: Some("{{ unclosed".to_string()),
            },
        )]);
        match TemplateRenderer::with_overrides(overrides).unwrap_err() {
            NotifyError::Config(msg) => assert!(msg.contains("failed")),
            other => panic!("expected Config error, got: {other:?}"),
        }
    }

    #[test]
    fn runtime_override_failure_falls_back() {
        let overrides = HashMap::from([(
            "delivered".to_string(),
            MessageTemplate {
                // Parses, but calling a string fails at render time.
                subject: Some("{{ organization() }}".to_string()),
                body: None,
            },
        )]);
        let renderer = TemplateRenderer::with_overrides(overrides).unwrap();
        let n = renderer.render_event(&NotificationEvent::Delivered {
            meeting: meeting(),
            organization: "OMAI".to_string(),
        });
        assert_eq!(n.subject, "Meeting delivered: Team Talk Tuesday");
    }

    #[test]
    fn render_env_function() {
        std::env::set_var("RELAY_NOTIFY_TEST_VAR", "hello_notify");
        let renderer = TemplateRenderer::new();
        let ctx = TemplateContext::from_event(&NotificationEvent::StreakAlert { count: 1 });
        let result = renderer
            .render("Env: {{ env('RELAY_NOTIFY_TEST_VAR') }}", &ctx)
            .unwrap();
        assert_eq!(result, "Env: hello_notify");
        std::env::remove_var("RELAY_NOTIFY_TEST_VAR");
    }

    #[test]
    fn attendee_iteration() {
        let renderer = TemplateRenderer::new();
        let ctx = TemplateContext::from_event(&NotificationEvent::Skipped {
            meeting: meeting(),
            reason: "r".to_string(),
        });
        let out = renderer
            .render("{% for a in meeting.attendees %}{{ a }}{% endfor %}", &ctx)
            .unwrap();
        assert_eq!(out, "josh@omaihq.com");
    }
}
