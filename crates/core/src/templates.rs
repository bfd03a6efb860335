//! Note-template gate.
//!
//! When template validation is enabled, a meeting is only forwarded if it
//! carries the configured note templates. Rejected meetings are skipped,
//! not recorded, so they are reconsidered once the template is applied.

use crate::config::{TemplateMatchMode, TemplateValidationConfig};
use crate::meeting::MeetingRecord;

/// Returns the skip reason when the meeting fails template validation.
pub fn template_skip_reason(
    meeting: &MeetingRecord,
    config: &TemplateValidationConfig,
) -> Option<String> {
    if !config.enabled {
        return None;
    }

    let ids = config
        .required_template_ids
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());
    let names = config
        .template_names
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    let mut required: Vec<(&str, bool)> = Vec::new();
    for id in ids {
        let present = meeting.templates.iter().any(|t| t.id == id);
        required.push((id, present));
    }
    for name in names {
        let present = meeting
            .templates
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(name));
        required.push((name, present));
    }

    if required.is_empty() {
        return None;
    }

    match config.mode {
        TemplateMatchMode::Any => {
            if required.iter().any(|(_, present)| *present) {
                None
            } else {
                let wanted: Vec<&str> = required.iter().map(|(t, _)| *t).collect();
                Some(format!("no required template applied (any of: {})", wanted.join(", ")))
            }
        }
        TemplateMatchMode::All => {
            let missing: Vec<&str> = required
                .iter()
                .filter(|(_, present)| !*present)
                .map(|(t, _)| *t)
                .collect();
            if missing.is_empty() {
                None
            } else {
                Some(format!("missing required templates: {}", missing.join(", ")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::meeting::TemplateRef;

    fn meeting_with(templates: &[(&str, &str)]) -> MeetingRecord {
        let mut m = MeetingRecord::new("m", "Weekly", Utc::now());
        m.templates = templates
            .iter()
            .map(|(id, name)| TemplateRef {
                id: id.to_string(),
                name: name.to_string(),
            })
            .collect();
        m
    }

    fn config(mode: TemplateMatchMode, ids: &[&str], names: &[&str]) -> TemplateValidationConfig {
        TemplateValidationConfig {
            enabled: true,
            mode,
            required_template_ids: ids.iter().map(|s| s.to_string()).collect(),
            template_names: names.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn disabled_always_passes() {
        let mut cfg = config(TemplateMatchMode::All, &["t1"], &[]);
        cfg.enabled = false;
        assert!(template_skip_reason(&meeting_with(&[]), &cfg).is_none());
    }

    #[test]
    fn enabled_without_requirements_passes() {
        let cfg = config(TemplateMatchMode::Any, &[], &["  "]);
        assert!(template_skip_reason(&meeting_with(&[]), &cfg).is_none());
    }

    #[test]
    fn any_mode_needs_one_match() {
        let cfg = config(TemplateMatchMode::Any, &["t1"], &["Customer Call"]);
        assert!(template_skip_reason(&meeting_with(&[("x", "customer call")]), &cfg).is_none());
        assert!(template_skip_reason(&meeting_with(&[("t1", "")]), &cfg).is_none());

        let reason = template_skip_reason(&meeting_with(&[("x", "Other")]), &cfg).unwrap();
        assert!(reason.contains("t1"));
        assert!(reason.contains("Customer Call"));
    }

    #[test]
    fn all_mode_lists_missing_templates() {
        let cfg = config(TemplateMatchMode::All, &["t1", "t2"], &[]);
        assert!(template_skip_reason(&meeting_with(&[("t1", ""), ("t2", "")]), &cfg).is_none());

        let reason = template_skip_reason(&meeting_with(&[("t1", "")]), &cfg).unwrap();
        assert_eq!(reason, "missing required templates: t2");
    }
}
