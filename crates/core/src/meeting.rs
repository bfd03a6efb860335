use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed meeting as produced by the upstream notes source. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// Attendee email addresses, deduplicated by the source.
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Free-form meeting notes; searched by company-name rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Note templates applied to the meeting in the source app.
    #[serde(default)]
    pub templates: Vec<TemplateRef>,
}

impl MeetingRecord {
    /// Minimal record with only the mandatory fields set.
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at,
            transcript: None,
            attendees: Vec::new(),
            notes: None,
            templates: Vec::new(),
        }
    }
}

/// Reference to a note template attached to a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// One organization-matching rule. Rules are evaluated in configured order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRule {
    pub name: String,
    #[serde(default)]
    pub title_keywords: Vec<String>,
    #[serde(default)]
    pub email_domains: Vec<String>,
    #[serde(default)]
    pub email_addresses: Vec<String>,
    #[serde(default)]
    pub company_names: Vec<String>,
}
