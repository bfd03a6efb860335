//! Meeting source backed by the notes app's local cache file.
//!
//! The cache file is double-JSON-encoded: the top-level `cache` field is a
//! JSON string that must be parsed again to get `{state: {documents,
//! transcripts}}`. Only documents with `type == "meeting"` and
//! `valid_meeting == true` are meetings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relay_core::config::SourceConfig;
use relay_core::{MeetingRecord, TemplateRef};
use serde::Deserialize;

use crate::error::SourceError;
use crate::source::MeetingSource;

const CACHE_FILE_NAME: &str = "cache-v3.json";
const UNTITLED: &str = "Untitled meeting";

#[derive(Debug, Deserialize)]
struct CacheFile {
    cache: String,
}

#[derive(Debug, Deserialize)]
struct CacheState {
    state: InnerState,
}

#[derive(Debug, Deserialize)]
struct InnerState {
    #[serde(default)]
    documents: HashMap<String, RawDocument>,
    #[serde(default)]
    transcripts: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    id: Option<String>,
    title: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    notes_markdown: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<String>,
    #[serde(default)]
    valid_meeting: Option<bool>,
    google_calendar_event: Option<CalendarEvent>,
    people: Option<People>,
    #[serde(default)]
    templates: Vec<RawTemplate>,
}

#[derive(Debug, Deserialize)]
struct CalendarEvent {
    #[serde(default)]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Deserialize)]
struct People {
    #[serde(default)]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Deserialize)]
struct Attendee {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTemplate {
    id: Option<String>,
    #[serde(alias = "title")]
    name: Option<String>,
}

/// Reads meetings from the local notes cache.
#[derive(Debug, Clone)]
pub struct CacheFileSource {
    path: PathBuf,
}

impl CacheFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `source.cachePath`, or the notes app's default location under the
    /// platform config directory.
    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        if let Some(path) = &config.cache_path {
            return Ok(Self::new(path.clone()));
        }
        let dir = dirs::config_dir().ok_or_else(|| {
            SourceError::Unavailable("no platform config directory; set source.cachePath".to_string())
        })?;
        Ok(Self::new(dir.join("Granola").join(CACHE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl MeetingSource for CacheFileSource {
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<MeetingRecord>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let meetings: Vec<MeetingRecord> = parse_cache(&raw)?
            .into_iter()
            .filter(|m| m.created_at >= since)
            .collect();
        tracing::debug!(path = %self.path.display(), count = meetings.len(), "read meetings from cache");
        Ok(meetings)
    }

    fn source_name(&self) -> &str {
        "cache"
    }
}

/// Parse a cache file into meeting records. Documents without a usable
/// creation timestamp are dropped.
fn parse_cache(raw: &str) -> Result<Vec<MeetingRecord>, SourceError> {
    let outer: CacheFile = serde_json::from_str(raw)
        .map_err(|e| SourceError::Malformed(format!("outer JSON: {e}")))?;
    let inner: CacheState = serde_json::from_str(&outer.cache)
        .map_err(|e| SourceError::Malformed(format!("inner JSON: {e}")))?;

    let mut meetings = Vec::new();
    for (key, doc) in &inner.state.documents {
        if doc.valid_meeting != Some(true) || doc.doc_type.as_deref() != Some("meeting") {
            continue;
        }
        let id = doc.id.as_deref().unwrap_or(key).to_string();

        let created_at = match doc
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            Some(ts) => ts.with_timezone(&Utc),
            None => {
                tracing::debug!(meeting_id = %id, "document has no valid created_at, ignoring");
                continue;
            }
        };

        let title = doc
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED);

        let mut meeting = MeetingRecord::new(id, title, created_at);
        meeting.transcript = inner
            .state
            .transcripts
            .get(&meeting.id)
            .and_then(transcript_text)
            .filter(|t| !t.trim().is_empty());
        meeting.notes = doc.notes_markdown.clone().filter(|n| !n.trim().is_empty());
        meeting.attendees = attendee_emails(doc);
        meeting.templates = doc
            .templates
            .iter()
            .filter_map(|t| {
                let id = t.id.clone()?;
                Some(TemplateRef {
                    name: t.name.clone().unwrap_or_else(|| id.clone()),
                    id,
                })
            })
            .collect();
        meetings.push(meeting);
    }
    Ok(meetings)
}

/// Lowercased attendee emails from the calendar event, then people, deduplicated.
fn attendee_emails(doc: &RawDocument) -> Vec<String> {
    let calendar = doc
        .google_calendar_event
        .iter()
        .flat_map(|e| e.attendees.iter());
    let people = doc.people.iter().flat_map(|p| p.attendees.iter());

    let mut emails: Vec<String> = Vec::new();
    for email in calendar.chain(people).filter_map(|a| a.email.as_deref()) {
        let lower = email.trim().to_lowercase();
        if !lower.is_empty() && !emails.contains(&lower) {
            emails.push(lower);
        }
    }
    emails
}

/// Transcript text from a string, a `{text}` / `{transcript}` object, or an
/// array of segments each carrying `text`.
fn transcript_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(obj) => obj
            .get("text")
            .or_else(|| obj.get("transcript"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        serde_json::Value::Array(segments) => {
            let parts: Vec<&str> = segments
                .iter()
                .filter_map(|s| s.get("text").and_then(|v| v.as_str()))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}
