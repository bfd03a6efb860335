//! The flat record published to every sink, and field mapping.

use chrono::{DateTime, Utc};
use relay_core::config::FieldMapping;
use relay_core::MeetingRecord;
use relay_delivery::DeliveryReport;
use serde::Serialize;
use serde_json::{Map, Value};

/// Internal field names in their default column order.
pub const CANONICAL_FIELDS: [&str; 10] = [
    "meetingId",
    "title",
    "organization",
    "createdAt",
    "attendees",
    "success",
    "attempts",
    "httpStatus",
    "error",
    "processedAt",
];

/// One processed meeting, as seen by output sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRecord {
    pub meeting_id: String,
    pub title: String,
    pub organization: String,
    pub created_at: DateTime<Utc>,
    pub attendees: Vec<String>,
    pub success: bool,
    pub attempts: u32,
    pub http_status: Option<u16>,
    pub error: Option<String>,
    pub processed_at: DateTime<Utc>,
}

impl OutputRecord {
    pub fn build(meeting: &MeetingRecord, organization: &str, report: &DeliveryReport) -> Self {
        let last = report.final_outcome();
        Self {
            meeting_id: meeting.id.clone(),
            title: meeting.title.clone(),
            organization: organization.to_string(),
            created_at: meeting.created_at,
            attendees: meeting.attendees.clone(),
            success: report.succeeded(),
            attempts: report.attempt_count(),
            http_status: last.and_then(|o| o.http_status),
            error: last.and_then(|o| o.error.clone()),
            processed_at: Utc::now(),
        }
    }

    /// Value of an internal field by name, `None` for unknown names.
    pub fn field(&self, name: &str) -> Option<Value> {
        let value = match name {
            "meetingId" => Value::from(self.meeting_id.as_str()),
            "title" => Value::from(self.title.as_str()),
            "organization" => Value::from(self.organization.as_str()),
            "createdAt" => Value::from(self.created_at.to_rfc3339()),
            "attendees" => Value::from(self.attendees.clone()),
            "success" => Value::from(self.success),
            "attempts" => Value::from(self.attempts),
            "httpStatus" => self.http_status.map(Value::from).unwrap_or(Value::Null),
            "error" => self.error.as_deref().map(Value::from).unwrap_or(Value::Null),
            "processedAt" => Value::from(self.processed_at.to_rfc3339()),
            _ => return None,
        };
        Some(value)
    }

    /// Object keyed by destination column name.
    ///
    /// An empty mapping yields every canonical field under its own name.
    /// Otherwise only the mapped fields are emitted, renamed; unknown
    /// internal names in the mapping are skipped with a warning.
    pub fn mapped(&self, mapping: &FieldMapping) -> Map<String, Value> {
        let mut out = Map::new();
        if mapping.is_empty() {
            for name in CANONICAL_FIELDS {
                if let Some(value) = self.field(name) {
                    out.insert(name.to_string(), value);
                }
            }
            return out;
        }
        for (internal, column) in mapping {
            match self.field(internal) {
                Some(value) => {
                    out.insert(column.clone(), value);
                }
                None => tracing::warn!(field = %internal, "unknown field in output mapping"),
            }
        }
        out
    }

    /// Values in the given column order, flattened to spreadsheet cells.
    /// Empty `columns` means [`CANONICAL_FIELDS`].
    pub fn row(&self, columns: &[String]) -> Vec<Value> {
        if columns.is_empty() {
            return CANONICAL_FIELDS
                .iter()
                .map(|name| flatten(self.field(name).unwrap_or(Value::Null)))
                .collect();
        }
        columns
            .iter()
            .map(|name| flatten(self.field(name).unwrap_or(Value::Null)))
            .collect()
    }
}

/// Arrays become comma-separated strings and nulls empty strings.
pub(crate) fn flatten(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::from(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Null => Value::from(""),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use relay_delivery::DeliveryOutcome;

    use super::*;

    fn record(success: bool) -> OutputRecord {
        let mut meeting = MeetingRecord::new(
            "m-7",
            "Roadmap Review",
            Utc.with_ymd_and_hms(2026, 5, 4, 9, 30, 0).unwrap(),
        );
        meeting.attendees = vec!["a@omaihq.com".to_string(), "b@example.com".to_string()];
        let report = DeliveryReport {
            attempts: vec![DeliveryOutcome {
                attempt: 1,
                success,
                http_status: Some(if success { 200 } else { 500 }),
                error: (!success).then(|| "HTTP 500".to_string()),
                elapsed_ms: 12,
            }],
        };
        OutputRecord::build(&meeting, "OMAI", &report)
    }

    #[test]
    fn build_takes_last_outcome() {
        let r = record(false);
        assert!(!r.success);
        assert_eq!(r.attempts, 1);
        assert_eq!(r.http_status, Some(500));
        assert_eq!(r.error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn empty_mapping_uses_canonical_names() {
        let m = record(true).mapped(&FieldMapping::new());
        assert_eq!(m.len(), CANONICAL_FIELDS.len());
        assert_eq!(m["meetingId"], "m-7");
        assert_eq!(m["organization"], "OMAI");
        assert_eq!(m["attendees"][1], "b@example.com");
        assert_eq!(m["error"], Value::Null);
    }

    #[test]
    fn mapping_renames_and_selects() {
        let mapping = FieldMapping::from([
            ("title".to_string(), "Meeting".to_string()),
            ("organization".to_string(), "Client".to_string()),
            ("bogus".to_string(), "Nope".to_string()),
        ]);
        let m = record(true).mapped(&mapping);
        assert_eq!(m.len(), 2);
        assert_eq!(m["Meeting"], "Roadmap Review");
        assert_eq!(m["Client"], "OMAI");
    }

    #[test]
    fn row_follows_column_order_and_flattens() {
        let columns = vec![
            "organization".to_string(),
            "attendees".to_string(),
            "error".to_string(),
        ];
        let row = record(true).row(&columns);
        assert_eq!(
            row,
            vec![
                Value::from("OMAI"),
                Value::from("a@omaihq.com, b@example.com"),
                Value::from(""),
            ]
        );
    }

    #[test]
    fn default_row_has_every_canonical_field() {
        let row = record(true).row(&[]);
        assert_eq!(row.len(), CANONICAL_FIELDS.len());
        assert_eq!(row[0], "m-7");
    }
}
