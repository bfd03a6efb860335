use relay_core::MeetingRecord;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// JSON body posted to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub meeting_id: String,
    pub title: String,
    pub organization: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl WebhookPayload {
    pub fn build(meeting: &MeetingRecord, organization: &str, include_transcript: bool) -> Self {
        Self {
            meeting_id: meeting.id.clone(),
            title: meeting.title.clone(),
            organization: organization.to_string(),
            transcript: if include_transcript {
                meeting.transcript.clone()
            } else {
                None
            },
        }
    }

    /// Serialize once; these bytes are both signed and sent.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeliveryError> {
        serde_json::to_vec(self).map_err(|e| DeliveryError::Payload(e.to_string()))
    }
}
