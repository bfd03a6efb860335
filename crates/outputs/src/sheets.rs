//! Google Sheets sink: appends one row per record.
//!
//! Uses the `values.append` endpoint with a pre-issued OAuth access token.
//! Column order comes from `columns`, defaulting to the canonical field order.

use relay_core::config::GoogleSheetsConfig;
use serde_json::json;

use crate::error::SinkError;
use crate::record::OutputRecord;
use crate::sink::OutputSink;

const SHEETS_API: &str = "https://sheets.googleapis.com";

#[derive(Debug)]
pub struct GoogleSheetsSink {
    spreadsheet_id: String,
    range: String,
    access_token: String,
    columns: Vec<String>,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleSheetsSink {
    pub fn from_config(cfg: &GoogleSheetsConfig) -> Result<Self, SinkError> {
        if cfg.spreadsheet_id.is_empty() || cfg.access_token.is_empty() {
            return Err(SinkError::Config(
                "googleSheets needs spreadsheetId and accessToken".to_string(),
            ));
        }
        Ok(Self {
            spreadsheet_id: cfg.spreadsheet_id.clone(),
            range: cfg.range.clone(),
            access_token: cfg.access_token.clone(),
            columns: cfg.columns.clone(),
            base_url: SHEETS_API.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point the sink at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> Result<reqwest::Url, SinkError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| SinkError::Config(format!("invalid Sheets URL: {e}")))?;
        let append = format!("{}:append", self.range);
        url.path_segments_mut()
            .map_err(|_| SinkError::Config("Sheets URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                append.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl OutputSink for GoogleSheetsSink {
    async fn deliver(&self, record: &OutputRecord) -> Result<(), SinkError> {
        let body = json!({ "values": [record.row(&self.columns)] });
        let response = self
            .client
            .post(self.endpoint()?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::from_response(response).await);
        }

        tracing::debug!(sink = "googleSheets", range = %self.range, meeting_id = %record.meeting_id, "row appended");
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "googleSheets"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn record() -> OutputRecord {
        OutputRecord {
            meeting_id: "m-3".to_string(),
            title: "Standup".to_string(),
            organization: "Unknown".to_string(),
            created_at: Utc::now(),
            attendees: Vec::new(),
            success: false,
            attempts: 3,
            http_status: Some(503),
            error: Some("HTTP 503".to_string()),
            processed_at: Utc::now(),
        }
    }

    fn config() -> GoogleSheetsConfig {
        GoogleSheetsConfig {
            enabled: true,
            spreadsheet_id: "sheet-1".to_string(),
            range: "Log!A1".to_string(),
            access_token: "ya29.token".to_string(),
            columns: vec![
                "meetingId".to_string(),
                "success".to_string(),
                "attempts".to_string(),
                "error".to_string(),
            ],
        }
    }

    #[tokio::test]
    async fn appends_row_in_column_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Log!A1:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(header("Authorization", "Bearer ya29.token"))
            .and(body_json(json!({"values": [["m-3", false, 3, "HTTP 503"]]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updates": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let sink = GoogleSheetsSink::from_config(&config())
            .unwrap()
            .with_base_url(server.uri());
        sink.deliver(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn expired_token_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("UNAUTHENTICATED"))
            .mount(&server)
            .await;

        let sink = GoogleSheetsSink::from_config(&config())
            .unwrap()
            .with_base_url(server.uri());
        match sink.deliver(&record()).await.unwrap_err() {
            SinkError::Status { status, .. } => assert_eq!(status, 401),
            other => panic!("expected Status error, got: {other:?}"),
        }
    }

    #[test]
    fn default_endpoint() {
        let sink = GoogleSheetsSink::from_config(&config()).unwrap();
        assert_eq!(
            sink.endpoint().unwrap().as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-1/values/Log!A1:append?valueInputOption=USER_ENTERED"
        );
    }
}
