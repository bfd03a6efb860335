//! Generic HTTP webhook sink.
//!
//! Sends each record as a JSON object to a configured URL with optional
//! custom headers. Field names follow the sink's `fieldMapping`.

use relay_core::config::{FieldMapping, WebhookOutputConfig};

use crate::error::SinkError;
use crate::record::OutputRecord;
use crate::sink::OutputSink;

#[derive(Debug)]
pub struct WebhookSink {
    url: String,
    /// HTTP method (defaults to POST).
    method: reqwest::Method,
    headers: Vec<(String, String)>,
    field_mapping: FieldMapping,
    /// Shared HTTP client (connection pooling).
    client: reqwest::Client,
}

impl WebhookSink {
    /// `method` is parsed case-insensitively; invalid methods produce
    /// [`SinkError::Config`]. `${VAR}` references in the URL and headers
    /// were already resolved when the config was loaded.
    pub fn from_config(cfg: &WebhookOutputConfig) -> Result<Self, SinkError> {
        if cfg.url.trim().is_empty() {
            return Err(SinkError::Config("webhook output URL must not be empty".to_string()));
        }
        let method = match cfg.method.as_deref() {
            Some(m) => m
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|_| SinkError::Config(format!("invalid HTTP method: {m}")))?,
            None => reqwest::Method::POST,
        };
        Ok(Self {
            url: cfg.url.clone(),
            method,
            headers: cfg
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            field_mapping: cfg.field_mapping.clone(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl OutputSink for WebhookSink {
    async fn deliver(&self, record: &OutputRecord) -> Result<(), SinkError> {
        let body = serde_json::to_vec(&record.mapped(&self.field_mapping))?;

        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let err = SinkError::from_response(response).await;
            tracing::warn!(sink = "webhook", url = %self.url, error = %err, "output webhook rejected record");
            return Err(err);
        }

        tracing::debug!(sink = "webhook", meeting_id = %record.meeting_id, "record published");
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn record() -> OutputRecord {
        OutputRecord {
            meeting_id: "m-1".to_string(),
            title: "Kickoff".to_string(),
            organization: "OMAI".to_string(),
            created_at: Utc::now(),
            attendees: Vec::new(),
            success: true,
            attempts: 1,
            http_status: Some(200),
            error: None,
            processed_at: Utc::now(),
        }
    }

    fn config(url: String) -> WebhookOutputConfig {
        WebhookOutputConfig {
            enabled: true,
            url,
            method: Some("put".to_string()),
            headers: BTreeMap::from([("X-Api-Key".to_string(), "k-123".to_string())]),
            field_mapping: FieldMapping::from([
                ("meetingId".to_string(), "id".to_string()),
                ("organization".to_string(), "org".to_string()),
            ]),
        }
    }

    #[tokio::test]
    async fn sends_mapped_json_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/records"))
            .and(header("X-Api-Key", "k-123"))
            .and(body_json(json!({"id": "m-1", "org": "OMAI"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::from_config(&config(format!("{}/records", server.uri()))).unwrap();
        sink.deliver(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn non_2xx_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sink = WebhookSink::from_config(&config(server.uri())).unwrap();
        match sink.deliver(&record()).await.unwrap_err() {
            SinkError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Status error, got: {other:?}"),
        }
    }

    #[test]
    fn method_defaults_to_post() {
        let mut cfg = config("https://example.com".to_string());
        cfg.method = None;
        let sink = WebhookSink::from_config(&cfg).unwrap();
        assert_eq!(sink.method, reqwest::Method::POST);
    }
}
