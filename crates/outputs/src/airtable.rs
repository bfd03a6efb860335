//! Airtable sink: one row per record via the REST API.

use relay_core::config::{AirtableConfig, FieldMapping};
use serde_json::{json, Map, Value};

use crate::error::SinkError;
use crate::record::{flatten, OutputRecord};
use crate::sink::OutputSink;

const AIRTABLE_API: &str = "https://api.airtable.com";

#[derive(Debug)]
pub struct AirtableSink {
    api_key: String,
    base_id: String,
    table_name: String,
    field_mapping: FieldMapping,
    base_url: String,
    client: reqwest::Client,
}

impl AirtableSink {
    pub fn from_config(cfg: &AirtableConfig) -> Result<Self, SinkError> {
        if cfg.api_key.is_empty() || cfg.base_id.is_empty() || cfg.table_name.is_empty() {
            return Err(SinkError::Config(
                "airtable needs apiKey, baseId and tableName".to_string(),
            ));
        }
        Ok(Self {
            api_key: cfg.api_key.clone(),
            base_id: cfg.base_id.clone(),
            table_name: cfg.table_name.clone(),
            field_mapping: cfg.field_mapping.clone(),
            base_url: AIRTABLE_API.to_string(),
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
            .map_err(|e| SinkError::Config(format!("invalid Airtable URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SinkError::Config("Airtable URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v0", self.base_id.as_str(), self.table_name.as_str()]);
        Ok(url)
    }

    fn body(&self, record: &OutputRecord) -> Value {
        let fields: Map<String, Value> = record
            .mapped(&self.field_mapping)
            .into_iter()
            .map(|(k, v)| (k, flatten(v)))
            .collect();
        json!({
            "records": [{ "fields": fields }],
            "typecast": true,
        })
    }
}

#[async_trait::async_trait]
impl OutputSink for AirtableSink {
    async fn deliver(&self, record: &OutputRecord) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.endpoint()?)
            .bearer_auth(&self.api_key)
            .json(&self.body(record))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SinkError::from_response(response).await);
        }

        tracing::debug!(sink = "airtable", table = %self.table_name, meeting_id = %record.meeting_id, "record published");
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "airtable"
    }
}
