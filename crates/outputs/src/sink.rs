//! Output sink trait and construction from config.

use relay_core::config::OutputsConfig;

use crate::airtable::AirtableSink;
use crate::error::SinkError;
use crate::json_file::JsonFileSink;
use crate::record::OutputRecord;
use crate::sheets::GoogleSheetsSink;
use crate::webhook::WebhookSink;

/// A destination that receives one record per processed meeting.
#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
    async fn deliver(&self, record: &OutputRecord) -> Result<(), SinkError>;

    /// Config key of this sink (e.g. "airtable", "jsonFile").
    fn sink_name(&self) -> &str;
}

/// Instantiate every enabled sink, in webhook/airtable/googleSheets/jsonFile order.
pub fn build_sinks(config: &OutputsConfig) -> Result<Vec<Box<dyn OutputSink>>, SinkError> {
    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();
    if config.webhook.enabled {
        sinks.push(Box::new(WebhookSink::from_config(&config.webhook)?));
    }
    if config.airtable.enabled {
        sinks.push(Box::new(AirtableSink::from_config(&config.airtable)?));
    }
    if config.google_sheets.enabled {
        sinks.push(Box::new(GoogleSheetsSink::from_config(&config.google_sheets)?));
    }
    if config.json_file.enabled {
        sinks.push(Box::new(JsonFileSink::from_config(&config.json_file)?));
    }
    Ok(sinks)
}
