//! JSON-lines file sink.

use std::path::{Path, PathBuf};

use relay_core::config::{FieldMapping, JsonFileConfig};
use tokio::io::AsyncWriteExt;

use crate::error::SinkError;
use crate::record::OutputRecord;
use crate::sink::OutputSink;

/// Appends one JSON object per line to a local file.
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    field_mapping: FieldMapping,
}

impl JsonFileSink {
    pub fn from_config(cfg: &JsonFileConfig) -> Result<Self, SinkError> {
        if cfg.path.as_os_str().is_empty() {
            return Err(SinkError::Config("jsonFile path must not be empty".to_string()));
        }
        Ok(Self {
            path: cfg.path.clone(),
            field_mapping: cfg.field_mapping.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl OutputSink for JsonFileSink {
    async fn deliver(&self, record: &OutputRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(&record.mapped(&self.field_mapping))?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(&line).await.map_err(|e| self.io_err(e))?;
        file.flush().await.map_err(|e| self.io_err(e))?;

        tracing::debug!(sink = "jsonFile", path = %self.path.display(), meeting_id = %record.meeting_id, "record appended");
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "jsonFile"
    }
}
