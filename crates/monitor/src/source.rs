use chrono::{DateTime, Utc};
use relay_core::MeetingRecord;

use crate::error::SourceError;

/// Upstream provider of completed meetings.
#[async_trait::async_trait]
pub trait MeetingSource: Send + Sync {
    /// Meetings created at or after `since`, in any order.
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<MeetingRecord>, SourceError>;

    fn source_name(&self) -> &str;
}
