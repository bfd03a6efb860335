//! Meeting monitor: pulls completed meetings from the notes source and
//! relays each one exactly once.
//!
//! This crate provides:
//! - `MeetingSource` trait and the local cache-file implementation
//! - `MonitorLoop`, the per-run FETCH → FILTER → deliver pipeline
//! - the `meeting-relay` binary

pub mod cache;
pub mod error;
pub mod monitor;
pub mod source;

pub use cache::CacheFileSource;
pub use error::{MonitorError, SourceError};
pub use monitor::{MonitorLoop, MonitorSettings, RunSummary};
pub use source::MeetingSource;
