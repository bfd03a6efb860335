//! Secondary outputs for processed meetings.
//!
//! After the primary webhook delivery, each meeting can be published to
//! any number of additional sinks: a generic webhook, an Airtable table,
//! a Google Sheet, or a JSON-lines file. Sinks run concurrently and a
//! failing sink never affects the others.

pub mod airtable;
pub mod error;
pub mod fanout;
pub mod json_file;
pub mod record;
pub mod sheets;
pub mod sink;
pub mod webhook;

pub use error::SinkError;
pub use fanout::{OutputFanout, PublishResult};
pub use record::OutputRecord;
pub use sink::{build_sinks, OutputSink};
