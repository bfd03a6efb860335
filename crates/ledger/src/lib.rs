//! Durable de-duplication ledger for processed meetings.
//!
//! This crate provides:
//! - `StateLedger` trait so the monitor never depends on a concrete backend
//! - `MonitorState` / `LedgerEntry`, the persisted data model
//! - `JsonFileLedger`, a single-file backend with atomic replace-on-write

pub mod error;
pub mod json_file;
pub mod ledger;
pub mod state;

pub use error::LedgerError;
pub use json_file::{JsonFileLedger, LedgerLoad, LedgerOptions};
pub use ledger::{FailureStreak, StateLedger};
pub use state::{LedgerEntry, MonitorState};
