//! Signed, retried webhook delivery of meeting records.
//!
//! This crate provides:
//! - HMAC-SHA256 request signing over the exact bytes sent
//! - `RetryPolicy` computing fixed or exponential backoff delays
//! - `WebhookTransport` trait with a reqwest implementation
//! - `DeliveryEngine` producing one `DeliveryOutcome` per attempt

pub mod engine;
pub mod error;
pub mod payload;
pub mod retry;
pub mod signing;
pub mod transport;

pub use engine::{DeliveryEngine, DeliveryOutcome, DeliveryReport, DeliveryTarget};
pub use error::DeliveryError;
pub use payload::WebhookPayload;
pub use retry::RetryPolicy;
pub use transport::{
    HttpTransport, TransportError, TransportResponse, WebhookRequest, WebhookTransport,
};
