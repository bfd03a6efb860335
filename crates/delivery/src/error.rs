/// Why a single delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Network error, timeout, 5xx or 429. Worth retrying.
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Client-side rejection (4xx other than 429). Retrying will not help.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),

    /// The payload could not be built.
    #[error("payload error: {0}")]
    Payload(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a non-2xx HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = if body.is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", truncate(body, 200))
        };
        if status == 429 || (500..600).contains(&status) {
            Self::Transient(detail)
        } else {
            Self::Permanent(detail)
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
