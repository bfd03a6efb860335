//! HMAC-SHA256 request signing.
//!
//! The signature is computed over the exact body bytes that go on the wire,
//! so the receiver can recompute it without re-serializing anything.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix used in the signature header value (`sha256=<hex>`).
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Lowercase hex HMAC-SHA256 of `payload` keyed with `secret`.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = new_mac(secret);
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Header value for a signed payload.
pub fn signature_header_value(payload: &[u8], secret: &str) -> String {
    format!("{SIGNATURE_PREFIX}{}", sign(payload, secret))
}

/// Constant-time check of a hex signature, with or without the `sha256=` prefix.
pub fn verify(payload: &[u8], secret: &str, signature: &str) -> bool {
    let hex_sig = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let Ok(expected) = hex::decode(hex_sig.trim()) else {
        return false;
    };
    let mut mac = new_mac(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &str) -> HmacSha256 {
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length.
        Err(_) => unreachable!("HMAC key length is unrestricted"),
    }
}
