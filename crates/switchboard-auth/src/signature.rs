// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound chat surface signature verification.
//!
//! The chat platform signs `"v0:{timestamp}:{raw_body}"` with HMAC-SHA256
//! over the shared signing secret and sends `v0=<hex>` in the signature
//! header. Verification rejects timestamps more than five minutes from wall
//! clock (replay prevention) and compares digests in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum allowed clock skew between the signed timestamp and now.
pub const MAX_SKEW_SECONDS: i64 = 300;

/// Verifies a signed chat payload against the shared secret.
///
/// `now_epoch` is injected for testability; production callers use
/// [`verify_chat_signature`].
pub fn verify_chat_signature_at(
    secret: &str,
    timestamp: &str,
    raw_body: &[u8],
    provided_signature: &str,
    now_epoch: i64,
) -> bool {
    let Ok(request_time) = timestamp.parse::<i64>() else {
        return false;
    };
    if (now_epoch - request_time).abs() > MAX_SKEW_SECONDS {
        return false;
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(raw_body);
    let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

    constant_time_str_eq(&expected, provided_signature)
}

/// Verifies a signed chat payload against wall clock.
pub fn verify_chat_signature(
    secret: &str,
    timestamp: &str,
    raw_body: &[u8],
    provided_signature: &str,
) -> bool {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    verify_chat_signature_at(secret, timestamp, raw_body, provided_signature, now)
}

/// Constant-time string equality. Length mismatch short-circuits, which
/// leaks only the length (already public from the wire format).
pub(crate) fn constant_time_str_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}
