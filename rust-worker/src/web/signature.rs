//! Webhook signature verification.
//!
//! MercadoPago signs webhook requests using HMAC-SHA256 over a digest of the body.
//! Stripe and PayPal verification is not implemented; those webhooks are
//! accepted as unverified and flagged on the stored event.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::queue::Provider;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the provider signature.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Result of checking a webhook's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Signature checked and valid.
    Verified,
    /// Signature missing, malformed or wrong.
    Invalid,
    /// No verification exists for this provider.
    Unsupported,
}

/// Check the signature of a webhook for `provider`.
pub fn verify_signature(
    provider: &Provider,
    secret: &str,
    signature_header: Option<&str>,
    body: &[u8],
) -> Verification {
    match provider {
        Provider::MercadoPago => {
            let header = signature_header.unwrap_or("");
            if verify_mercadopago_signature(secret.as_bytes(), header, body) {
                Verification::Verified
            } else {
                Verification::Invalid
            }
        }
        Provider::Stripe | Provider::PayPal | Provider::Other(_) => Verification::Unsupported,
    }
}

/// Verify a MercadoPago webhook signature.
///
/// The header looks like `ts=1702000000, v1=7cb2...` where `v1` is the hex
/// HMAC-SHA256, keyed by the client secret, of `ts=<ts>:digest=<sha256(body) hex>`.
///
/// # Returns
///
/// `true` if the signature matches, `false` for a mismatch or any malformed header.
pub fn verify_mercadopago_signature(secret: &[u8], signature_header: &str, body: &[u8]) -> bool {
    if signature_header.is_empty() {
        warn!("mercadopago_signature_missing");
        return false;
    }

    let Some((ts, v1)) = parse_signature_header(signature_header) else {
        warn!(
            header_length = signature_header.len(),
            "mercadopago_signature_malformed"
        );
        return false;
    };

    let expected = match sign(secret, ts, body) {
        Some(sig) => sig,
        None => {
            warn!("mercadopago_signature_invalid_key");
            return false;
        }
    };

    // Constant-time comparison to prevent timing attacks
    let valid: bool = expected.as_bytes().ct_eq(v1.as_bytes()).into();

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = v1.len(),
            "mercadopago_signature_mismatch"
        );
    }

    valid
}

/// Split `ts=<ts>, v1=<sig>` into its two values.
fn parse_signature_header(header: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = header.split(',').collect();
    if parts.len() != 2 {
        return None;
    }

    let mut ts = None;
    let mut v1 = None;
    for part in parts {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("ts=") {
            ts = Some(value);
        } else if let Some(value) = part.strip_prefix("v1=") {
            v1 = Some(value);
        }
    }

    match (ts, v1) {
        (Some(ts), Some(v1)) if !ts.is_empty() && !v1.is_empty() => Some((ts, v1)),
        _ => None,
    }
}

/// Hex HMAC-SHA256 of `ts=<ts>:digest=<hex sha256(body)>`.
fn sign(secret: &[u8], ts: &str, body: &[u8]) -> Option<String> {
    let digest = hex::encode(Sha256::digest(body));
    let signing_base = format!("ts={}:digest={}", ts, digest);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(signing_base.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Build a valid `X-Signature` header. Used by tests and local tooling.
pub fn mercadopago_signature_header(secret: &[u8], ts: &str, body: &[u8]) -> String {
    let v1 = sign(secret, ts, body).unwrap_or_default();
    format!("ts={}, v1={}", ts, v1)
}
