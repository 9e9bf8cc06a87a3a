//! Webhook signature verification
//!
//! The gateway signs each delivery with
//! `Cafetero-Signature: t=<unix>,v1=<hex hmac-sha256>` where the MAC is
//! computed over `"{t}.{raw_body}"`. Verification is constant-time and
//! bounded by a replay window on the timestamp.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "Cafetero-Signature";

/// Maximum age (and future skew) accepted for a signed timestamp
pub const TOLERANCE_SECONDS: i64 = 300;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature header")]
    MalformedHeader,

    #[error("Signature timestamp outside the allowed window")]
    StaleTimestamp,

    #[error("Signature verification failed")]
    InvalidSignature,
}

/// Parsed `t=...,v1=...` header parts
#[derive(Debug)]
pub struct SignatureParts {
    pub timestamp: i64,
    pub signature: Vec<u8>,
}

/// Parse the signature header into its timestamp and MAC bytes
pub fn parse_signature_header(value: &str) -> Result<SignatureParts, SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in value.split(',') {
        match part.trim().split_once('=') {
            Some(("t", raw)) => {
                timestamp = Some(raw.parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?);
            }
            Some(("v1", raw)) => {
                signature = Some(hex::decode(raw).map_err(|_| SignatureError::MalformedHeader)?);
            }
            // Unknown keys are ignored so the gateway can add scheme versions
            Some(_) => {}
            None => return Err(SignatureError::MalformedHeader),
        }
    }

    match (timestamp, signature) {
        (Some(timestamp), Some(signature)) => Ok(SignatureParts {
            timestamp,
            signature,
        }),
        _ => Err(SignatureError::MalformedHeader),
    }
}

/// Verify a webhook delivery. `now` is the caller's clock (unix seconds).
pub fn verify_signature(
    secret: &[u8],
    header: &str,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let parts = parse_signature_header(header)?;

    if (now - parts.timestamp).abs() > TOLERANCE_SECONDS {
        return Err(SignatureError::StaleTimestamp);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidSignature)?;
    mac.update(parts.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);

    mac.verify_slice(&parts.signature)
        .map_err(|_| SignatureError::InvalidSignature)
}

/// Produce the signature header value for a body at a given timestamp.
///
/// The inverse of `verify_signature`; integration tests use it to forge
/// gateway deliveries.
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={},v1={}", timestamp, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn test_valid_signature_accepted() {
        let now = 1_700_000_000;
        let header = sign(SECRET, now, BODY).unwrap();
        assert!(verify_signature(SECRET, &header, BODY, now).is_ok());
    }

    #[test]
    fn test_signature_within_tolerance_accepted() {
        let now = 1_700_000_000;
        let header = sign(SECRET, now - TOLERANCE_SECONDS + 1, BODY).unwrap();
        assert!(verify_signature(SECRET, &header, BODY, now).is_ok());
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let now = 1_700_000_000;
        let header = sign(SECRET, now - TOLERANCE_SECONDS - 1, BODY).unwrap();
        assert_eq!(
            verify_signature(SECRET, &header, BODY, now),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let now = 1_700_000_000;
        let header = sign(SECRET, now + TOLERANCE_SECONDS + 60, BODY).unwrap();
        assert_eq!(
            verify_signature(SECRET, &header, BODY, now),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let now = 1_700_000_000;
        let header = sign(SECRET, now, BODY).unwrap();
        let tampered = br#"{"id":"evt_1","type":"payment_intent.payment_failed"}"#;
        assert_eq!(
            verify_signature(SECRET, &header, tampered, now),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = 1_700_000_000;
        let header = sign(SECRET, now, BODY).unwrap();
        assert_eq!(
            verify_signature(b"whsec_other", &header, BODY, now),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_headers_rejected() {
        for header in [
            "",
            "garbage",
            "t=123",
            "v1=deadbeef",
            "t=notanumber,v1=deadbeef",
            "t=123,v1=nothex!",
        ] {
            assert_eq!(
                parse_signature_header(header).err(),
                Some(SignatureError::MalformedHeader),
                "header {:?} should be malformed",
                header
            );
        }
    }

    #[test]
    fn test_unknown_header_keys_ignored() {
        let now = 1_700_000_000;
        let header = sign(SECRET, now, BODY).unwrap();
        let with_extra = format!("{},v2=00ff", header);
        assert!(verify_signature(SECRET, &with_extra, BODY, now).is_ok());
    }
}
