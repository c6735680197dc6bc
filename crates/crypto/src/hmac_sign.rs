//! SHA-256 HMAC signing and verification of request/response bodies.
//!
//! The agent computes this over the final on-wire body (after
//! encryption/compression); the server verifies it over the raw body
//! *before* decompression/decryption (spec §9 "Shared middleware order").
//! Both directions share this module so the hex encoding and the
//! constant-time comparison can't drift between sides.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use vitals_core::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 of `body` under `key`.
pub fn sign(key: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify that `hex_signature` is the HMAC-SHA256 of `body` under `key`.
///
/// Returns [`Error::IntegrityViolation`] on mismatch or on a malformed hex
/// signature; never retried, per the spec's integrity-violation taxonomy.
pub fn verify(key: &str, body: &[u8], hex_signature: &str) -> Result<()> {
    let expected = hex::decode(hex_signature)
        .map_err(|_| Error::IntegrityViolation("malformed HMAC signature encoding".into()))?;
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| Error::IntegrityViolation("HMAC signature mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_roundtrips_with_matching_key() {
        let body = b"hello metrics";
        let sig = sign("testkey", body);
        assert!(verify("testkey", body, &sig).is_ok());
    }

    #[test]
    fn flipping_a_body_byte_rejects() {
        let mut body = b"hello metrics".to_vec();
        let sig = sign("testkey", &body);
        body[0] ^= 0xFF;
        assert!(verify("testkey", &body, &sig).is_err());
    }

    #[test]
    fn wrong_key_rejects() {
        let body = b"hello metrics";
        let sig = sign("testkey", body);
        assert!(verify("badkey", body, &sig).is_err());
    }

    #[test]
    fn malformed_hex_rejects() {
        assert!(verify("testkey", b"body", "not-hex!!").is_err());
    }
}
