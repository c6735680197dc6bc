//! Integrity and confidentiality for metric payloads in flight (spec's
//! C9): SHA-256 HMAC signing, RSA-OAEP envelope encryption, and gzip
//! framing. Each concern is its own module since the agent's send
//! pipeline and the server's ingress chain apply them independently and in
//! opposite order.

pub mod gzip;
pub mod hmac_sign;
pub mod rsa_envelope;
