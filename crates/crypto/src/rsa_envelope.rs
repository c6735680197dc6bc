//! RSA-OAEP/SHA-256 envelope encryption of metric payloads (spec's C9).
//!
//! The agent holds only the server's public key; the server holds only
//! its own private key — exactly the asymmetry spec §3 ("Keys and
//! transcripts") requires. OAEP bounds how much plaintext a single RSA
//! operation can cover (`modulus_bytes - 2*hash_len - 2`), so a body
//! larger than that is split into fixed-size chunks, each encrypted
//! independently and framed with a little-endian length prefix; decryption
//! reverses the framing chunk by chunk.

use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use vitals_core::error::{Error, Result};

/// Load the server's RSA public key from a PEM-encoded SubjectPublicKeyInfo
/// file (the public half of the certificate pair the server generates at
/// `CertFilesGenerate` time in the reference implementation).
pub fn load_public_key(pem: &str) -> Result<RsaPublicKey> {
    use rsa::pkcs8::DecodePublicKey;
    RsaPublicKey::from_public_key_pem(pem.trim())
        .map_err(|err| Error::MalformedInput(format!("invalid RSA public key: {err}")))
}

/// Load the server's RSA private key from a PEM-encoded PKCS#1 file.
pub fn load_private_key(pem: &str) -> Result<RsaPrivateKey> {
    use rsa::pkcs1::DecodeRsaPrivateKey;
    RsaPrivateKey::from_pkcs1_pem(pem.trim())
        .map_err(|err| Error::MalformedInput(format!("invalid RSA private key: {err}")))
}

fn oaep() -> Oaep {
    Oaep::new::<Sha256>()
}

fn max_chunk_len(key: &RsaPublicKey) -> usize {
    use rsa::traits::PublicKeyParts;
    let modulus_bytes = key.size();
    let hash_len = <Sha256 as sha2::Digest>::output_size();
    modulus_bytes.saturating_sub(2 * hash_len + 2)
}

/// Encrypt `plaintext` under `public_key`, chunking as needed. The output
/// is a self-describing sequence of length-prefixed ciphertext chunks.
pub fn encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let chunk_len = max_chunk_len(public_key).max(1);
    let mut out = Vec::new();
    for chunk in plaintext.chunks(chunk_len) {
        let ciphertext = public_key
            .encrypt(&mut OsRng, oaep(), chunk)
            .map_err(|err| Error::IntegrityViolation(format!("RSA-OAEP encryption failed: {err}")))?;
        out.extend_from_slice(&(ciphertext.len() as u32).to_le_bytes());
        out.extend_from_slice(&ciphertext);
    }
    Ok(out)
}

/// Decrypt a sequence produced by [`encrypt`] under `private_key`.
pub fn decrypt(private_key: &RsaPrivateKey, envelope: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = envelope;
    let mut out = Vec::new();
    while !cursor.is_empty() {
        if cursor.len() < 4 {
            return Err(Error::IntegrityViolation("truncated RSA envelope".into()));
        }
        let (len_bytes, rest) = cursor.split_at(4);
        let len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
        if rest.len() < len {
            return Err(Error::IntegrityViolation("truncated RSA envelope chunk".into()));
        }
        let (chunk, rest) = rest.split_at(len);
        let plaintext = private_key
            .decrypt(oaep(), chunk)
            .map_err(|err| Error::IntegrityViolation(format!("RSA-OAEP decryption failed: {err}")))?;
        out.extend_from_slice(&plaintext);
        cursor = rest;
    }
    Ok(out)
}

/// Generate a fresh keypair (test/dev helper — production keys are loaded
/// from files per the spec's `crypto_key`/`crypto_cert` config fields).
pub fn generate_keypair(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey)> {
    let private_key =
        RsaPrivateKey::new(&mut OsRng, bits).map_err(|err| Error::FatalStorage(format!("RSA keygen failed: {err}")))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((private_key, public_key))
}
