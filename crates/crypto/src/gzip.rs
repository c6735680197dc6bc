//! Flat gzip framing for request/response bodies. Applied after HMAC
//! signing on the send side and before HMAC verification is undone on the
//! receive side is *not* how the spec orders things — gzip sits between
//! encryption and HMAC in the send pipeline, and between HMAC and
//! decryption in the ingress chain (spec §4.4, §4.5).

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use vitals_core::error::{Error, Result};

/// Gzip-compress `body` at the default compression level.
pub fn compress(body: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    encoder.finish().map_err(Error::from)
}

/// Gzip-decompress `body`.
pub fn decompress(body: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(body);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_roundtrips() {
        let body = b"a pile of metrics, repeated, repeated, repeated".to_vec();
        let compressed = compress(&body).unwrap();
        assert_ne!(compressed, body);
        let back = decompress(&compressed).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn decompressing_garbage_errors() {
        assert!(decompress(b"not gzip data").is_err());
    }
}
