//! Response body decoding.

use std::io::Read;

use flate2::read::GzDecoder;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Error type for body decoding failures.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode gzip body: {0}")]
pub struct DecodeError(#[from] std::io::Error);

/// Decode a live response body as its `content-encoding` header describes.
///
/// Only an explicit `gzip` (or `x-gzip`) encoding is decompressed. Bodies
/// without an encoding header pass through unchanged whatever their leading
/// bytes.
pub fn decode_body(raw: &[u8], content_encoding: Option<&str>) -> Result<Vec<u8>, DecodeError> {
    let gzip = content_encoding.is_some_and(|encoding| {
        let encoding = encoding.trim();
        encoding.eq_ignore_ascii_case("gzip") || encoding.eq_ignore_ascii_case("x-gzip")
    });

    if !gzip || raw.is_empty() {
        return Ok(raw.to_vec());
    }
    gunzip(raw)
}

/// Decode a body read back from the cache.
///
/// Cache entries keep no headers, so gzip framing is recognised by its magic
/// bytes. An entry that starts with the magic bytes but does not decompress
/// was stored uncompressed and is returned as is.
pub fn decode_cached(raw: &[u8]) -> Vec<u8> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return raw.to_vec();
    }
    match gunzip(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::debug!(error = %e, bytes = raw.len(), "cache entry is not gzip, serving raw bytes");
            raw.to_vec()
        }
    }
}

fn gunzip(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoded = Vec::with_capacity(raw.len() * 2);
    GzDecoder::new(raw).read_to_end(&mut decoded)?;
    Ok(decoded)
}
