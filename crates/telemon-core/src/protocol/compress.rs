//! gzip helpers for request/response bodies.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{MetricsError, Result};

pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| MetricsError::Internal(format!("gzip failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| MetricsError::Internal(format!("gzip finish failed: {e}")))
}

/// Upper bound on an inflated body.
pub const MAX_INFLATED: usize = 32 * 1024 * 1024;

/// Inflate a gzip body. Corrupt or oversized input is the client's fault.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    gunzip_limited(data, MAX_INFLATED)
}

/// Inflate at most `limit` bytes; anything larger is rejected.
pub fn gunzip_limited(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| MetricsError::BadRequest(format!("failed to decompress body: {e}")))?;
    if out.len() > limit {
        return Err(MetricsError::BadRequest(format!(
            "decompressed body exceeds {limit} bytes"
        )));
    }
    Ok(out)
}

/// True if a comma-separated header value lists `gzip`.
pub fn lists_gzip(header: &str) -> bool {
    header
        .split(',')
        .any(|part| part.trim().split(';').next().map(str::trim) == Some("gzip"))
}
