//! Content digests used for change detection.
//!
//! The digest is SHA-256 rendered as lowercase hex. It is compared for
//! equality only; it says nothing about who produced the content.

use sha2::{Digest, Sha256};

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}

/// SHA-256 hex digest of an in-memory buffer.
#[must_use]
pub fn sha256_bytes(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}
