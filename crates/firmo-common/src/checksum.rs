//! Checksum utilities for landed objects

use sha2::{Digest, Sha256};

/// Hex-encoded sha256 of an in-memory buffer
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
