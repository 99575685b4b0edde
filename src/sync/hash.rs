//! Content hashing for script provenance.
//!
//! The SHA-256 of the source file is stamped into the script header so a
//! script can be traced back to the exact input it was rendered from.

use sha2::{Digest, Sha256};

/// Compute a hex SHA-256 of raw bytes.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
