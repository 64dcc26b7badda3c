use sha2::{Digest, Sha256};

/// Derive the content key of raw image bytes.
///
/// A lowercase hex SHA-256 digest, 64 characters regardless of input size.
/// Stored inside each example as a stable identity for downstream
/// deduplication; this pipeline never looks keys up.
pub fn content_key(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}
