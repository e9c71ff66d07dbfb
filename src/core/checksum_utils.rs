/*
 * SHA-256 digests of rendered documents. Rendering is deterministic, so two
 * packs of the same selection over the same contents carry the same digest;
 * the digest is reported next to the token count to make that easy to check.
 */
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
pub fn calculate_sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let hex_checksum = format!("{:x}", hasher.finalize());
    log::trace!(
        "ChecksumUtils: {} bytes hashed to {}",
        data.len(),
        hex_checksum
    );
    hex_checksum
}
