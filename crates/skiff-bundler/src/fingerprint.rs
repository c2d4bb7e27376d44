//! Content fingerprinting for cacheable assets.

use sha1::{Digest, Sha1};

/// Hex-encoded SHA-1 of the given bytes (40 characters).
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// The cache-bust URL of a non-minified cacheable client asset.
pub fn cache_bust_url(serve_path: &str, hash: &str) -> String {
    format!("{serve_path}?{hash}")
}
