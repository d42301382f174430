//! Request-identity cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key identifying one request.
///
/// The key covers the method, the canonical URL (fragment already stripped,
/// query preserved), and a vary discriminator for header-sensitive entries.
/// The store treats the result as an opaque identifier.
pub fn request_key(method: &str, url: &str, vary: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(vary.as_bytes());
    hex::encode(hasher.finalize())
}
