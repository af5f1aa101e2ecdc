//! Request-derived cache key generation.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded cache key.
pub const CACHE_KEY_LEN: usize = 64;

/// Compute the cache key for a request from its defining attributes.
///
/// The method is uppercased so `get` and `GET` share a key; the URL is
/// expected to be canonical already.
pub fn compute_cache_key(method: &str, url: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(body);
    hex::encode(hasher.finalize())
}

/// Whether `s` has the shape of a key produced by [`compute_cache_key`].
pub fn is_cache_key(s: &str) -> bool {
    s.len() == CACHE_KEY_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_stability() {
        let hash1 = compute_cache_key("GET", "https://example.com/", b"");
        let hash2 = compute_cache_key("GET", "https://example.com/", b"");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_method_case_insensitive() {
        assert_eq!(
            compute_cache_key("get", "https://example.com/", b""),
            compute_cache_key("GET", "https://example.com/", b"")
        );
    }

    #[test]
    fn test_hash_different_method() {
        let get = compute_cache_key("GET", "https://example.com/", b"");
        let post = compute_cache_key("POST", "https://example.com/", b"");
        assert_ne!(get, post);
    }

    #[test]
    fn test_hash_different_body() {
        let a = compute_cache_key("POST", "https://example.com/", b"a=1");
        let b = compute_cache_key("POST", "https://example.com/", b"a=2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let hash = compute_cache_key("GET", "https://example.com/", b"");
        assert_eq!(hash.len(), CACHE_KEY_LEN);
        assert!(is_cache_key(&hash));
    }

    #[test]
    fn test_is_cache_key_rejects_urls() {
        assert!(!is_cache_key("https://example.com/"));
        assert!(!is_cache_key(&"A".repeat(CACHE_KEY_LEN)));
        assert!(!is_cache_key("abc"));
    }
}
