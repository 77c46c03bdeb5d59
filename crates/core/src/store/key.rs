//! Request-identity key derivation.

use sha2::{Digest, Sha256};

/// Compute the store key for a request identity.
///
/// Identity is method + URL only. Request headers and Vary semantics are
/// deliberately not part of the key: the precache keeps exactly one stored
/// representation per resource, so two requests that differ only in headers
/// map to the same entry.
pub fn resource_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let a = resource_key("GET", "http://origin/");
        let b = resource_key("GET", "http://origin/");
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_method_case_insensitive() {
        assert_eq!(resource_key("get", "http://origin/"), resource_key("GET", "http://origin/"));
    }

    #[test]
    fn test_key_differs_by_url() {
        assert_ne!(
            resource_key("GET", "http://origin/"),
            resource_key("GET", "http://origin/static/logo.png")
        );
    }

    #[test]
    fn test_key_differs_by_method() {
        assert_ne!(resource_key("GET", "http://origin/"), resource_key("HEAD", "http://origin/"));
    }

    #[test]
    fn test_key_format() {
        let key = resource_key("GET", "http://origin/");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
