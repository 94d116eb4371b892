//! Store key derivation.

use serde::{Deserialize, Serialize};

/// Key under which a response is persisted: `prefix + request_id`.
///
/// Plain concatenation, no escaping or collision handling. Request ids must
/// be unique within one prefix namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(prefix: &str, request_id: &str) -> Self {
        let mut key = String::with_capacity(prefix.len() + request_id.len());
        key.push_str(prefix);
        key.push_str(request_id);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Recover the request id from a raw store key, if it lives under `prefix`.
    pub fn request_id<'a>(raw: &'a str, prefix: &str) -> Option<&'a str> {
        raw.strip_prefix(prefix)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_concatenates() {
        let key = CacheKey::derive("axios-cache-", "abc");
        assert_eq!(key.as_str(), "axios-cache-abc");
        assert_eq!(key.to_string(), "axios-cache-abc");
    }

    #[test]
    fn request_id_requires_prefix() {
        assert_eq!(CacheKey::request_id("app-r1", "app-"), Some("r1"));
        assert_eq!(CacheKey::request_id("other-r1", "app-"), None);
    }
}
