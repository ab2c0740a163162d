//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for `PUT /cache/:key` and `POST /cache/:key`
///
/// # Fields
/// - `value`: Any JSON value to store
/// - `ttl`: Optional TTL in seconds, absent or 0 means the entry never expires
#[derive(Debug, Clone, Deserialize)]
pub struct CacheValueRequest {
    /// The value to store
    pub value: serde_json::Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl CacheValueRequest {
    /// The TTL as a duration, zero when absent.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl.unwrap_or(0))
    }
}

/// Validates a key taken from the request path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialize() {
        let json = r#"{"value": {"name": "hello"}}"#;
        let req: CacheValueRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.value["name"], "hello");
        assert!(req.ttl.is_none());
        assert_eq!(req.ttl(), Duration::ZERO);
    }

    #[test]
    fn test_request_with_ttl() {
        let json = r#"{"value": 3, "ttl": 60}"#;
        let req: CacheValueRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_empty_key() {
        assert!(validate_key("").is_some());
    }

    #[test]
    fn test_validate_key_length() {
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH)).is_none());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_some());
    }
}
