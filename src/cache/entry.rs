//! Cache Entry Module
//!
//! Defines the stored unit: an encoded payload plus an absolute expiration.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A single stored value.
///
/// `expiration` is an absolute Unix timestamp in milliseconds; `0` means the
/// entry never expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Encoded value (JSON produced by `CacheExt`)
    pub payload: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), 0 = no expiration
    pub expiration: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl` from now. A zero `ttl` never expires.
    pub fn new(payload: Vec<u8>, ttl: Duration) -> Self {
        Self {
            payload,
            expiration: expiration_after(ttl, current_timestamp_ms()),
        }
    }

    // == Is Expired ==
    /// Checks expiry against the current wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Checks expiry against `now` (Unix milliseconds).
    ///
    /// The expiration instant itself already counts as expired.
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expiration != 0 && now >= self.expiration
    }

    /// Returns true if the entry has no expiration.
    pub fn is_immortal(&self) -> bool {
        self.expiration == 0
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Converts a relative TTL into an absolute expiration.
///
/// Sub-millisecond TTLs round up to one millisecond so that a non-zero TTL
/// never turns into an immortal entry.
pub fn expiration_after(ttl: Duration, now: u64) -> u64 {
    if ttl.is_zero() {
        return 0;
    }
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
    now.saturating_add(millis)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_creation_no_ttl() {
        let entry = CacheEntry::new(b"\"v\"".to_vec(), Duration::ZERO);

        assert_eq!(entry.expiration, 0);
        assert!(entry.is_immortal());
        assert!(!entry.is_expired());
        assert!(!entry.is_expired_at(u64::MAX));
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let entry = CacheEntry::new(b"1".to_vec(), Duration::from_secs(60));

        assert!(entry.expiration > current_timestamp_ms());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = CacheEntry::new(b"1".to_vec(), Duration::from_millis(50));

        assert!(!entry.is_expired());
        sleep(Duration::from_millis(80));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry {
            payload: Vec::new(),
            expiration: 1_000,
        };

        assert!(!entry.is_expired_at(999));
        assert!(entry.is_expired_at(1_000), "Entry should be expired at boundary");
        assert!(entry.is_expired_at(1_001));
    }

    #[test]
    fn test_sub_millisecond_ttl_is_not_immortal() {
        assert_eq!(expiration_after(Duration::from_micros(10), 500), 501);
        assert_eq!(expiration_after(Duration::ZERO, 500), 0);
        assert_eq!(expiration_after(Duration::from_secs(2), 500), 2_500);
    }
}
