//! Explicit token revocation.
//!
//! [`RevocationRegistry`] remembers tokens revoked through
//! [`revoke`](RevocationRegistry::revoke) (for example on logout) and reports
//! them as revoked for a bounded retention window. Once an entry is older than
//! the window it is stale: the next lookup purges it and answers `false`. The
//! window only needs to outlive the natural lifetime of the tokens it guards.
//!
//! # Locking
//!
//! Lookups share a read lock. Purging a stale entry drops the read guard
//! before taking the write lock and re-checks the entry under it, so a lookup
//! never waits on itself and a concurrent re-revocation is not lost.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::RwLock;

/// Default retention for revocation records (24 hours).
pub const DEFAULT_REVOCATION_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// In-memory set of revoked tokens with bounded retention.
///
/// `RevocationRegistry` is `Send + Sync`; share it behind an [`Arc`](std::sync::Arc)
/// when more than one validator should observe the same revocations.
#[derive(Debug)]
pub struct RevocationRegistry {
    /// Raw token → monotonic time of revocation.
    revoked: RwLock<HashMap<String, Instant>>,
    retention: Duration,
}

impl Default for RevocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RevocationRegistry {
    /// Creates a registry with [`DEFAULT_REVOCATION_RETENTION`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_REVOCATION_RETENTION)
    }

    /// Creates a registry that forgets revocations older than `retention`.
    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self { revoked: RwLock::new(HashMap::new()), retention }
    }

    /// Returns the configured retention window.
    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Marks `token` as revoked as of now.
    ///
    /// Revoking an already-revoked token only refreshes its timestamp.
    #[tracing::instrument(skip_all, fields(token_len = token.len()))]
    pub fn revoke(&self, token: &str) {
        let now = Instant::now();
        let previous = self.revoked.write().insert(token.to_owned(), now);
        tracing::info!(
            action = "revoke_token",
            already_revoked = previous.is_some(),
            "bearer token revoked"
        );
    }

    /// Returns `true` if `token` was revoked within the retention window.
    ///
    /// A stale entry is purged as a side effect.
    pub fn is_revoked(&self, token: &str) -> bool {
        let now = Instant::now();
        {
            let revoked = self.revoked.read();
            match revoked.get(token) {
                None => return false,
                Some(&revoked_at) if !self.is_stale(revoked_at, now) => return true,
                Some(_) => {},
            }
        }
        // Read guard dropped; re-check under the write lock.

        let mut revoked = self.revoked.write();
        let stale = match revoked.get(token) {
            None => return false,
            Some(&revoked_at) => self.is_stale(revoked_at, now),
        };
        if !stale {
            return true;
        }
        revoked.remove(token);
        tracing::debug!(token_len = token.len(), "purged stale revocation record");
        false
    }

    /// Removes every stale record and returns how many were dropped.
    ///
    /// Lookups already purge lazily; this sweep is for callers that want to
    /// bound memory for tokens that are never presented again.
    pub fn purge_stale(&self) -> usize {
        let now = Instant::now();
        let mut revoked = self.revoked.write();
        let before = revoked.len();
        revoked.retain(|_, revoked_at| !self.is_stale(*revoked_at, now));
        let purged = before - revoked.len();
        if purged > 0 {
            tracing::debug!(purged, "swept stale revocation records");
        }
        purged
    }

    /// Number of records currently held, stale or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.revoked.read().len()
    }

    /// Returns `true` if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revoked.read().is_empty()
    }

    fn is_stale(&self, revoked_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(revoked_at) > self.retention
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_unknown_token_not_revoked() {
        let registry = RevocationRegistry::new();
        assert!(!registry.is_revoked("never-seen"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_revoke_then_check() {
        let registry = RevocationRegistry::new();
        registry.revoke("token-a");
        assert!(registry.is_revoked("token-a"));
        assert!(!registry.is_revoked("token-b"));
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let registry = RevocationRegistry::new();
        registry.revoke("token-a");
        registry.revoke("token-a");
        assert!(registry.is_revoked("token-a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_record_is_purged_on_read() {
        let registry = RevocationRegistry::with_retention(Duration::from_millis(20));
        registry.revoke("short-lived");
        assert!(registry.is_revoked("short-lived"));

        thread::sleep(Duration::from_millis(60));

        assert!(!registry.is_revoked("short-lived"));
        assert!(registry.is_empty(), "stale record should be removed by the lookup");
    }

    #[test]
    fn test_staleness_uses_elapsed_age() {
        let registry = RevocationRegistry::with_retention(Duration::from_secs(60));
        let revoked_at = Instant::now();

        assert!(!registry.is_stale(revoked_at, revoked_at + Duration::from_secs(60)));
        assert!(registry.is_stale(revoked_at, revoked_at + Duration::from_secs(61)));
        // A lookup instant earlier than the record saturates to zero age.
        assert!(!registry.is_stale(revoked_at + Duration::from_secs(5), revoked_at));
    }

    #[test]
    fn test_re_revoking_refreshes_timestamp() {
        let registry = RevocationRegistry::with_retention(Duration::from_millis(200));
        registry.revoke("token");
        thread::sleep(Duration::from_millis(120));
        registry.revoke("token");
        thread::sleep(Duration::from_millis(120));
        assert!(registry.is_revoked("token"));
    }

    #[test]
    fn test_purge_stale_sweeps_only_old_records() {
        let registry = RevocationRegistry::with_retention(Duration::from_millis(20));
        registry.revoke("old-1");
        registry.revoke("old-2");
        thread::sleep(Duration::from_millis(60));
        registry.revoke("fresh");

        assert_eq!(registry.purge_stale(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_revoked("fresh"));
    }

    #[test]
    fn test_concurrent_lookups_and_purges_do_not_deadlock() {
        let registry = Arc::new(RevocationRegistry::with_retention(Duration::from_millis(1)));
        for i in 0..32 {
            registry.revoke(&format!("token-{i}"));
        }
        thread::sleep(Duration::from_millis(5));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..32 {
                        let token = format!("token-{i}");
                        let _ = registry.is_revoked(&token);
                        if (i + worker) % 5 == 0 {
                            registry.revoke(&token);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker panicked");
        }
    }

    #[test]
    fn test_revocation_visible_across_threads() {
        let registry = Arc::new(RevocationRegistry::new());
        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.revoke("shared"))
        };
        writer.join().expect("writer panicked");
        assert!(registry.is_revoked("shared"));
    }
}
