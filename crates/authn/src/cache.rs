//! Short-lived memoization of successful validations.
//!
//! [`ValidationCache`] maps a raw token to the claims it carried when it last
//! passed full validation. A hit stands in for signature verification *and*
//! claim validation, so an entry must never outlive either the cache TTL or
//! the token's own `exp`:
//!
//! ```text
//! expires_at = min(validated_at + ttl, exp)
//! ```
//!
//! Entries are never mutated. A read past `expires_at` is a miss and evicts
//! the entry. The cache is capacity-bounded; when full, the least recently
//! used entry is dropped first.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, TimeDelta, Utc};
use moka::{policy::EvictionPolicy, sync::Cache};

use crate::claims::ClaimSet;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached validations.
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

/// A memoized successful validation.
#[derive(Debug, Clone)]
pub struct CachedValidation {
    /// Claims as validated.
    pub claims: ClaimSet,
    /// When full validation succeeded.
    pub validated_at: DateTime<Utc>,
    /// When the entry stops being trusted.
    pub expires_at: DateTime<Utc>,
    /// Monotonic deadline mirroring `expires_at`, used for eviction.
    deadline: Instant,
}

impl CachedValidation {
    fn new(claims: ClaimSet, ttl: Duration) -> Self {
        let validated_at = Utc::now();
        let created = Instant::now();

        let ttl_end = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|ttl| validated_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let token_end = claims
            .expires_at()
            .ok()
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let expires_at = ttl_end.min(token_end);

        let remaining = (expires_at - validated_at).to_std().unwrap_or(Duration::ZERO);
        // An unrepresentable deadline expires the entry at once.
        let deadline = created.checked_add(remaining).unwrap_or(created);

        Self { claims, validated_at, expires_at, deadline }
    }

    /// Returns `true` once the entry may no longer stand in for validation.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at || Instant::now() >= self.deadline
    }
}

/// Per-entry expiry policy reading the deadline stored in the value.
struct ValidationExpiry;

impl moka::Expiry<String, Arc<CachedValidation>> for ValidationExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<CachedValidation>,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(value.deadline.saturating_duration_since(created_at))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<CachedValidation>,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // An overwrite carries a fresh validation and its own deadline.
        Some(value.deadline.saturating_duration_since(updated_at))
    }
}

/// Concurrent cache of validated tokens.
///
/// Backed by a [`moka::sync::Cache`]: lookups from many threads proceed
/// without contending on a single lock, and concurrent `put`s for the same
/// token simply overwrite each other (last write wins).
pub struct ValidationCache {
    entries: Cache<String, Arc<CachedValidation>>,
    ttl: Duration,
    capacity: u64,
}

impl std::fmt::Debug for ValidationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationCache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .field("entry_count", &self.entries.entry_count())
            .finish()
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ValidationCache {
    /// Creates a cache with the given TTL and [`DEFAULT_CACHE_CAPACITY`].
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a cache with the given TTL and maximum entry count.
    #[must_use]
    pub fn with_capacity(ttl: Duration, capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(ValidationExpiry)
            .build();
        Self { entries, ttl, capacity }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the configured maximum entry count.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the cached claims for `token` if the entry is still trusted.
    ///
    /// An expired entry is left to the expiry policy; removing it here could
    /// drop a fresh entry another thread just stored for the same token.
    pub fn get(&self, token: &str) -> Option<ClaimSet> {
        let entry = self.entries.get(token)?;
        if entry.is_expired() {
            tracing::debug!(cache = "validation", "expired entry treated as a miss");
            return None;
        }
        Some(entry.claims.clone())
    }

    /// Returns the full cached record for `token`, if still trusted.
    pub fn get_entry(&self, token: &str) -> Option<Arc<CachedValidation>> {
        self.entries.get(token).filter(|entry| !entry.is_expired())
    }

    /// Records a successful validation, replacing any previous entry.
    pub fn put(&self, token: &str, claims: ClaimSet) {
        let entry = Arc::new(CachedValidation::new(claims, self.ttl));
        self.entries.insert(token.to_owned(), entry);
    }

    /// Drops the entry for `token`, if any.
    pub fn invalidate(&self, token: &str) {
        self.entries.invalidate(token);
    }

    /// Approximate number of live entries.
    ///
    /// Moka updates its counters lazily; call [`run_pending_tasks`](Self::run_pending_tasks)
    /// first for an exact figure.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Applies pending evictions and expirations.
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::*;

    fn claims_with_exp(exp: i64) -> ClaimSet {
        ClaimSet::try_from(json!({"sub": "user-1", "exp": exp})).expect("object")
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        assert!(cache.get("token").is_none());

        let claims = claims_with_exp(Utc::now().timestamp() + 3600);
        cache.put("token", claims.clone());
        assert_eq!(cache.get("token"), Some(claims));
    }

    #[test]
    fn test_expires_at_is_capped_by_ttl() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        cache.put("token", claims_with_exp(Utc::now().timestamp() + 3600));

        let entry = cache.get_entry("token").expect("entry");
        let lifetime = entry.expires_at - entry.validated_at;
        assert_eq!(lifetime.num_seconds(), 60);
    }

    #[test]
    fn test_expires_at_is_capped_by_token_exp() {
        let cache = ValidationCache::new(Duration::from_secs(3600));
        let exp = Utc::now().timestamp() + 30;
        cache.put("token", claims_with_exp(exp));

        let entry = cache.get_entry("token").expect("entry");
        assert_eq!(entry.expires_at.timestamp(), exp);
    }

    #[test]
    fn test_already_expired_token_is_never_served() {
        let cache = ValidationCache::new(Duration::from_secs(3600));
        cache.put("token", claims_with_exp(Utc::now().timestamp() - 10));
        assert!(cache.get("token").is_none());
    }

    #[test]
    fn test_expired_entry_is_evicted_by_policy() {
        let cache = ValidationCache::new(Duration::from_secs(3600));
        cache.put("token", claims_with_exp(Utc::now().timestamp() - 10));
        assert!(cache.get("token").is_none());

        cache.run_pending_tasks();
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn test_stale_read_never_drops_fresh_entry() {
        let cache = Arc::new(ValidationCache::new(Duration::from_secs(60)));
        let fresh = claims_with_exp(Utc::now().timestamp() + 3600);
        let stale = claims_with_exp(Utc::now().timestamp() - 10);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let _ = cache.get("token");
                    }
                })
            })
            .collect();
        for _ in 0..500 {
            cache.put("token", stale.clone());
            cache.put("token", fresh.clone());
        }
        for reader in readers {
            reader.join().expect("reader panicked");
        }

        assert_eq!(cache.get("token"), Some(fresh));
    }

    #[test]
    fn test_ttl_elapses() {
        let cache = ValidationCache::new(Duration::from_millis(30));
        cache.put("token", claims_with_exp(Utc::now().timestamp() + 3600));
        assert!(cache.get("token").is_some());

        thread::sleep(Duration::from_millis(80));
        assert!(cache.get("token").is_none());
    }

    #[test]
    fn test_claims_without_exp_use_ttl_only() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        let claims = ClaimSet::try_from(json!({"sub": "no-exp"})).expect("object");
        cache.put("token", claims);

        let entry = cache.get_entry("token").expect("entry");
        assert_eq!((entry.expires_at - entry.validated_at).num_seconds(), 60);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        let exp = Utc::now().timestamp() + 3600;
        cache.put("token", claims_with_exp(exp));

        let mut replacement = claims_with_exp(exp);
        replacement.insert("sub", "user-2");
        cache.put("token", replacement.clone());

        assert_eq!(cache.get("token"), Some(replacement));
    }

    #[test]
    fn test_invalidate() {
        let cache = ValidationCache::new(Duration::from_secs(60));
        cache.put("token", claims_with_exp(Utc::now().timestamp() + 3600));
        cache.invalidate("token");
        assert!(cache.get("token").is_none());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = ValidationCache::with_capacity(Duration::from_secs(60), 2);
        let exp = Utc::now().timestamp() + 3600;
        for i in 0..10 {
            cache.put(&format!("token-{i}"), claims_with_exp(exp));
        }
        cache.run_pending_tasks();
        assert!(cache.entry_count() <= 2);
    }
}
