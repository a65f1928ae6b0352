//! Subscription cache with explicit expiry
//!
//! Storage is injected, so the cache holds no process-wide state: each
//! lookup takes an owner id and returns a fresh value or nothing, and
//! entries are dropped with [`EntitlementCache::invalidate`].

use super::Subscription;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// A subscription with the time it was stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSubscription {
    /// Cached value
    pub subscription: Subscription,
    /// When the value was stored
    pub stored_at: DateTime<Utc>,
}

/// Backing store for cached subscriptions
pub trait CacheStorage: Send + Sync {
    /// Load the entry of an owner
    fn load(&self, owner_id: u64) -> Option<CachedSubscription>;
    /// Store the entry of an owner
    fn store(&self, owner_id: u64, entry: CachedSubscription);
    /// Drop the entry of an owner
    fn remove(&self, owner_id: u64);
}

/// In-process storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<u64, CachedSubscription>>,
}

impl CacheStorage for MemoryStorage {
    fn load(&self, owner_id: u64) -> Option<CachedSubscription> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(&owner_id).cloned()
    }

    fn store(&self, owner_id: u64, entry: CachedSubscription) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(owner_id, entry);
    }

    fn remove(&self, owner_id: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&owner_id);
    }
}

/// Authoritative subscription lookup (the entitlement service)
#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    /// Fetch the current subscription of an owner
    async fn fetch(&self, owner_id: u64) -> Result<Subscription>;
}

/// Subscription cache
pub struct EntitlementCache {
    storage: Box<dyn CacheStorage>,
    /// Entries younger than this are served without refetching
    validity: Duration,
    /// Expired entries younger than this may still be served when the
    /// source is unavailable
    retention: Duration,
}

impl EntitlementCache {
    /// One hour
    pub const DEFAULT_VALIDITY_SECONDS: i64 = 3600;
    /// Three days
    pub const DEFAULT_RETENTION_SECONDS: i64 = 60 * 60 * 24 * 3;

    /// Create a cache over `storage`
    pub fn new(storage: Box<dyn CacheStorage>, validity: Duration, retention: Duration) -> Self {
        Self {
            storage,
            validity,
            retention,
        }
    }

    /// In-memory cache with default windows
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(MemoryStorage::default()),
            Duration::seconds(Self::DEFAULT_VALIDITY_SECONDS),
            Duration::seconds(Self::DEFAULT_RETENTION_SECONDS),
        )
    }

    /// Cached subscription, if present and not expired at `now`
    pub fn get(&self, owner_id: u64, now: DateTime<Utc>) -> Option<Subscription> {
        self.storage
            .load(owner_id)
            .filter(|entry| !self.has_expired(entry, now))
            .map(|entry| entry.subscription)
    }

    /// Store a subscription as of `now`
    pub fn put(&self, subscription: Subscription, now: DateTime<Utc>) {
        let owner_id = subscription.owner_id;
        self.storage.store(
            owner_id,
            CachedSubscription {
                subscription,
                stored_at: now,
            },
        );
    }

    /// Drop the cached subscription of an owner
    pub fn invalidate(&self, owner_id: u64) {
        debug!(owner_id, "invalidating cached subscription");
        self.storage.remove(owner_id);
    }

    /// Whether an entry is too old to be served without refetching
    pub fn has_expired(&self, entry: &CachedSubscription, now: DateTime<Utc>) -> bool {
        now - entry.stored_at > self.validity
    }

    /// Subscription of an owner, refetched from `source` when expired
    ///
    /// When the source fails and a retained entry exists, the stale entry is
    /// served instead of the error.
    pub async fn subscription(
        &self,
        source: &dyn SubscriptionSource,
        owner_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let cached = self.storage.load(owner_id);
        if let Some(ref entry) = cached
            && !self.has_expired(entry, now)
        {
            return Ok(entry.subscription.clone());
        }

        match source.fetch(owner_id).await {
            Ok(subscription) => {
                debug!(owner_id, active = subscription.active, "refreshed subscription");
                self.put(subscription.clone(), now);
                Ok(subscription)
            }
            Err(e) => match cached.filter(|entry| now - entry.stored_at <= self.retention) {
                Some(entry) => {
                    warn!(owner_id, error = %e, "subscription source unavailable, serving stale entry");
                    Ok(entry.subscription)
                }
                None => Err(e),
            },
        }
    }
}

impl std::fmt::Debug for EntitlementCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementCache")
            .field("validity", &self.validity)
            .field("retention", &self.retention)
            .finish_non_exhaustive()
    }
}
