use std::time::{Duration, Instant};

use dashmap::DashMap;
use url::Url;

use crate::status::Status;

/// Default time-to-live for cached link statuses, 5 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// An explicit TTL cache for link-check outcomes, keyed by URL.
///
/// The cache is injected into the scanner instead of living in a
/// module-level static, which keeps eviction deterministic and testable.
/// Within a site scan it also guarantees that each unique URL hits the
/// network at most once.
#[derive(Debug)]
pub struct ResponseCache {
    entries: DashMap<Url, CacheEntry>,
    ttl: Duration,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    status: Status,
    expires_at: Instant,
}

impl ResponseCache {
    /// Create an empty cache with the given time-to-live
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Look up a still-valid status for `url`.
    /// Expired entries are evicted on access.
    #[must_use]
    pub fn get(&self, url: &Url) -> Option<Status> {
        self.get_at(url, Instant::now())
    }

    pub(crate) fn get_at(&self, url: &Url, now: Instant) -> Option<Status> {
        let expired = match self.entries.get(url) {
            Some(entry) if entry.expires_at > now => return Some(entry.status.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(url);
        }
        None
    }

    /// Memoize a status for `url` until the TTL runs out
    pub fn insert(&self, url: Url, status: Status) {
        self.insert_at(url, status, Instant::now());
    }

    pub(crate) fn insert_at(&self, url: Url, status: Status, now: Instant) {
        self.entries.insert(
            url,
            CacheEntry {
                status,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached entries, including not-yet-evicted expired ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
