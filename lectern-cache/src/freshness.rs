//! Freshness contracts for cache reads.
//!
//! Callers state how stale a cached page may be, and every read carries
//! metadata about where it came from.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Freshness requirement for cache reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Serve cached pages whose list head was fetched no longer than
    /// `max_staleness` ago; otherwise fetch.
    BestEffort { max_staleness: Duration },

    /// Always fetch from the server, replacing the cached page.
    Consistent,
}

impl Freshness {
    pub fn best_effort(max_staleness: Duration) -> Self {
        Self::BestEffort { max_staleness }
    }

    pub fn consistent() -> Self {
        Self::Consistent
    }

    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::BestEffort { .. })
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent)
    }

    /// Get the max staleness for BestEffort, or zero for Consistent.
    pub fn max_staleness(&self) -> Duration {
        match self {
            Self::BestEffort { max_staleness } => *max_staleness,
            Self::Consistent => Duration::ZERO,
        }
    }

    /// Whether data fetched at `fetched_at` satisfies this requirement at `now`.
    pub fn accepts(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::Consistent => false,
            Self::BestEffort { max_staleness } => age(fetched_at, now) <= *max_staleness,
        }
    }
}

/// Result of a cache read, carrying staleness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
    was_cache_hit: bool,
    /// Whether the value includes optimistic local writes.
    optimistic: bool,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, cached_at: DateTime<Utc>, optimistic: bool) -> Self {
        Self {
            value,
            cached_at,
            was_cache_hit: true,
            optimistic,
        }
    }

    pub fn from_server(value: T) -> Self {
        Self {
            value,
            cached_at: Utc::now(),
            was_cache_hit: false,
            optimistic: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn staleness(&self) -> Duration {
        age(self.cached_at, Utc::now())
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    pub fn is_optimistic(&self) -> bool {
        self.optimistic
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            was_cache_hit: self.was_cache_hit,
            optimistic: self.optimistic,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

pub(crate) fn age(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
