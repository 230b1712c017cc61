//! Cache keys for list queries.
//!
//! A `CacheKey` can only be built from a [`ListQuery`], so every key carries
//! its service identity. Two services that happen to take the same options
//! can never share an entry.

use lectern_core::{QueryOptions, ResourceKind, ServiceId};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator between fingerprint components.
const SEPARATOR: u8 = 0xFF;

/// One logical list query: a service, its options and a page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub service: ServiceId,
    pub options: QueryOptions,
    pub page_size: u64,
}

impl ListQuery {
    pub fn new(service: ServiceId, options: QueryOptions, page_size: u64) -> Self {
        Self {
            service,
            options,
            page_size: page_size.max(1),
        }
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::for_query(self)
    }
}

/// Fingerprint of a [`ListQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct KeyInner {
    service: ServiceId,
    fingerprint: String,
}

impl CacheKey {
    fn for_query(query: &ListQuery) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(query.service.kind().as_str().as_bytes());
        hasher.update([SEPARATOR]);
        hasher.update(query.service.path().as_bytes());
        hasher.update([SEPARATOR]);
        hasher.update(query.page_size.to_be_bytes());
        hasher.update([SEPARATOR]);
        hasher.update(query.options.canonical().as_bytes());
        Self {
            inner: KeyInner {
                service: query.service.clone(),
                fingerprint: hex::encode(hasher.finalize()),
            },
        }
    }

    pub fn service(&self) -> &ServiceId {
        &self.inner.service
    }

    pub fn kind(&self) -> ResourceKind {
        self.inner.service.kind()
    }

    /// Hex SHA-256 of the query.
    pub fn fingerprint(&self) -> &str {
        &self.inner.fingerprint
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.inner.service, &self.inner.fingerprint[..12])
    }
}
