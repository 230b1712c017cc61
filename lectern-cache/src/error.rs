//! Cache error types.

use crate::key::CacheKey;
use lectern_core::FetchError;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("No cache entry for {0}")]
    UnknownKey(CacheKey),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

pub type CacheResult<T> = Result<T, CacheError>;
