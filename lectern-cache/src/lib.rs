//! Infinite-pagination cache with optimistic fan-out updates.
//!
//! List views load pages of results through [`InfiniteCache::load_page`] and
//! [`InfiniteCache::load_next_page`]. Pages are cached per [`CacheKey`], a
//! fingerprint of the list service and its query options.
//!
//! Any component may announce that a record changed by applying a
//! [`CacheUpdate`]. The update is fanned out to every cached list that could
//! hold the record, selected through the typed [`KindRegistry`], without a
//! network round trip.
//!
//! # Staleness
//!
//! Optimistic writes are not reconciled with the server. They are corrected
//! by the next natural refetch. To keep that drift bounded, an entry that
//! received an optimistic write is reported by [`InfiniteCache::stale_keys`]
//! once `optimistic_window` has elapsed, and callers are expected to
//! [`InfiniteCache::revalidate`] it.
//!
//! # Example
//!
//! ```ignore
//! let query = ListQuery::new(ASSETS, QueryOptions::new().with("sort", "-created"), 20);
//! let first = cache.load_next_page(&query, fetcher.clone()).await?;
//!
//! // a like toggled somewhere else on the page
//! cache.apply(CacheUpdate::update(
//!     MutationTarget::Kind(ResourceKind::Asset),
//!     Change::Record(Record::new(asset_id).with("liked", true)),
//! ))?;
//! ```

pub mod entry;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod infinite;
pub mod key;
pub mod mutation;
pub mod registry;

pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult};
pub use fetcher::PageFetcher;
pub use freshness::{CacheRead, Freshness};
pub use infinite::{CacheConfig, InfiniteCache};
pub use key::{CacheKey, ListQuery};
pub use mutation::{CacheUpdate, Change, Mutation, MutationReport, MutationTarget};
pub use registry::KindRegistry;
