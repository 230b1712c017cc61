//! The infinite-pagination cache.

use crate::entry::CacheEntry;
use crate::error::{CacheError, CacheResult};
use crate::fetcher::PageFetcher;
use crate::freshness::{age, CacheRead, Freshness};
use crate::key::{CacheKey, ListQuery};
use crate::mutation::{apply_to_pages, CacheUpdate, Change, Mutation, MutationReport, MutationTarget};
use crate::registry::KindRegistry;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use lectern_core::{FetchError, Page, PageRequest};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the infinite cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Cached pages older than this are refetched on read and reported stale.
    pub max_staleness: Duration,
    /// An optimistic write older than this marks its entry stale.
    pub optimistic_window: Duration,
    /// Page size used when a caller does not pick one.
    pub default_page_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_staleness: Duration::from_secs(300),
            optimistic_window: Duration::from_secs(30),
            default_page_size: 20,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_staleness(mut self, duration: Duration) -> Self {
        self.max_staleness = duration;
        self
    }

    pub fn with_optimistic_window(mut self, duration: Duration) -> Self {
        self.optimistic_window = duration;
        self
    }

    pub fn with_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size.max(1);
        self
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Page, FetchError>>>;
type PageSlot = (CacheKey, usize);

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    registry: KindRegistry,
}

/// Paged list cache shared by every list view of a session.
///
/// State sits behind `std::sync` locks that are never held across an
/// `.await`; fetches run outside the locks and are coalesced per page.
pub struct InfiniteCache {
    config: CacheConfig,
    state: RwLock<CacheState>,
    in_flight: Mutex<HashMap<PageSlot, SharedFetch>>,
}

impl fmt::Debug for InfiniteCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.state.read().map(|s| s.entries.len()).unwrap_or(0);
        f.debug_struct("InfiniteCache")
            .field("config", &self.config)
            .field("entries", &entries)
            .finish()
    }
}

impl Default for InfiniteCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl InfiniteCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CacheState::default()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn read(&self) -> CacheResult<RwLockReadGuard<'_, CacheState>> {
        self.state.read().map_err(|_| CacheError::LockPoisoned)
    }

    fn write(&self) -> CacheResult<RwLockWriteGuard<'_, CacheState>> {
        self.state.write().map_err(|_| CacheError::LockPoisoned)
    }

    fn lock_in_flight(&self) -> CacheResult<MutexGuard<'_, HashMap<PageSlot, SharedFetch>>> {
        self.in_flight.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Make sure an entry exists for `query`. Idempotent.
    pub fn register(&self, query: &ListQuery) -> CacheResult<CacheKey> {
        let key = query.key();
        let mut state = self.write()?;
        if !state.entries.contains_key(&key) {
            state
                .entries
                .insert(key.clone(), CacheEntry::new(query.clone()));
            state.registry.insert(key.clone());
            debug!(key = %key, "Registered cache entry");
        }
        Ok(key)
    }

    /// Snapshot of one entry.
    pub fn entry(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        Ok(self.read()?.entries.get(key).cloned())
    }

    /// Every cached page of an entry, with freshness metadata.
    pub fn pages(&self, key: &CacheKey) -> CacheResult<Option<CacheRead<Vec<Page>>>> {
        let state = self.read()?;
        Ok(state.entries.get(key).and_then(|entry| {
            entry.fetched_at().map(|fetched_at| {
                CacheRead::from_cache(entry.pages().to_vec(), fetched_at, entry.is_optimistic())
            })
        }))
    }

    pub fn keys(&self) -> CacheResult<Vec<CacheKey>> {
        Ok(self.read()?.entries.keys().cloned().collect())
    }

    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.read()?.entries.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Load one page, from cache when `freshness` allows it.
    ///
    /// Concurrent loads of the same page share one fetch. The first caller
    /// to observe the completed fetch stores the page.
    pub async fn load_page(
        &self,
        query: &ListQuery,
        index: usize,
        fetcher: Arc<dyn PageFetcher>,
        freshness: &Freshness,
    ) -> CacheResult<CacheRead<Page>> {
        let key = self.register(query)?;
        if let Some(hit) = self.cached_page(&key, index, freshness)? {
            debug!(key = %key, index, "Cache hit");
            return Ok(hit);
        }

        let slot = (key.clone(), index);
        let fetch = self.join_or_start(&slot, query, fetcher)?;
        let result = fetch.clone().await;

        let owner = {
            let mut in_flight = self.lock_in_flight()?;
            match in_flight.get(&slot) {
                Some(current) if current.ptr_eq(&fetch) => {
                    in_flight.remove(&slot);
                    true
                }
                _ => false,
            }
        };

        let page = result?;
        if owner {
            self.store_page(&key, index, page.clone())?;
        }
        Ok(CacheRead::from_server(page))
    }

    /// Load the page after the last cached one.
    ///
    /// Returns `None` once the cached pages cover the whole list.
    pub async fn load_next_page(
        &self,
        query: &ListQuery,
        fetcher: Arc<dyn PageFetcher>,
    ) -> CacheResult<Option<CacheRead<Page>>> {
        let key = self.register(query)?;
        let next = {
            let state = self.read()?;
            match state.entries.get(&key) {
                Some(entry) if entry.is_exhausted() => return Ok(None),
                Some(entry) => entry.pages().len(),
                None => 0,
            }
        };
        let freshness = Freshness::best_effort(self.config.max_staleness);
        self.load_page(query, next, fetcher, &freshness)
            .await
            .map(Some)
    }

    /// Refetch every loaded page of an entry and drop optimistic state.
    ///
    /// Returns the number of pages now cached.
    pub async fn revalidate(
        &self,
        key: &CacheKey,
        fetcher: Arc<dyn PageFetcher>,
    ) -> CacheResult<usize> {
        let (query, count) = {
            let state = self.read()?;
            let entry = state
                .entries
                .get(key)
                .ok_or_else(|| CacheError::UnknownKey(key.clone()))?;
            (entry.query().clone(), entry.pages().len().max(1))
        };

        let mut pages = Vec::with_capacity(count);
        for index in 0..count {
            let request = PageRequest::new(index, query.page_size);
            let page = fetcher
                .fetch_page(&query.service, &query.options, request)
                .await?;
            let short = (page.len() as u64) < query.page_size;
            pages.push(page);
            if short {
                break;
            }
        }

        let stored = pages.len();
        let mut state = self.write()?;
        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.replace_pages(pages, Utc::now());
                debug!(key = %key, pages = stored, "Revalidated cache entry");
                Ok(stored)
            }
            None => Err(CacheError::UnknownKey(key.clone())),
        }
    }

    /// Keys whose data is older than `max_staleness` or whose optimistic
    /// writes are older than `optimistic_window`.
    pub fn stale_keys(&self) -> CacheResult<Vec<CacheKey>> {
        self.stale_keys_at(Utc::now())
    }

    pub fn stale_keys_at(&self, now: DateTime<Utc>) -> CacheResult<Vec<CacheKey>> {
        let state = self.read()?;
        Ok(state
            .entries
            .iter()
            .filter(|(_, entry)| {
                let data_stale = entry
                    .fetched_at()
                    .is_some_and(|t| age(t, now) > self.config.max_staleness);
                let drift_stale = entry
                    .optimistic_since()
                    .is_some_and(|t| age(t, now) > self.config.optimistic_window);
                data_stale || drift_stale
            })
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Apply an optimistic write to every matching entry.
    pub fn apply(&self, update: CacheUpdate) -> CacheResult<MutationReport> {
        self.apply_at(update, Utc::now())
    }

    pub fn apply_at(&self, update: CacheUpdate, now: DateTime<Utc>) -> CacheResult<MutationReport> {
        if update.mutation == Mutation::Create && update.change.record().is_none() {
            debug!(target = ?update.target, "Create needs a literal record, ignoring updater");
            return Ok(MutationReport::default());
        }

        let mut state = self.write()?;
        let keys = state.registry.keys_for(&update.target);
        // a top-level create lands in one list only: the freshest head
        let first_only = update.mutation == Mutation::Create && update.nested_field.is_none();

        let mut report = MutationReport::default();
        for key in &keys {
            let Some(entry) = state.entries.get_mut(key) else {
                continue;
            };
            if first_only && entry.pages().is_empty() {
                continue;
            }
            let touched = apply_to_pages(&update, entry.pages_mut());
            if touched > 0 {
                entry.mark_optimistic(now);
            }
            report.record_entry(touched);
            if first_only {
                break;
            }
        }

        debug!(
            target = ?update.target,
            mutation = ?update.mutation,
            nested = ?update.nested_field,
            entries = report.entries_touched,
            items = report.items_touched,
            "Applied optimistic update"
        );
        Ok(report)
    }

    /// Positional form of [`InfiniteCache::apply`].
    pub fn update_infinite_cache(
        &self,
        target: MutationTarget,
        change: impl Into<Change>,
        mutation: Mutation,
        nested_field: Option<&str>,
        move_to_top: bool,
    ) -> CacheResult<MutationReport> {
        let mut update = CacheUpdate::new(target, change, mutation);
        update.nested_field = nested_field.map(str::to_string);
        update.move_to_top = move_to_top;
        self.apply(update)
    }

    /// Drop every entry matched by `target`. Returns how many were dropped.
    pub fn invalidate(&self, target: &MutationTarget) -> CacheResult<usize> {
        let mut state = self.write()?;
        let keys = state.registry.keys_for(target);
        for key in &keys {
            state.entries.remove(key);
            state.registry.remove(key);
        }
        Ok(keys.len())
    }

    pub fn remove(&self, key: &CacheKey) -> CacheResult<bool> {
        let mut state = self.write()?;
        state.registry.remove(key);
        Ok(state.entries.remove(key).is_some())
    }

    /// Forget everything, including fetches still in flight.
    pub fn clear(&self) -> CacheResult<()> {
        let mut state = self.write()?;
        state.entries.clear();
        state.registry.clear();
        drop(state);
        self.lock_in_flight()?.clear();
        Ok(())
    }

    fn cached_page(
        &self,
        key: &CacheKey,
        index: usize,
        freshness: &Freshness,
    ) -> CacheResult<Option<CacheRead<Page>>> {
        let state = self.read()?;
        let Some(entry) = state.entries.get(key) else {
            return Ok(None);
        };
        let (Some(page), Some(fetched_at)) = (entry.page(index), entry.fetched_at()) else {
            return Ok(None);
        };
        if !freshness.accepts(fetched_at, Utc::now()) {
            return Ok(None);
        }
        Ok(Some(CacheRead::from_cache(
            page.clone(),
            fetched_at,
            entry.is_optimistic(),
        )))
    }

    fn join_or_start(
        &self,
        slot: &PageSlot,
        query: &ListQuery,
        fetcher: Arc<dyn PageFetcher>,
    ) -> CacheResult<SharedFetch> {
        let mut in_flight = self.lock_in_flight()?;
        if let Some(existing) = in_flight.get(slot) {
            debug!(key = %slot.0, index = slot.1, "Joining in-flight fetch");
            return Ok(existing.clone());
        }

        let service = query.service.clone();
        let options = query.options.clone();
        let request = PageRequest::new(slot.1, query.page_size);
        let fetch = async move { fetcher.fetch_page(&service, &options, request).await }
            .boxed()
            .shared();
        in_flight.insert(slot.clone(), fetch.clone());
        debug!(key = %slot.0, index = slot.1, "Fetching page");
        Ok(fetch)
    }

    fn store_page(&self, key: &CacheKey, index: usize, page: Page) -> CacheResult<()> {
        let mut state = self.write()?;
        match state.entries.get_mut(key) {
            Some(entry) => {
                if !entry.store_page(index, page, Utc::now()) {
                    warn!(key = %key, index, "Dropped page that does not follow the cached pages");
                }
            }
            None => debug!(key = %key, index, "Dropped page for an entry that was removed"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lectern_core::{PageCursor, QueryOptions, Record, RecordId, ResourceKind, ServiceId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ASSETS: ServiceId = ServiceId::new(ResourceKind::Asset, "/api/assets");
    const HISTORY: ServiceId = ServiceId::new(ResourceKind::Asset, "/api/assets/history");
    const COMMENTS: ServiceId = ServiceId::new(ResourceKind::Comment, "/api/comments");

    /// Serves `total` numbered records; counts calls.
    struct Numbered {
        total: u64,
        prefix: &'static str,
        calls: AtomicUsize,
    }

    impl Numbered {
        fn new(prefix: &'static str, total: u64) -> Arc<Self> {
            Arc::new(Self {
                total,
                prefix,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for Numbered {
        async fn fetch_page(
            &self,
            _service: &ServiceId,
            _options: &QueryOptions,
            request: PageRequest,
        ) -> Result<Page, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            let start = request.skip();
            let end = (start + request.limit).min(self.total);
            let items = (start..end)
                .map(|i| Record::new(format!("{}{}", self.prefix, i)).with("title", format!("#{i}")))
                .collect();
            Ok(Page::new(
                items,
                self.total,
                PageCursor {
                    skip: start,
                    limit: request.limit,
                    ..PageCursor::default()
                },
            ))
        }
    }

    struct Failing;

    #[async_trait]
    impl PageFetcher for Failing {
        async fn fetch_page(
            &self,
            _service: &ServiceId,
            _options: &QueryOptions,
            _request: PageRequest,
        ) -> Result<Page, FetchError> {
            Err(FetchError::Unauthorized)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_page_appends_until_exhausted() {
        let cache = InfiniteCache::default();
        let fetcher = Numbered::new("a", 5);
        let query = ListQuery::new(ASSETS, QueryOptions::new(), 2);

        for _ in 0..3 {
            let page = cache
                .load_next_page(&query, fetcher.clone())
                .await
                .expect("load")
                .expect("page");
            assert!(page.was_cache_miss());
        }
        assert!(cache
            .load_next_page(&query, fetcher.clone())
            .await
            .expect("load")
            .is_none());

        let entry = cache.entry(&query.key()).expect("read").expect("entry");
        assert_eq!(entry.item_count(), 5);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_page_is_not_refetched() {
        let cache = InfiniteCache::default();
        let fetcher = Numbered::new("a", 5);
        let query = ListQuery::new(ASSETS, QueryOptions::new(), 2);
        let freshness = Freshness::best_effort(Duration::from_secs(60));

        cache.load_page(&query, 0, fetcher.clone(), &freshness).await.expect("first");
        let again = cache.load_page(&query, 0, fetcher.clone(), &freshness).await.expect("second");

        assert!(again.was_cache_hit());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let forced = cache
            .load_page(&query, 0, fetcher.clone(), &Freshness::consistent())
            .await
            .expect("forced");
        assert!(forced.was_cache_miss());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_fetch() {
        let cache = InfiniteCache::default();
        let fetcher = Numbered::new("a", 10);
        let query = ListQuery::new(ASSETS, QueryOptions::new(), 5);
        let freshness = Freshness::best_effort(Duration::from_secs(60));

        let (a, b, c) = tokio::join!(
            cache.load_page(&query, 0, fetcher.clone(), &freshness),
            cache.load_page(&query, 0, fetcher.clone(), &freshness),
            cache.load_page(&query, 0, fetcher.clone(), &freshness),
        );
        assert_eq!(a.expect("a").value(), b.expect("b").value());
        assert!(c.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.entry(&query.key()).expect("read").expect("entry").pages().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_and_caches_nothing() {
        let cache = InfiniteCache::default();
        let query = ListQuery::new(ASSETS, QueryOptions::new(), 5);
        let err = cache
            .load_next_page(&query, Arc::new(Failing))
            .await
            .expect_err("must fail");
        assert_eq!(err, CacheError::Fetch(FetchError::Unauthorized));
        let entry = cache.entry(&query.key()).expect("read").expect("entry");
        assert!(entry.pages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_fans_out_across_services() {
        let cache = InfiniteCache::default();
        let all = ListQuery::new(ASSETS, QueryOptions::new(), 10);
        let history = ListQuery::new(HISTORY, QueryOptions::new().with("mine", true), 10);
        let comments = ListQuery::new(COMMENTS, QueryOptions::new(), 10);
        let fetcher = Numbered::new("a", 3);
        cache.load_next_page(&all, fetcher.clone()).await.expect("all");
        cache.load_next_page(&history, fetcher.clone()).await.expect("history");
        cache.load_next_page(&comments, fetcher.clone()).await.expect("comments");
        let untouched = cache.entry(&comments.key()).expect("read");

        let report = cache
            .apply(CacheUpdate::update(
                MutationTarget::Kind(ResourceKind::Asset),
                Record::new("a1").with("liked", true),
            ))
            .expect("apply");

        assert_eq!(report.entries_touched, 2);
        for key in [all.key(), history.key()] {
            let entry = cache.entry(&key).expect("read").expect("entry");
            let item = &entry.pages()[0].items[1];
            assert_eq!(item.get("liked"), Some(&json!(true)));
            assert!(entry.is_optimistic());
        }
        assert_eq!(cache.entry(&comments.key()).expect("read"), untouched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_target_limits_fan_out() {
        let cache = InfiniteCache::default();
        let all = ListQuery::new(ASSETS, QueryOptions::new(), 10);
        let history = ListQuery::new(HISTORY, QueryOptions::new(), 10);
        let fetcher = Numbered::new("a", 3);
        cache.load_next_page(&all, fetcher.clone()).await.expect("all");
        cache.load_next_page(&history, fetcher.clone()).await.expect("history");

        let report = cache
            .update_infinite_cache(
                MutationTarget::Service(HISTORY),
                Record::new("a0").with("title", "renamed"),
                Mutation::Update,
                None,
                false,
            )
            .expect("apply");

        assert_eq!(report.entries_touched, 1);
        let all_entry = cache.entry(&all.key()).expect("read").expect("entry");
        assert_eq!(all_entry.pages()[0].items[0].get("title"), Some(&json!("#0")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_targets_first_loaded_entry_only() {
        let cache = InfiniteCache::default();
        let empty = ListQuery::new(ASSETS, QueryOptions::new().with("owner", 9), 10);
        let first = ListQuery::new(ASSETS, QueryOptions::new(), 10);
        let second = ListQuery::new(HISTORY, QueryOptions::new(), 10);
        cache.register(&empty).expect("register");
        let fetcher = Numbered::new("a", 3);
        cache.load_next_page(&first, fetcher.clone()).await.expect("first");
        cache.load_next_page(&second, fetcher.clone()).await.expect("second");

        let report = cache
            .apply(CacheUpdate::create(
                MutationTarget::Kind(ResourceKind::Asset),
                Record::new("new"),
            ))
            .expect("apply");

        assert_eq!(report.entries_touched, 1);
        let first_entry = cache.entry(&first.key()).expect("read").expect("entry");
        assert_eq!(first_entry.total(), 4);
        assert_eq!(
            first_entry.pages()[0].items[0].id(),
            Some(RecordId::from("new"))
        );
        let second_entry = cache.entry(&second.key()).expect("read").expect("entry");
        assert_eq!(second_entry.total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id_is_noop() {
        let cache = InfiniteCache::default();
        let query = ListQuery::new(ASSETS, QueryOptions::new(), 10);
        cache.load_next_page(&query, Numbered::new("a", 3)).await.expect("load");
        let before = cache.entry(&query.key()).expect("read");

        let report = cache
            .apply(CacheUpdate::update(
                MutationTarget::Kind(ResourceKind::Asset),
                Record::new("missing").with("liked", true),
            ))
            .expect("apply");

        assert!(report.is_noop());
        assert_eq!(cache.entry(&query.key()).expect("read"), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optimistic_write_goes_stale_and_revalidates() {
        let cache = InfiniteCache::new(CacheConfig::new().with_optimistic_window(Duration::from_secs(5)));
        let query = ListQuery::new(ASSETS, QueryOptions::new(), 10);
        let fetcher = Numbered::new("a", 3);
        cache.load_next_page(&query, fetcher.clone()).await.expect("load");

        let now = Utc::now();
        cache
            .apply_at(
                CacheUpdate::delete(MutationTarget::Service(ASSETS), Record::new("a0")),
                now,
            )
            .expect("apply");
        assert!(cache.stale_keys_at(now).expect("stale").is_empty());
        let later = now + chrono::Duration::seconds(6);
        assert_eq!(cache.stale_keys_at(later).expect("stale"), vec![query.key()]);

        let pages = cache.revalidate(&query.key(), fetcher.clone()).await.expect("revalidate");
        assert_eq!(pages, 1);
        let entry = cache.entry(&query.key()).expect("read").expect("entry");
        assert!(!entry.is_optimistic());
        assert_eq!(entry.total(), 3);
    }

    #[tokio::test]
    async fn test_revalidate_unknown_key() {
        let cache = InfiniteCache::default();
        let key = ListQuery::new(ASSETS, QueryOptions::new(), 10).key();
        let err = cache
            .revalidate(&key, Arc::new(Failing))
            .await
            .expect_err("unknown");
        assert_eq!(err, CacheError::UnknownKey(key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_and_clear() {
        let cache = InfiniteCache::default();
        let fetcher = Numbered::new("a", 3);
        let assets = ListQuery::new(ASSETS, QueryOptions::new(), 10);
        let comments = ListQuery::new(COMMENTS, QueryOptions::new(), 10);
        cache.load_next_page(&assets, fetcher.clone()).await.expect("assets");
        cache.load_next_page(&comments, fetcher.clone()).await.expect("comments");

        let dropped = cache
            .invalidate(&MutationTarget::Kind(ResourceKind::Asset))
            .expect("invalidate");
        assert_eq!(dropped, 1);
        assert_eq!(cache.keys().expect("keys"), vec![comments.key()]);

        cache.clear().expect("clear");
        assert!(cache.is_empty().expect("empty"));
    }
}
