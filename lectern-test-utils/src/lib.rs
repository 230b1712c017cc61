//! Lectern Test Utilities
//!
//! Shared test infrastructure for the Lectern workspace:
//! - Proptest generators for records, queries and watch records
//! - Fixtures for pages, services and notifications
//! - A mock page fetcher and a recording progress sink

pub use lectern_cache::{CacheKey, InfiniteCache, ListQuery, PageFetcher};
pub use lectern_client::{ClientError, ProgressSink};
pub use lectern_core::{
    FetchError, Notification, Page, PageCursor, PageRequest, ProgressUpdate, QueryOptions, Record,
    RecordId, ResourceKind, ServiceId, WatchRecord,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// MOCK FETCHER
// ============================================================================

/// In-memory list endpoints keyed by service.
///
/// Every service not explicitly loaded serves an empty list.
#[derive(Debug, Default)]
pub struct MockFetcher {
    lists: HashMap<ServiceId, Vec<Record>>,
    delay: Option<Duration>,
    failure: Option<FetchError>,
    calls: AtomicUsize,
    calls_by_service: Mutex<HashMap<ServiceId, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, service: ServiceId, items: Vec<Record>) -> Self {
        self.lists.insert(service, items);
        self
    }

    /// Sleep on the Tokio clock before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self, error: FetchError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, service: &ServiceId) -> usize {
        self.calls_by_service
            .lock()
            .expect("calls lock")
            .get(service)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_page(
        &self,
        service: &ServiceId,
        _options: &QueryOptions,
        request: PageRequest,
    ) -> Result<Page, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls_by_service
            .lock()
            .expect("calls lock")
            .entry(service.clone())
            .or_default() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let items = self.lists.get(service).map(Vec::as_slice).unwrap_or(&[]);
        let start = (request.skip() as usize).min(items.len());
        let end = (start + request.limit as usize).min(items.len());
        Ok(Page::new(
            items[start..end].to_vec(),
            items.len() as u64,
            PageCursor {
                skip: request.skip(),
                limit: request.limit,
                ..PageCursor::default()
            },
        ))
    }
}

// ============================================================================
// RECORDING SINK
// ============================================================================

/// Progress sink that records every call. Can be switched to fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    started: Mutex<Vec<RecordId>>,
    saved: Mutex<Vec<ProgressUpdate>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn started(&self) -> Vec<RecordId> {
        self.started.lock().expect("started lock").clone()
    }

    pub fn saved(&self) -> Vec<ProgressUpdate> {
        self.saved.lock().expect("saved lock").clone()
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().expect("saved lock").len()
    }

    fn result(&self) -> Result<(), ClientError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ClientError::Status {
                status: 503,
                message: "unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn mark_started(&self, resource_id: &RecordId) -> Result<(), ClientError> {
        self.started
            .lock()
            .expect("started lock")
            .push(resource_id.clone());
        self.result()
    }

    async fn save_progress(&self, update: &ProgressUpdate) -> Result<(), ClientError> {
        self.saved.lock().expect("saved lock").push(update.clone());
        self.result()
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::collection::{btree_set, vec};
    use proptest::prelude::*;

    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        prop_oneof![
            any::<u32>().prop_map(|n| RecordId::from(n as u64)),
            "[a-z]{1,8}".prop_map(RecordId::from),
        ]
    }

    pub fn arb_resource_kind() -> impl Strategy<Value = ResourceKind> {
        proptest::sample::select(ResourceKind::ALL.to_vec())
    }

    /// A record with a few scalar fields.
    pub fn arb_record(id: RecordId) -> impl Strategy<Value = Record> {
        ("[a-zA-Z ]{0,16}", any::<bool>(), 0u32..1_000).prop_map(move |(title, liked, views)| {
            Record::new(id.clone())
                .with("title", title)
                .with("liked", liked)
                .with("views", views)
        })
    }

    /// Records with distinct numeric ids drawn from `0..id_space`.
    pub fn arb_records(max: usize, id_space: u64) -> impl Strategy<Value = Vec<Record>> {
        btree_set(0..id_space, 0..=max).prop_flat_map(|ids| {
            ids.into_iter()
                .map(|id| arb_record(RecordId::from(id)))
                .collect::<Vec<_>>()
        })
    }

    pub fn arb_query_options() -> impl Strategy<Value = QueryOptions> {
        vec(("[a-z]{1,6}", 0i64..100), 0..4).prop_map(|pairs| {
            pairs
                .into_iter()
                .fold(QueryOptions::new(), |options, (k, v)| options.with(k, v))
        })
    }

    pub fn arb_watch_record() -> impl Strategy<Value = WatchRecord> {
        (
            arb_record_id(),
            proptest::option::of(1.0f64..20_000.0),
            0.0f64..=100.0,
            proptest::option::of(0u64..20_000),
        )
            .prop_map(|(id, duration, cutoff, position)| {
                let record = WatchRecord::new(id, duration, cutoff);
                match position {
                    Some(p) => record.with_position(p),
                    None => record,
                }
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use serde_json::json;

    pub const ASSETS: ServiceId = ServiceId::new(ResourceKind::Asset, "/api/assets");
    pub const ASSET_HISTORY: ServiceId = ServiceId::new(ResourceKind::Asset, "/api/assets/history");
    pub const FEATURED_ASSETS: ServiceId =
        ServiceId::new(ResourceKind::Asset, "/api/assets/featured");
    pub const COMMENT_THREADS: ServiceId =
        ServiceId::new(ResourceKind::CommentThread, "/api/comment-threads");
    pub const CHANNELS: ServiceId = ServiceId::new(ResourceKind::Channel, "/api/channels");

    pub fn record(id: impl Into<RecordId>, title: &str) -> Record {
        Record::new(id).with("title", title)
    }

    /// `count` records with ids `{prefix}0..{prefix}{count-1}`.
    pub fn numbered(prefix: &str, count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| record(format!("{prefix}{i}"), &format!("{prefix} #{i}")))
            .collect()
    }

    /// A thread with `children` replies, each linked back through
    /// `parent_id`.
    pub fn thread_with_replies(id: &str, replies: usize) -> Record {
        let children = (0..replies)
            .map(|i| {
                Record::new(format!("{id}-r{i}"))
                    .with("parent_id", id)
                    .with("body", format!("reply {i}"))
                    .into_value()
            })
            .collect::<Vec<_>>();
        Record::new(id)
            .with("title", format!("thread {id}"))
            .with("children", children)
    }

    pub fn query(service: ServiceId, page_size: u64) -> ListQuery {
        ListQuery::new(service, QueryOptions::new(), page_size)
    }

    pub fn notification(id: u64, title: &str) -> Notification {
        serde_json::from_value(json!({
            "id": id,
            "title": title,
            "object_title": "Intro to Rust",
            "time": "2024-05-01T10:00:00Z"
        }))
        .expect("valid notification fixture")
    }

    pub fn video(id: &str, duration: f64, cutoff: f64) -> WatchRecord {
        WatchRecord::new(id, Some(duration), cutoff)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    use super::*;

    /// Ids of every cached item of an entry, in page order.
    pub fn cached_ids(cache: &InfiniteCache, key: &CacheKey) -> Vec<RecordId> {
        cache
            .entry(key)
            .expect("cache readable")
            .map(|entry| {
                entry
                    .pages()
                    .iter()
                    .flat_map(|p| p.items.iter().filter_map(Record::id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn cached_total(cache: &InfiniteCache, key: &CacheKey) -> u64 {
        cache
            .entry(key)
            .expect("cache readable")
            .map(|entry| entry.total())
            .unwrap_or(0)
    }

    pub fn cached_item(cache: &InfiniteCache, key: &CacheKey, id: &RecordId) -> Option<Record> {
        cache.entry(key).expect("cache readable").and_then(|entry| {
            entry
                .pages()
                .iter()
                .flat_map(|p| p.items.iter())
                .find(|item| item.id().as_ref() == Some(id))
                .cloned()
        })
    }
}
