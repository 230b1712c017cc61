//! One cached list: its query, pages and freshness bookkeeping.

use crate::key::{CacheKey, ListQuery};
use chrono::{DateTime, Utc};
use lectern_core::Page;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    query: ListQuery,
    pages: Vec<Page>,
    /// When the list head (page 0) was last fetched.
    fetched_at: Option<DateTime<Utc>>,
    /// When the first optimistic write since the last fetch was applied.
    optimistic_since: Option<DateTime<Utc>>,
    /// The server answered the last page short. Set only from fetched pages.
    server_exhausted: bool,
}

impl CacheEntry {
    pub fn new(query: ListQuery) -> Self {
        Self {
            query,
            pages: Vec::new(),
            fetched_at: None,
            optimistic_since: None,
            server_exhausted: false,
        }
    }

    pub fn key(&self) -> CacheKey {
        self.query.key()
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub(crate) fn pages_mut(&mut self) -> &mut [Page] {
        &mut self.pages
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn optimistic_since(&self) -> Option<DateTime<Utc>> {
        self.optimistic_since
    }

    pub fn is_optimistic(&self) -> bool {
        self.optimistic_since.is_some()
    }

    /// Total as reported by the server, adjusted by optimistic writes.
    pub fn total(&self) -> u64 {
        self.pages.first().map(|p| p.total).unwrap_or(0)
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    /// Whether the loaded pages already cover the whole list.
    ///
    /// Page lengths are only trusted as fetched: optimistic deletes and
    /// moves shorten pages without the server list ending.
    pub fn is_exhausted(&self) -> bool {
        !self.pages.is_empty()
            && (self.server_exhausted || self.item_count() as u64 >= self.total())
    }

    fn is_short(&self, page: &Page) -> bool {
        (page.len() as u64) < self.query.page_size
    }

    /// Store a fetched page at `index`. Replaces an existing page or appends
    /// the next one; a page beyond the next index is rejected.
    pub(crate) fn store_page(&mut self, index: usize, page: Page, now: DateTime<Utc>) -> bool {
        if index > self.pages.len() {
            return false;
        }
        if index + 1 >= self.pages.len() {
            self.server_exhausted = self.is_short(&page);
        }
        if index < self.pages.len() {
            self.pages[index] = page;
        } else {
            self.pages.push(page);
        }
        if index == 0 || self.fetched_at.is_none() {
            self.fetched_at = Some(now);
        }
        true
    }

    /// Replace every page after a full refetch.
    pub(crate) fn replace_pages(&mut self, pages: Vec<Page>, now: DateTime<Utc>) {
        self.server_exhausted = pages.last().is_some_and(|last| self.is_short(last));
        self.pages = pages;
        self.fetched_at = Some(now);
        self.optimistic_since = None;
    }

    pub(crate) fn mark_optimistic(&mut self, now: DateTime<Utc>) {
        if self.optimistic_since.is_none() {
            self.optimistic_since = Some(now);
        }
    }
}
