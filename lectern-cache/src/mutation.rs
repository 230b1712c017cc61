//! Optimistic mutations applied to cached pages.
//!
//! A [`CacheUpdate`] names which lists to scan ([`MutationTarget`]), what to
//! apply to matching items ([`Change`]) and how ([`Mutation`]). The functions
//! at the bottom of this module do the per-entry work; fan-out across
//! entries lives in [`crate::InfiniteCache::apply`].

use crate::key::CacheKey;
use lectern_core::{Page, Record, ResourceKind, ServiceId};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create,
    Update,
    Delete,
}

/// Which cached lists a mutation scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationTarget {
    /// Every cached query of one list service.
    Service(ServiceId),
    /// Every cached query of every service listing this kind.
    Kind(ResourceKind),
}

impl MutationTarget {
    pub fn kind(&self) -> ResourceKind {
        match self {
            MutationTarget::Service(service) => service.kind(),
            MutationTarget::Kind(kind) => *kind,
        }
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        match self {
            MutationTarget::Service(service) => key.service() == service,
            MutationTarget::Kind(kind) => key.kind() == *kind,
        }
    }
}

/// Closure deciding, per item, which fields to merge. `None` skips the item.
pub type Updater = Arc<dyn Fn(&Record) -> Option<Record> + Send + Sync>;

/// What to apply to matching items.
#[derive(Clone)]
pub enum Change {
    /// A partial record matched by id.
    Record(Record),
    /// A conditional updater called on every candidate item.
    Updater(Updater),
}

impl Change {
    pub fn updater<F>(f: F) -> Self
    where
        F: Fn(&Record) -> Option<Record> + Send + Sync + 'static,
    {
        Change::Updater(Arc::new(f))
    }

    /// Fields to merge into `item`, if it is matched.
    pub fn patch_for(&self, item: &Record) -> Option<Record> {
        match self {
            Change::Record(record) => record.same_id(item).then(|| record.clone()),
            Change::Updater(f) => f(item),
        }
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Change::Record(record) => Some(record),
            Change::Updater(_) => None,
        }
    }

    /// Whether `parent` may hold the nested item this change targets.
    fn may_contain(&self, parent: &Record) -> bool {
        match self.record().and_then(Record::parent_id) {
            Some(parent_id) => parent.id().as_ref() == Some(&parent_id),
            None => true,
        }
    }
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Record(record) => f.debug_tuple("Record").field(record).finish(),
            Change::Updater(_) => f.write_str("Updater(..)"),
        }
    }
}

impl From<Record> for Change {
    fn from(record: Record) -> Self {
        Change::Record(record)
    }
}

/// One optimistic write.
#[derive(Debug, Clone)]
pub struct CacheUpdate {
    pub target: MutationTarget,
    pub change: Change,
    pub mutation: Mutation,
    /// Apply inside this nested collection of the matched items instead of
    /// the top-level list.
    pub nested_field: Option<String>,
    /// On update, relocate the matched item to the head of its list.
    pub move_to_top: bool,
}

impl CacheUpdate {
    pub fn new(target: MutationTarget, change: impl Into<Change>, mutation: Mutation) -> Self {
        Self {
            target,
            change: change.into(),
            mutation,
            nested_field: None,
            move_to_top: false,
        }
    }

    pub fn create(target: MutationTarget, record: Record) -> Self {
        Self::new(target, record, Mutation::Create)
    }

    pub fn update(target: MutationTarget, change: impl Into<Change>) -> Self {
        Self::new(target, change, Mutation::Update)
    }

    pub fn delete(target: MutationTarget, change: impl Into<Change>) -> Self {
        Self::new(target, change, Mutation::Delete)
    }

    pub fn nested(mut self, field: impl Into<String>) -> Self {
        self.nested_field = Some(field.into());
        self
    }

    pub fn move_to_top(mut self) -> Self {
        self.move_to_top = true;
        self
    }
}

/// What an update touched. All zeros means the call was a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub entries_touched: usize,
    pub items_touched: usize,
}

impl MutationReport {
    pub fn is_noop(&self) -> bool {
        self.items_touched == 0
    }

    pub(crate) fn record_entry(&mut self, items: usize) {
        if items > 0 {
            self.entries_touched += 1;
            self.items_touched += items;
        }
    }
}

/// Apply one update to the pages of a single entry. Returns items touched.
pub(crate) fn apply_to_pages(update: &CacheUpdate, pages: &mut [Page]) -> usize {
    let change = &update.change;
    match (update.mutation, update.nested_field.as_deref()) {
        (Mutation::Create, None) => change.record().map_or(0, |r| create_top(pages, r)),
        (Mutation::Create, Some(field)) => {
            change.record().map_or(0, |r| create_nested(pages, field, r))
        }
        (Mutation::Update, None) => update_top(pages, change, update.move_to_top),
        (Mutation::Update, Some(field)) => update_nested(pages, field, change, update.move_to_top),
        (Mutation::Delete, None) => delete_top(pages, change),
        (Mutation::Delete, Some(field)) => delete_nested(pages, field, change),
    }
}

/// Prepend into the first page. Skipped when the id is already listed.
pub(crate) fn create_top(pages: &mut [Page], record: &Record) -> usize {
    let Some(id) = record.id() else {
        return 0;
    };
    if pages.is_empty() || pages.iter().any(|page| page.contains(&id)) {
        return 0;
    }
    pages[0].items.insert(0, record.clone());
    for page in pages.iter_mut() {
        page.total += 1;
    }
    1
}

pub(crate) fn update_top(pages: &mut [Page], change: &Change, move_to_top: bool) -> usize {
    let mut hits = Vec::new();
    for (page_index, page) in pages.iter_mut().enumerate() {
        for (item_index, item) in page.items.iter_mut().enumerate() {
            if let Some(patch) = change.patch_for(item) {
                item.merge(&patch);
                hits.push((page_index, item_index));
            }
        }
    }
    if move_to_top && !hits.is_empty() {
        let moved: Vec<Record> = hits
            .iter()
            .rev()
            .map(|&(page_index, item_index)| pages[page_index].items.remove(item_index))
            .collect();
        for item in moved {
            pages[0].items.insert(0, item);
        }
    }
    hits.len()
}

pub(crate) fn delete_top(pages: &mut [Page], change: &Change) -> usize {
    let mut removed = 0;
    for page in pages.iter_mut() {
        let before = page.items.len();
        page.items.retain(|item| change.patch_for(item).is_none());
        removed += before - page.items.len();
    }
    if removed > 0 {
        for page in pages.iter_mut() {
            page.total = page.total.saturating_sub(removed as u64);
        }
    }
    removed
}

/// Prepend into the nested collection of the record's parent.
pub(crate) fn create_nested(pages: &mut [Page], field: &str, record: &Record) -> usize {
    let (Some(id), Some(parent_id)) = (record.id(), record.parent_id()) else {
        return 0;
    };
    let mut touched = 0;
    for page in pages.iter_mut() {
        for parent in page.items.iter_mut() {
            if parent.id().as_ref() != Some(&parent_id) {
                continue;
            }
            let mut children = match parent.get(field) {
                None => Vec::new(),
                Some(value) if value.is_null() => Vec::new(),
                Some(_) => match parent.nested(field) {
                    Some(children) => children,
                    // present but not a list of records
                    None => continue,
                },
            };
            if children.iter().any(|child| child.id().as_ref() == Some(&id)) {
                continue;
            }
            children.insert(0, record.clone());
            parent.set_nested(field, children);
            touched += 1;
        }
    }
    touched
}

pub(crate) fn update_nested(
    pages: &mut [Page],
    field: &str,
    change: &Change,
    move_to_top: bool,
) -> usize {
    let mut touched = 0;
    for page in pages.iter_mut() {
        for parent in page.items.iter_mut() {
            if !change.may_contain(parent) {
                continue;
            }
            let Some(mut children) = parent.nested(field) else {
                continue;
            };
            let mut hits = Vec::new();
            for (index, child) in children.iter_mut().enumerate() {
                if let Some(patch) = change.patch_for(child) {
                    child.merge(&patch);
                    hits.push(index);
                }
            }
            if hits.is_empty() {
                continue;
            }
            if move_to_top {
                move_to_front(&mut children, &hits);
            }
            touched += hits.len();
            parent.set_nested(field, children);
        }
    }
    touched
}

pub(crate) fn delete_nested(pages: &mut [Page], field: &str, change: &Change) -> usize {
    let mut touched = 0;
    for page in pages.iter_mut() {
        for parent in page.items.iter_mut() {
            if !change.may_contain(parent) {
                continue;
            }
            let Some(mut children) = parent.nested(field) else {
                continue;
            };
            let before = children.len();
            children.retain(|child| change.patch_for(child).is_none());
            let removed = before - children.len();
            if removed > 0 {
                touched += removed;
                parent.set_nested(field, children);
            }
        }
    }
    touched
}

/// Move the items at `indices` (ascending) to the front, keeping their
/// relative order and the order of everything else.
fn move_to_front(items: &mut Vec<Record>, indices: &[usize]) {
    let moved: Vec<Record> = indices.iter().rev().map(|&i| items.remove(i)).collect();
    for item in moved {
        items.insert(0, item);
    }
}
