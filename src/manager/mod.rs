//! QueryManager - normalized items plus a per-query index of result IDs.
//!
//! A manager owns the items of one collection (site) and remembers, for
//! every query it has been told about, the ordered IDs the server returned
//! and the total `found` count. Pages are stored positionally inside one
//! record per query (pagination stripped); unfetched slots inside a known
//! range are `None` placeholders.
//!
//! Managers are values: every transition returns a new manager and leaves
//! the receiver untouched. Both indexes sit behind `Arc`s and items are
//! individually `Arc`ed, so unchanged parts are shared between versions.
//!
//! ## Example
//!
//! ```ignore
//! use entity_query_cache::{ManagerOptions, Query, QueryManager, ReceiveOptions};
//!
//! let manager = QueryManager::<Theme>::new(ManagerOptions::default());
//! let query = Query::new().with_search("Ribs").with_number(1).with_page(3);
//! let manager = manager.receive(page_three, ReceiveOptions::for_query(query.clone()).found(4));
//!
//! assert_eq!(manager.get_items(&query).map(|items| items.len()), Some(1));
//! assert_eq!(manager.get_number_of_pages(&query), Some(4));
//! ```

mod matcher;
mod persisted;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::edits::merge_ignoring_arrays;
use crate::error::CacheError;
use crate::item::{Item, ItemId};
use crate::query::{Query, QueryDefaults, QueryKey};

pub use matcher::{AttributeMatcher, QueryMatcher};
pub use persisted::PersistedManager;

/// Slots a record may grow to before far pages stop being recorded.
pub const DEFAULT_MAX_SLOTS: usize = 100_000;

/// Configuration shared by every manager of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    /// Declared default query values.
    pub defaults: QueryDefaults,
    /// Upper bound on a record's length. A page starting at or past it is
    /// still received (its items are stored) but not recorded in the query.
    pub max_slots: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            defaults: QueryDefaults::standard(),
            max_slots: DEFAULT_MAX_SLOTS,
        }
    }
}

/// Result record of one (pagination-stripped) query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Item IDs in receipt order; `None` marks a known but unfetched slot.
    pub item_keys: Vec<Option<ItemId>>,
    /// Total matches across all pages, once reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<u64>,
}

impl QueryResult {
    pub fn has_placeholders(&self) -> bool {
        self.item_keys.iter().any(Option::is_none)
    }

    /// Whether every result of the query is listed: no gaps, and nothing
    /// left to fetch past the end.
    pub fn is_complete(&self) -> bool {
        !self.has_placeholders()
            && self
                .found
                .map_or(true, |found| self.item_keys.len() as u64 >= found)
    }

    fn remove_key(&mut self, id: &ItemId) -> bool {
        let before = self.item_keys.len();
        self.item_keys.retain(|key| key.as_ref() != Some(id));
        let removed = (before - self.item_keys.len()) as u64;
        if removed > 0 {
            self.found = self.found.map(|found| found.saturating_sub(removed));
        }
        removed > 0
    }
}

/// Origin of a batch of received items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiveOptions {
    /// The query whose response delivered the items, if any.
    pub query: Option<Query>,
    /// The server-reported total for that query.
    pub found: Option<u64>,
}

impl ReceiveOptions {
    pub fn for_query(query: Query) -> Self {
        ReceiveOptions {
            query: Some(query),
            found: None,
        }
    }

    pub fn found(mut self, found: u64) -> Self {
        self.found = Some(found);
        self
    }
}

type ItemsIndex<T> = HashMap<ItemId, Arc<T>>;
type QueriesIndex = HashMap<String, QueryResult>;

/// Normalized item store and query index for one collection.
pub struct QueryManager<T: Item> {
    items: Arc<ItemsIndex<T>>,
    queries: Arc<QueriesIndex>,
    options: Arc<ManagerOptions>,
    matcher: Option<Arc<dyn QueryMatcher<T>>>,
}

impl<T: Item> Clone for QueryManager<T> {
    fn clone(&self) -> Self {
        QueryManager {
            items: Arc::clone(&self.items),
            queries: Arc::clone(&self.queries),
            options: Arc::clone(&self.options),
            matcher: self.matcher.clone(),
        }
    }
}

impl<T: Item> fmt::Debug for QueryManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryManager")
            .field("items", &self.items.len())
            .field("queries", &self.queries.len())
            .field("options", &self.options)
            .field("matcher", &self.matcher.is_some())
            .finish()
    }
}

impl<T: Item> Default for QueryManager<T> {
    fn default() -> Self {
        Self::new(ManagerOptions::default())
    }
}

impl<T: Item> QueryManager<T> {
    /// Create an empty manager.
    pub fn new(options: ManagerOptions) -> Self {
        QueryManager {
            items: Arc::new(HashMap::new()),
            queries: Arc::new(HashMap::new()),
            options: Arc::new(options),
            matcher: None,
        }
    }

    /// Attach a matcher so that query-less receives update known queries.
    pub fn with_matcher(mut self, matcher: Arc<dyn QueryMatcher<T>>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Whether both managers share the same item and query indexes.
    ///
    /// A transition that changed nothing returns a manager that is
    /// `ptr_eq` to its receiver.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items) && Arc::ptr_eq(&self.queries, &other.queries)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.queries.is_empty()
    }

    fn query_key(&self) -> QueryKey<'_> {
        QueryKey::new(&self.options.defaults)
    }

    fn record(&self, query: &Query) -> Option<&QueryResult> {
        let key = self.query_key().serialize_without_pagination(query, None);
        self.queries.get(&key)
    }

    /// Slot range `[offset, offset + number)` of the page `query` asks for.
    fn page_bounds(&self, query: &Query) -> (usize, usize) {
        let defaults = &self.options.defaults;
        let number = defaults.number_of(query);
        let offset = (defaults.page_of(query) - 1).saturating_mul(number);
        (to_usize(offset), to_usize(number))
    }

    fn with_indexes(&self, items: Arc<ItemsIndex<T>>, queries: Arc<QueriesIndex>) -> Self {
        QueryManager {
            items,
            queries,
            options: Arc::clone(&self.options),
            matcher: self.matcher.clone(),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Merge a batch of received items, optionally tied to the query (and
    /// `found` total) whose response delivered them.
    ///
    /// Items equal to the stored version keep their stored `Arc`.
    pub fn receive<I>(&self, items: I, options: ReceiveOptions) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut next_items: Option<ItemsIndex<T>> = None;
        let mut received_ids = Vec::new();

        for item in items {
            let id = item.id();
            received_ids.push(id.clone());

            if self.items.get(&id).is_some_and(|stored| **stored == item) {
                continue;
            }
            next_items
                .get_or_insert_with(|| (*self.items).clone())
                .insert(id, Arc::new(item));
        }

        let items_changed = next_items.is_some();
        let items = match next_items {
            Some(items) => Arc::new(items),
            None => Arc::clone(&self.items),
        };

        let next_queries = match &options.query {
            Some(query) => self.receive_page(query, &received_ids, options.found),
            None => self.apply_matcher(&items, &received_ids),
        };

        tracing::debug!(
            received = received_ids.len(),
            items_changed,
            queries_changed = next_queries.is_some(),
            query = ?options.query,
            found = ?options.found,
            "query manager received items"
        );

        let queries = match next_queries {
            Some(queries) => Arc::new(queries),
            None => Arc::clone(&self.queries),
        };
        self.with_indexes(items, queries)
    }

    /// Write one page of IDs into the query's record. `None` when the record
    /// would not change.
    fn receive_page(
        &self,
        query: &Query,
        ids: &[ItemId],
        found: Option<u64>,
    ) -> Option<QueriesIndex> {
        let key = self.query_key().serialize_without_pagination(query, None);
        let current = self.queries.get(&key);
        let mut record = current.cloned().unwrap_or_default();
        let (offset, number) = self.page_bounds(query);

        if found.is_some() {
            record.found = found;
        }
        let total = record.found.map(to_usize);
        let keys = &mut record.item_keys;

        let recordable = match total {
            // The whole page lies past the result set.
            Some(total) if offset >= total && offset > 0 => false,
            // Without a total, a page past the known prefix has no anchor.
            None if offset > keys.len() => false,
            _ => offset < self.options.max_slots,
        };

        if recordable {
            if keys.len() < offset {
                keys.resize(offset, None);
            }
            let page_end = offset.saturating_add(number).min(keys.len());
            keys.splice(offset..page_end, ids.iter().cloned().map(Some));

            let received_end = offset.saturating_add(ids.len());
            match total {
                Some(total) => keys.truncate(total.max(received_end)),
                // A short page without a total is the last page.
                None if ids.len() < number => keys.truncate(received_end),
                None => {}
            }
        } else {
            tracing::debug!(
                key = %key,
                offset,
                known = keys.len(),
                "page outside the recordable range; items stored without positions"
            );
            // Nothing to note about a query seen only through such a page.
            if current.is_none() && total.is_none() {
                return None;
            }
            if let Some(total) = total {
                keys.truncate(total);
            }
        }

        if current == Some(&record) {
            return None;
        }

        let mut queries = (*self.queries).clone();
        queries.insert(key, record);
        Some(queries)
    }

    /// Re-evaluate every known query for items received without a query.
    fn apply_matcher(&self, items: &ItemsIndex<T>, ids: &[ItemId]) -> Option<QueriesIndex> {
        let matcher = self.matcher.as_ref()?;
        if ids.is_empty() || self.queries.is_empty() {
            return None;
        }

        let defaults = &self.options.defaults;
        let mut next: Option<QueriesIndex> = None;

        for (key, record) in self.queries.iter() {
            let Some(query) = QueryKey::deserialize(key).query else {
                continue;
            };
            let query = defaults.resolve(&query);
            // Partially fetched records keep their slot positions: they
            // only lose items that stopped matching.
            let insertable = record.is_complete();
            let mut updated = record.clone();
            let mut needs_sort = false;

            for id in ids {
                let Some(item) = items.get(id) else {
                    continue;
                };
                let listed = updated.item_keys.iter().any(|k| k.as_ref() == Some(id));
                let is_match = matcher.matches(&query, item);

                if listed && !is_match {
                    updated.remove_key(id);
                } else if !listed && is_match && insertable {
                    updated.item_keys.push(Some(id.clone()));
                    updated.found = updated.found.map(|found| found + 1);
                    needs_sort = true;
                }
            }

            if needs_sort {
                let lookup = |key: &Option<ItemId>| key.as_ref().and_then(|id| items.get(id));
                updated.item_keys.sort_by(|a, b| match (lookup(a), lookup(b)) {
                    (Some(a), Some(b)) => matcher.compare(&query, a, b),
                    _ => std::cmp::Ordering::Equal,
                });
            }

            if updated != *record {
                next.get_or_insert_with(|| (*self.queries).clone())
                    .insert(key.clone(), updated);
            }
        }

        next
    }

    /// Forget an item and every reference to it in query results.
    pub fn remove_item(&self, id: &ItemId) -> Self {
        let items = if self.items.contains_key(id) {
            let mut items = (*self.items).clone();
            items.remove(id);
            Arc::new(items)
        } else {
            Arc::clone(&self.items)
        };

        let mut next_queries: Option<QueriesIndex> = None;
        for (key, record) in self.queries.iter() {
            let mut updated = record.clone();
            if updated.remove_key(id) {
                next_queries
                    .get_or_insert_with(|| (*self.queries).clone())
                    .insert(key.clone(), updated);
            }
        }

        let queries = match next_queries {
            Some(queries) => Arc::new(queries),
            None => Arc::clone(&self.queries),
        };

        tracing::debug!(%id, "query manager removed item");
        self.with_indexes(items, queries)
    }

    /// Merge a partial attribute object into a stored item.
    ///
    /// Arrays in `attributes` replace the stored arrays. The merged value
    /// must still deserialize as `T`.
    pub fn patch_item(&self, id: &ItemId, attributes: &Map<String, Value>) -> Result<Self, CacheError> {
        let stored = self
            .items
            .get(id)
            .ok_or_else(|| CacheError::UnknownItem(id.clone()))?;

        let current = serde_json::to_value(stored.as_ref())?;
        let merged = merge_ignoring_arrays(&current, &Value::Object(attributes.clone()));
        let patched: T = serde_json::from_value(merged)?;

        Ok(self.receive([patched], ReceiveOptions::default()))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The item stored under `id`.
    pub fn get_item(&self, id: &ItemId) -> Option<Arc<T>> {
        self.items.get(id).cloned()
    }

    /// Every stored item, ordered by ID.
    pub fn get_all_items(&self) -> Vec<Arc<T>> {
        let mut entries: Vec<(&ItemId, &Arc<T>)> = self.items.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, item)| Arc::clone(item)).collect()
    }

    /// Items of the exact page `query` asks for.
    ///
    /// `None` if the query is unknown, or if any slot of the page is not
    /// fetched yet: a page is either complete or absent. A page past a
    /// known total is empty.
    pub fn get_items(&self, query: &Query) -> Option<Vec<Arc<T>>> {
        let record = self.record(query)?;
        let (offset, number) = self.page_bounds(query);
        let len = record.item_keys.len();
        let page_end = offset.saturating_add(number);

        let end = match record.found.map(to_usize) {
            Some(total) if offset >= total => return Some(Vec::new()),
            Some(total) => {
                let end = page_end.min(total);
                if len < end {
                    return None;
                }
                end
            }
            None => page_end.min(len),
        };
        let start = offset.min(end);
        self.resolve(&record.item_keys[start..end])
    }

    /// Items of every known page of `query`, in receipt order.
    ///
    /// `None` if the query is unknown or any page is still missing.
    pub fn get_items_ignoring_page(&self, query: &Query) -> Option<Vec<Arc<T>>> {
        let record = self.record(query)?;
        if !record.is_complete() {
            return None;
        }
        self.resolve(&record.item_keys)
    }

    /// Like [`get_items_ignoring_page`](Self::get_items_ignoring_page), but
    /// unfetched slots are skipped instead of voiding the result.
    pub fn get_known_items_ignoring_page(&self, query: &Query) -> Option<Vec<Arc<T>>> {
        let record = self.record(query)?;
        Some(
            record
                .item_keys
                .iter()
                .flatten()
                .filter_map(|id| self.items.get(id).cloned())
                .collect(),
        )
    }

    /// Last reported total for `query`, page ignored.
    pub fn get_found(&self, query: &Query) -> Option<u64> {
        self.record(query)?.found
    }

    /// Number of pages at `query`'s page size; at least 1 once `found` is
    /// known.
    pub fn get_number_of_pages(&self, query: &Query) -> Option<u64> {
        let found = self.get_found(query)?;
        let number = self.options.defaults.number_of(query);
        Some(found.div_ceil(number).max(1))
    }

    /// Whether `query`'s page is the last one.
    pub fn is_last_page(&self, query: &Query) -> Option<bool> {
        let pages = self.get_number_of_pages(query)?;
        Some(pages == self.options.defaults.page_of(query))
    }

    fn resolve(&self, keys: &[Option<ItemId>]) -> Option<Vec<Arc<T>>> {
        keys.iter()
            .map(|key| key.as_ref().and_then(|id| self.items.get(id).cloned()))
            .collect()
    }
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
