//! Selectors - read-only views over [`EntityState`].
//!
//! List selectors return `Arc`ed slices; [`SelectorCache`] hands back the
//! same `Arc` for as long as the collection's manager is unchanged.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::EntityState;
use crate::edits::{edited_item, edited_value, EditTarget};
use crate::item::{CollectionKey, Item, ItemId};
use crate::manager::QueryManager;
use crate::query::{Query, QueryKey};

/// Items of one query, in result order.
pub type ItemList<T> = Arc<[Arc<T>]>;

/// The item known under a cross-collection ID.
pub fn get_item_by_global_id<T: Item>(state: &EntityState<T>, global_id: &str) -> Option<Arc<T>> {
    let path = state.path(global_id)?;
    get_collection_item(state, &path.collection, &path.id)
}

/// Every item of `collection`, ordered by ID.
pub fn get_collection_items<T: Item>(state: &EntityState<T>, collection: &CollectionKey) -> Vec<Arc<T>> {
    state
        .manager(collection)
        .map(QueryManager::get_all_items)
        .unwrap_or_default()
}

pub fn get_collection_item<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    id: &ItemId,
) -> Option<Arc<T>> {
    state.manager(collection)?.get_item(id)
}

/// Items of the exact page `query` asks for; `None` until that page is
/// fully known.
pub fn get_items_for_query<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    query: &Query,
) -> Option<ItemList<T>> {
    state
        .manager(collection)?
        .get_items(query)
        .map(ItemList::from)
}

/// Items of every page of `query`; `None` while any page is missing.
pub fn get_items_for_query_ignoring_page<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    query: &Query,
) -> Option<ItemList<T>> {
    state
        .manager(collection)?
        .get_items_ignoring_page(query)
        .map(ItemList::from)
}

pub fn is_requesting_items_for_query<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    query: &Query,
) -> bool {
    let key = state.request_key(collection, query);
    state.query_requests.get(&key).copied().unwrap_or(false)
}

/// Whether a request for any page of `query` is in flight.
pub fn is_requesting_items_for_query_ignoring_page<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    query: &Query,
) -> bool {
    let key = QueryKey::new(&state.config.manager.defaults);
    let wanted = key.serialize_without_pagination(query, Some(collection));

    state
        .query_requests
        .iter()
        .filter(|(_, requesting)| **requesting)
        .any(|(serialized, _)| {
            let details = QueryKey::deserialize(serialized);
            match (details.collection_key, details.query) {
                (Some(requested_collection), Some(requested)) => {
                    key.serialize_without_pagination(&requested, Some(&requested_collection)) == wanted
                }
                _ => false,
            }
        })
}

pub fn get_found_for_query<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    query: &Query,
) -> Option<u64> {
    state.manager(collection)?.get_found(query)
}

/// Number of the last page at `query`'s page size.
pub fn get_last_page_for_query<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    query: &Query,
) -> Option<u64> {
    state.manager(collection)?.get_number_of_pages(query)
}

pub fn is_last_page_for_query<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    query: &Query,
) -> Option<bool> {
    state.manager(collection)?.is_last_page(query)
}

pub fn is_requesting_item<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    id: &ItemId,
) -> bool {
    state
        .item_requests
        .get(collection)
        .and_then(|flags| flags.get(id))
        .copied()
        .unwrap_or(false)
}

/// Unsaved edits of an item, or of the new draft when `target` is `None`.
pub fn get_item_edits<'a, T: Item>(
    state: &'a EntityState<T>,
    collection: &CollectionKey,
    target: &EditTarget,
) -> Option<&'a Map<String, Value>> {
    state.edits_for(collection, target)
}

fn canonical_value<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    target: &EditTarget,
) -> Option<Value> {
    let id = target.as_ref()?;
    let item = get_collection_item(state, collection, id)?;
    serde_json::to_value(item.as_ref()).ok()
}

/// The item as it would look once saved: canonical data with edits merged
/// over it, arrays replaced.
pub fn get_edited_item<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    target: &EditTarget,
) -> Option<Value> {
    let canonical = canonical_value(state, collection, target);
    edited_item(canonical.as_ref(), get_item_edits(state, collection, target))
}

/// One attribute of the edited item, addressed by a dotted path.
pub fn get_edited_item_value<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    target: &EditTarget,
    path: &str,
) -> Option<Value> {
    let item = get_edited_item(state, collection, target)?;
    edited_value(&item, path).cloned()
}

/// Whether saving the edits would change the item.
pub fn is_edited_item_dirty<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    target: &EditTarget,
) -> bool {
    let canonical = canonical_value(state, collection, target);
    state
        .config
        .edits
        .is_dirty(canonical.as_ref(), get_item_edits(state, collection, target))
}

// ============================================================================
// Memoization
// ============================================================================

type CacheKey = (CollectionKey, String);

struct Memo<T: Item> {
    manager: QueryManager<T>,
    items: Option<ItemList<T>>,
}

/// Memoizes the two list selectors per collection and query.
///
/// An entry is valid while the collection's manager is the one it was
/// computed from; a new manager recomputes just that entry.
pub struct SelectorCache<T: Item> {
    pages: RwLock<HashMap<CacheKey, Memo<T>>>,
    all_pages: RwLock<HashMap<CacheKey, Memo<T>>>,
}

impl<T: Item> Default for SelectorCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Item> SelectorCache<T> {
    pub fn new() -> Self {
        SelectorCache {
            pages: RwLock::new(HashMap::new()),
            all_pages: RwLock::new(HashMap::new()),
        }
    }

    /// Memoized [`get_items_for_query`].
    pub fn items_for_query(
        &self,
        state: &EntityState<T>,
        collection: &CollectionKey,
        query: &Query,
    ) -> Option<ItemList<T>> {
        let key = QueryKey::new(&state.config.manager.defaults).serialize(query, None);
        self.memoized(&self.pages, state, collection, key, || {
            get_items_for_query(state, collection, query)
        })
    }

    /// Memoized [`get_items_for_query_ignoring_page`].
    pub fn items_for_query_ignoring_page(
        &self,
        state: &EntityState<T>,
        collection: &CollectionKey,
        query: &Query,
    ) -> Option<ItemList<T>> {
        let key =
            QueryKey::new(&state.config.manager.defaults).serialize_without_pagination(query, None);
        self.memoized(&self.all_pages, state, collection, key, || {
            get_items_for_query_ignoring_page(state, collection, query)
        })
    }

    /// Drop every memoized result.
    pub fn clear(&self) {
        for memos in [&self.pages, &self.all_pages] {
            if let Ok(mut memos) = memos.write() {
                memos.clear();
            }
        }
    }

    /// Number of memoized results.
    pub fn len(&self) -> usize {
        [&self.pages, &self.all_pages]
            .iter()
            .filter_map(|memos| memos.read().ok().map(|memos| memos.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entries of `collection` computed from any manager other
    /// than `current`.
    fn evict_stale(&self, collection: &CollectionKey, current: Option<&QueryManager<T>>) {
        for memos in [&self.pages, &self.all_pages] {
            if let Ok(mut memos) = memos.write() {
                memos.retain(|(memo_collection, _), memo| {
                    memo_collection != collection
                        || current.is_some_and(|manager| memo.manager.ptr_eq(manager))
                });
            }
        }
    }

    fn memoized<F>(
        &self,
        memos: &RwLock<HashMap<CacheKey, Memo<T>>>,
        state: &EntityState<T>,
        collection: &CollectionKey,
        query_key: String,
        compute: F,
    ) -> Option<ItemList<T>>
    where
        F: FnOnce() -> Option<ItemList<T>>,
    {
        let Some(manager) = state.manager(collection) else {
            self.evict_stale(collection, None);
            return None;
        };
        let key = (collection.clone(), query_key);

        if let Ok(memos) = memos.read() {
            if let Some(memo) = memos.get(&key) {
                if memo.manager.ptr_eq(manager) {
                    tracing::trace!(%collection, query = %key.1, "selector cache hit");
                    return memo.items.clone();
                }
            }
        }

        tracing::trace!(%collection, query = %key.1, "selector cache miss");
        self.evict_stale(collection, Some(manager));
        let items = compute();
        // A poisoned lock only costs the memo.
        if let Ok(mut memos) = memos.write() {
            memos.insert(
                key,
                Memo {
                    manager: manager.clone(),
                    items: items.clone(),
                },
            );
        }
        items
    }
}
