//! Entity state - every collection's query manager plus request flags and
//! unsaved edits, advanced by a pure reducer.
//!
//! ```ignore
//! let state = EntityState::<Theme>::new(StateConfig::default());
//! let state = reduce(&state, &EntityAction::ItemsRequest { collection, query });
//! ```
//!
//! Each field sits behind an `Arc`; a field the action does not touch is
//! shared with the previous state, so [`EntityState::ptr_eq`] tells whether
//! an action changed anything.

mod action;
mod persist;
pub mod selectors;

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::edits::{merge_into, EditPolicy, EditTarget};
use crate::item::{CollectionKey, Item, ItemId, ItemPath};
use crate::manager::{ManagerOptions, QueryManager, QueryMatcher, ReceiveOptions};
use crate::query::{Query, QueryKey};

pub use action::EntityAction;
pub use persist::PersistedState;
pub use selectors::SelectorCache;

type Managers<T> = HashMap<CollectionKey, QueryManager<T>>;
type ItemRequests = HashMap<CollectionKey, HashMap<ItemId, bool>>;
type Edits = HashMap<CollectionKey, HashMap<EditTarget, Map<String, Value>>>;

/// Configuration applied to every collection of an entity type.
pub struct StateConfig<T: Item> {
    pub manager: ManagerOptions,
    pub edits: EditPolicy,
    /// Attached to every manager the state creates or restores.
    pub matcher: Option<Arc<dyn QueryMatcher<T>>>,
}

impl<T: Item> StateConfig<T> {
    pub fn new(manager: ManagerOptions, edits: EditPolicy) -> Self {
        StateConfig {
            manager,
            edits,
            matcher: None,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn QueryMatcher<T>>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    fn attach(&self, manager: QueryManager<T>) -> QueryManager<T> {
        match &self.matcher {
            Some(matcher) => manager.with_matcher(Arc::clone(matcher)),
            None => manager,
        }
    }

    fn new_manager(&self) -> QueryManager<T> {
        self.attach(QueryManager::new(self.manager.clone()))
    }
}

impl<T: Item> Default for StateConfig<T> {
    fn default() -> Self {
        StateConfig::new(ManagerOptions::default(), EditPolicy::standard())
    }
}

impl<T: Item> Clone for StateConfig<T> {
    fn clone(&self) -> Self {
        StateConfig {
            manager: self.manager.clone(),
            edits: self.edits.clone(),
            matcher: self.matcher.clone(),
        }
    }
}

impl<T: Item> fmt::Debug for StateConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateConfig")
            .field("manager", &self.manager)
            .field("edits", &self.edits)
            .field("matcher", &self.matcher.is_some())
            .finish()
    }
}

/// Immutable snapshot of all entities of one type.
pub struct EntityState<T: Item> {
    /// Global ID to item location.
    paths: Arc<HashMap<String, ItemPath>>,
    queries: Arc<Managers<T>>,
    /// Collection-prefixed serialized query to in-flight flag.
    query_requests: Arc<HashMap<String, bool>>,
    item_requests: Arc<ItemRequests>,
    edits: Arc<Edits>,
    config: Arc<StateConfig<T>>,
}

impl<T: Item> Clone for EntityState<T> {
    fn clone(&self) -> Self {
        EntityState {
            paths: Arc::clone(&self.paths),
            queries: Arc::clone(&self.queries),
            query_requests: Arc::clone(&self.query_requests),
            item_requests: Arc::clone(&self.item_requests),
            edits: Arc::clone(&self.edits),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T: Item> fmt::Debug for EntityState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityState")
            .field("paths", &self.paths.len())
            .field("queries", &self.queries)
            .field("query_requests", &self.query_requests)
            .field("item_requests", &self.item_requests)
            .field("edits", &self.edits)
            .finish()
    }
}

impl<T: Item> Default for EntityState<T> {
    fn default() -> Self {
        Self::new(StateConfig::default())
    }
}

impl<T: Item> EntityState<T> {
    /// An empty state.
    pub fn new(config: StateConfig<T>) -> Self {
        Self::from_parts(Arc::new(config), HashMap::new(), HashMap::new())
    }

    fn from_parts(
        config: Arc<StateConfig<T>>,
        paths: HashMap<String, ItemPath>,
        queries: Managers<T>,
    ) -> Self {
        EntityState {
            paths: Arc::new(paths),
            queries: Arc::new(queries),
            query_requests: Arc::new(HashMap::new()),
            item_requests: Arc::new(HashMap::new()),
            edits: Arc::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &StateConfig<T> {
        &self.config
    }

    /// The query manager of `collection`, if anything was received for it.
    pub fn manager(&self, collection: &CollectionKey) -> Option<&QueryManager<T>> {
        self.queries.get(collection)
    }

    pub fn collections(&self) -> impl Iterator<Item = &CollectionKey> {
        self.queries.keys()
    }

    pub fn path(&self, global_id: &str) -> Option<&ItemPath> {
        self.paths.get(global_id)
    }

    /// Whether both states share every field.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.paths, &other.paths)
            && Arc::ptr_eq(&self.queries, &other.queries)
            && Arc::ptr_eq(&self.query_requests, &other.query_requests)
            && Arc::ptr_eq(&self.item_requests, &other.item_requests)
            && Arc::ptr_eq(&self.edits, &other.edits)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
            && self.queries.is_empty()
            && self.query_requests.is_empty()
            && self.item_requests.is_empty()
            && self.edits.is_empty()
    }

    /// Key of the request flag for `query` in `collection`.
    pub fn request_key(&self, collection: &CollectionKey, query: &Query) -> String {
        QueryKey::new(&self.config.manager.defaults).serialize(query, Some(collection))
    }

    fn manager_or_new(&self, collection: &CollectionKey) -> QueryManager<T> {
        match self.queries.get(collection) {
            Some(manager) => manager.clone(),
            None => self.config.new_manager(),
        }
    }

    fn edits_for(&self, collection: &CollectionKey, target: &EditTarget) -> Option<&Map<String, Value>> {
        self.edits.get(collection)?.get(target)
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Apply `action` to `state`, returning the next state.
///
/// Fields the action does not concern are shared with `state`.
pub fn reduce<T: Item>(state: &EntityState<T>, action: &EntityAction<T>) -> EntityState<T> {
    if let EntityAction::Clear = action {
        tracing::debug!("clearing entity state");
        return EntityState::from_parts(Arc::clone(&state.config), HashMap::new(), HashMap::new());
    }

    if let EntityAction::ItemsRequestFailure {
        collection,
        query,
        error,
    } = action
    {
        tracing::debug!(%collection, ?query, %error, "items request failed");
    }

    EntityState {
        paths: reduce_paths(state, action),
        queries: reduce_queries(state, action),
        query_requests: reduce_query_requests(state, action),
        item_requests: reduce_item_requests(state, action),
        edits: reduce_edits(state, action),
        config: Arc::clone(&state.config),
    }
}

fn reduce_paths<T: Item>(
    state: &EntityState<T>,
    action: &EntityAction<T>,
) -> Arc<HashMap<String, ItemPath>> {
    let located = |collection: &CollectionKey, item: &T| {
        item.global_id().map(|global_id| {
            (
                global_id,
                ItemPath {
                    collection: collection.clone(),
                    id: item.id(),
                },
            )
        })
    };

    let entries: Vec<(String, ItemPath)> = match action {
        EntityAction::ItemsReceive { items } => items
            .iter()
            .filter_map(|item| located(&item.collection_key(), item))
            .collect(),
        EntityAction::ItemsRequestSuccess {
            collection, items, ..
        } => items
            .iter()
            .filter_map(|item| located(collection, item))
            .collect(),
        EntityAction::ItemSaveSuccess {
            collection, saved, ..
        } => located(collection, saved).into_iter().collect(),
        EntityAction::ItemDeleteSuccess { collection, id } => {
            let deleted = |path: &ItemPath| path.collection == *collection && path.id == *id;
            if !state.paths.values().any(deleted) {
                return Arc::clone(&state.paths);
            }
            let mut paths = (*state.paths).clone();
            paths.retain(|_, path| !deleted(path));
            return Arc::new(paths);
        }
        _ => return Arc::clone(&state.paths),
    };

    let mut next: Option<HashMap<String, ItemPath>> = None;
    for (global_id, path) in entries {
        if state.paths.get(&global_id) == Some(&path) {
            continue;
        }
        next.get_or_insert_with(|| (*state.paths).clone())
            .insert(global_id, path);
    }

    match next {
        Some(paths) => Arc::new(paths),
        None => Arc::clone(&state.paths),
    }
}

fn reduce_queries<T: Item>(state: &EntityState<T>, action: &EntityAction<T>) -> Arc<Managers<T>> {
    let updates: Vec<(CollectionKey, QueryManager<T>)> = match action {
        EntityAction::ItemsReceive { items } => {
            let mut grouped: BTreeMap<CollectionKey, Vec<T>> = BTreeMap::new();
            for item in items {
                grouped
                    .entry(item.collection_key())
                    .or_default()
                    .push(item.clone());
            }
            grouped
                .into_iter()
                .map(|(collection, items)| {
                    let manager = state
                        .manager_or_new(&collection)
                        .receive(items, ReceiveOptions::default());
                    (collection, manager)
                })
                .collect()
        }
        EntityAction::ItemsRequestSuccess {
            collection,
            query,
            found,
            items,
        } => {
            let options = ReceiveOptions {
                query: Some(query.clone()),
                found: *found,
            };
            let manager = state
                .manager_or_new(collection)
                .receive(items.iter().cloned(), options);
            vec![(collection.clone(), manager)]
        }
        EntityAction::ItemSaveSuccess {
            collection, saved, ..
        } => {
            let manager = state
                .manager_or_new(collection)
                .receive([saved.clone()], ReceiveOptions::default());
            vec![(collection.clone(), manager)]
        }
        EntityAction::ItemDeleteSuccess { collection, id } => match state.queries.get(collection) {
            Some(manager) => vec![(collection.clone(), manager.remove_item(id))],
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut next: Option<Managers<T>> = None;
    for (collection, manager) in updates {
        let unchanged = state
            .queries
            .get(&collection)
            .is_some_and(|current| current.ptr_eq(&manager));
        if unchanged {
            continue;
        }
        next.get_or_insert_with(|| (*state.queries).clone())
            .insert(collection, manager);
    }

    match next {
        Some(queries) => Arc::new(queries),
        None => Arc::clone(&state.queries),
    }
}

fn reduce_query_requests<T: Item>(
    state: &EntityState<T>,
    action: &EntityAction<T>,
) -> Arc<HashMap<String, bool>> {
    let (collection, query, requesting) = match action {
        EntityAction::ItemsRequest { collection, query } => (collection, query, true),
        EntityAction::ItemsRequestSuccess {
            collection, query, ..
        }
        | EntityAction::ItemsRequestFailure {
            collection, query, ..
        } => (collection, query, false),
        _ => return Arc::clone(&state.query_requests),
    };

    let key = state.request_key(collection, query);
    if state.query_requests.get(&key) == Some(&requesting) {
        return Arc::clone(&state.query_requests);
    }
    let mut requests = (*state.query_requests).clone();
    requests.insert(key, requesting);
    Arc::new(requests)
}

fn reduce_item_requests<T: Item>(
    state: &EntityState<T>,
    action: &EntityAction<T>,
) -> Arc<ItemRequests> {
    let (collection, id, requesting) = match action {
        EntityAction::ItemRequest { collection, id } => (collection, id, true),
        EntityAction::ItemRequestSuccess { collection, id }
        | EntityAction::ItemRequestFailure { collection, id } => (collection, id, false),
        _ => return Arc::clone(&state.item_requests),
    };

    let current = state
        .item_requests
        .get(collection)
        .and_then(|flags| flags.get(id));
    if current == Some(&requesting) {
        return Arc::clone(&state.item_requests);
    }
    let mut requests = (*state.item_requests).clone();
    requests
        .entry(collection.clone())
        .or_default()
        .insert(id.clone(), requesting);
    Arc::new(requests)
}

fn reduce_edits<T: Item>(state: &EntityState<T>, action: &EntityAction<T>) -> Arc<Edits> {
    match action {
        EntityAction::ItemEdit {
            collection,
            target,
            attributes,
        } => {
            let mut merged = state
                .edits_for(collection, target)
                .cloned()
                .unwrap_or_default();
            merge_into(&mut merged, attributes);
            if state.edits_for(collection, target) == Some(&merged) {
                return Arc::clone(&state.edits);
            }
            let mut edits = (*state.edits).clone();
            edits
                .entry(collection.clone())
                .or_default()
                .insert(target.clone(), merged);
            Arc::new(edits)
        }
        EntityAction::ItemEditsReset { collection, target } => {
            remove_edits(state, collection, &[target.clone()])
        }
        EntityAction::ItemSaveSuccess {
            collection,
            target,
            saved,
        } => remove_edits(state, collection, &[target.clone(), Some(saved.id())]),
        EntityAction::ItemDeleteSuccess { collection, id } => {
            remove_edits(state, collection, &[Some(id.clone())])
        }
        _ => Arc::clone(&state.edits),
    }
}

fn remove_edits<T: Item>(
    state: &EntityState<T>,
    collection: &CollectionKey,
    targets: &[EditTarget],
) -> Arc<Edits> {
    let Some(current) = state.edits.get(collection) else {
        return Arc::clone(&state.edits);
    };
    if !targets.iter().any(|target| current.contains_key(target)) {
        return Arc::clone(&state.edits);
    }

    let mut collection_edits = current.clone();
    for target in targets {
        collection_edits.remove(target);
    }

    let mut edits = (*state.edits).clone();
    if collection_edits.is_empty() {
        edits.remove(collection);
    } else {
        edits.insert(collection.clone(), collection_edits);
    }
    Arc::new(edits)
}
