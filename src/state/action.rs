use serde_json::{Map, Value};

use crate::edits::EditTarget;
use crate::item::{CollectionKey, Item, ItemId};
use crate::query::Query;

/// Everything that can happen to entity state.
///
/// Request lifecycles come in request / success / failure triples; the
/// success of a list request carries the received page.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction<T: Item> {
    /// Items arrived outside of any list request (single fetch, push).
    ItemsReceive { items: Vec<T> },
    ItemsRequest {
        collection: CollectionKey,
        query: Query,
    },
    ItemsRequestSuccess {
        collection: CollectionKey,
        query: Query,
        found: Option<u64>,
        items: Vec<T>,
    },
    ItemsRequestFailure {
        collection: CollectionKey,
        query: Query,
        error: String,
    },
    ItemRequest {
        collection: CollectionKey,
        id: ItemId,
    },
    ItemRequestSuccess {
        collection: CollectionKey,
        id: ItemId,
    },
    ItemRequestFailure {
        collection: CollectionKey,
        id: ItemId,
    },
    /// Local, unsaved attribute changes for an item or a new draft.
    ItemEdit {
        collection: CollectionKey,
        target: EditTarget,
        attributes: Map<String, Value>,
    },
    ItemEditsReset {
        collection: CollectionKey,
        target: EditTarget,
    },
    /// The server accepted a save; `saved` is its canonical copy.
    ItemSaveSuccess {
        collection: CollectionKey,
        target: EditTarget,
        saved: T,
    },
    ItemDeleteSuccess {
        collection: CollectionKey,
        id: ItemId,
    },
    /// Drop everything, e.g. on logout.
    Clear,
}

impl<T: Item> EntityAction<T> {
    /// Stable name of the action kind, used in change notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            EntityAction::ItemsReceive { .. } => "ITEMS_RECEIVE",
            EntityAction::ItemsRequest { .. } => "ITEMS_REQUEST",
            EntityAction::ItemsRequestSuccess { .. } => "ITEMS_REQUEST_SUCCESS",
            EntityAction::ItemsRequestFailure { .. } => "ITEMS_REQUEST_FAILURE",
            EntityAction::ItemRequest { .. } => "ITEM_REQUEST",
            EntityAction::ItemRequestSuccess { .. } => "ITEM_REQUEST_SUCCESS",
            EntityAction::ItemRequestFailure { .. } => "ITEM_REQUEST_FAILURE",
            EntityAction::ItemEdit { .. } => "ITEM_EDIT",
            EntityAction::ItemEditsReset { .. } => "ITEM_EDITS_RESET",
            EntityAction::ItemSaveSuccess { .. } => "ITEM_SAVE_SUCCESS",
            EntityAction::ItemDeleteSuccess { .. } => "ITEM_DELETE_SUCCESS",
            EntityAction::Clear => "CLEAR",
        }
    }

    /// The collection the action is scoped to, if it names one.
    pub fn collection(&self) -> Option<&CollectionKey> {
        match self {
            EntityAction::ItemsRequest { collection, .. }
            | EntityAction::ItemsRequestSuccess { collection, .. }
            | EntityAction::ItemsRequestFailure { collection, .. }
            | EntityAction::ItemRequest { collection, .. }
            | EntityAction::ItemRequestSuccess { collection, .. }
            | EntityAction::ItemRequestFailure { collection, .. }
            | EntityAction::ItemEdit { collection, .. }
            | EntityAction::ItemEditsReset { collection, .. }
            | EntityAction::ItemSaveSuccess { collection, .. }
            | EntityAction::ItemDeleteSuccess { collection, .. } => Some(collection),
            EntityAction::ItemsReceive { .. } | EntityAction::Clear => None,
        }
    }
}
