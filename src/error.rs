use thiserror::Error;

use crate::item::ItemId;
use crate::schema::SchemaViolation;

/// Errors raised by the few fallible cache operations.
///
/// Lookups never fail; they answer `None` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A patch targeted an item the manager does not hold.
    #[error("item {0} is not tracked by this query manager")]
    UnknownItem(ItemId),
    /// An item or persisted payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serde(String),
    /// Persisted state did not match its declared schema.
    #[error("persisted state rejected: {0}")]
    Schema(#[from] SchemaViolation),
    /// A persisted query listed an item that was not persisted with it.
    #[error("query {query} references unknown item {id}")]
    DanglingItemKey { query: String, id: ItemId },
    /// A thread panicked while holding the store's lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serde(err.to_string())
    }
}
