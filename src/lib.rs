// The Item derive expands to `::entity_query_cache::...` paths.
extern crate self as entity_query_cache;

pub mod edits;
mod error;
mod item;
pub mod manager;
pub mod query;
pub mod schema;
pub mod state;

#[cfg(feature = "emitter")]
pub mod store;

pub use edits::{EditPolicy, EditTarget};
pub use error::CacheError;
pub use item::{CollectionKey, Item, ItemId, ItemPath};
pub use manager::{
    AttributeMatcher, ManagerOptions, PersistedManager, QueryManager, QueryMatcher, QueryResult,
    ReceiveOptions,
};
pub use query::{Query, QueryDefaults, QueryDetails, QueryKey};
pub use schema::{SchemaNode, SchemaViolation};
pub use state::{reduce, selectors, EntityAction, EntityState, PersistedState, SelectorCache, StateConfig};

#[cfg(feature = "emitter")]
pub use store::{StateChange, Store};

// Re-export the derive macro
pub use entity_query_cache_macros::Item;
