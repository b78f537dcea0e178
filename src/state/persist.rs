//! Persisted entity state: one `{ items, queries }` snapshot per collection.
//!
//! Request flags and unsaved edits are not persisted.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{EntityState, StateConfig};
use crate::error::CacheError;
use crate::item::{CollectionKey, Item, ItemPath};
use crate::manager::{PersistedManager, QueryManager};
use crate::schema::{KeyRule, SchemaNode};

/// Collection key (as displayed) to that collection's snapshot.
pub type PersistedState<T> = BTreeMap<String, PersistedManager<T>>;

const COLLECTION_KEY: KeyRule = KeyRule {
    name: "collection key",
    accepts: is_collection_key,
};

fn is_collection_key(key: &str) -> bool {
    !key.is_empty()
}

impl<T: Item> EntityState<T> {
    /// The declared shape of persisted entity state.
    pub fn schema() -> SchemaNode {
        SchemaNode::object().pattern(COLLECTION_KEY, PersistedManager::<T>::schema())
    }

    pub fn to_persisted(&self) -> PersistedState<T> {
        self.queries
            .iter()
            .map(|(collection, manager)| (collection.to_string(), manager.to_persisted()))
            .collect()
    }

    pub fn to_value(&self) -> Result<Value, CacheError> {
        Ok(serde_json::to_value(self.to_persisted())?)
    }

    /// Rebuild state from persisted JSON, reporting why it was rejected.
    ///
    /// Global-ID paths are re-derived from the restored items.
    pub fn try_restore(value: &Value, config: StateConfig<T>) -> Result<Self, CacheError> {
        Self::schema().validate(value)?;
        let persisted: PersistedState<T> = serde_json::from_value(value.clone())?;

        let mut paths = HashMap::new();
        let mut queries = HashMap::new();
        for (key, snapshot) in persisted {
            snapshot.check_references()?;
            let collection = CollectionKey::from(key.as_str());

            for item in snapshot.items.values() {
                if let Some(global_id) = item.global_id() {
                    paths.insert(
                        global_id,
                        ItemPath {
                            collection: collection.clone(),
                            id: item.id(),
                        },
                    );
                }
            }

            let manager = config.attach(QueryManager::from_persisted(
                snapshot,
                config.manager.clone(),
            ));
            queries.insert(collection, manager);
        }

        Ok(EntityState::from_parts(Arc::new(config), paths, queries))
    }

    /// Rebuild state from persisted JSON, failing closed: anything that
    /// does not match the schema yields an empty state.
    pub fn restore(value: &Value, config: StateConfig<T>) -> Self {
        match Self::try_restore(value, config.clone()) {
            Ok(state) => state,
            Err(err) => {
                tracing::warn!(error = %err, "discarding persisted entity state");
                EntityState::new(config)
            }
        }
    }
}
