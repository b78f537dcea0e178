//! Persisted form of a query manager: `{ items, queries }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::{ManagerOptions, QueryManager, QueryResult};
use crate::error::CacheError;
use crate::item::Item;
use crate::query::QueryKey;
use crate::schema::{KeyRule, SchemaNode};

/// Snapshot of a manager's data, without options or matcher.
///
/// Item keys are informational: on restore every item is re-indexed by
/// its own [`Item::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Item"))]
pub struct PersistedManager<T> {
    pub items: BTreeMap<String, T>,
    pub queries: BTreeMap<String, QueryResult>,
}

const QUERY_KEY: KeyRule = KeyRule {
    name: "query key",
    accepts: is_query_key,
};

fn is_query_key(key: &str) -> bool {
    let details = QueryKey::deserialize(key);
    details.query.is_some() && details.collection_key.is_none()
}

impl<T: Item> PersistedManager<T> {
    /// The declared shape of a persisted manager.
    pub fn schema() -> SchemaNode {
        let item_key = SchemaNode::OneOf(vec![
            SchemaNode::non_negative_integer(),
            SchemaNode::String,
            SchemaNode::Null,
        ]);
        let query_result = SchemaNode::object()
            .required("item_keys")
            .property("item_keys", SchemaNode::array_of(item_key))
            .property("found", SchemaNode::non_negative_integer());

        SchemaNode::object()
            .required("items")
            .required("queries")
            .property(
                "items",
                SchemaNode::object().pattern(KeyRule::ANY, SchemaNode::object().allow_additional()),
            )
            .property(
                "queries",
                SchemaNode::object().pattern(QUERY_KEY, query_result),
            )
    }

    /// Validate and decode a persisted manager.
    pub fn from_value(value: &Value) -> Result<Self, CacheError> {
        Self::schema().validate(value)?;
        let persisted: Self = serde_json::from_value(value.clone())?;
        persisted.check_references()?;
        Ok(persisted)
    }

    pub fn to_value(&self) -> Result<Value, CacheError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Every listed ID must belong to a persisted item.
    pub(crate) fn check_references(&self) -> Result<(), CacheError> {
        let known: HashSet<_> = self.items.values().map(Item::id).collect();
        for (query, record) in &self.queries {
            if let Some(missing) = record
                .item_keys
                .iter()
                .flatten()
                .find(|id| !known.contains(*id))
            {
                return Err(CacheError::DanglingItemKey {
                    query: query.clone(),
                    id: missing.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<T: Item> QueryManager<T> {
    /// Snapshot the `{ items, queries }` data of this manager.
    pub fn to_persisted(&self) -> PersistedManager<T> {
        PersistedManager {
            items: self
                .items
                .iter()
                .map(|(id, item)| (id.to_string(), item.as_ref().clone()))
                .collect(),
            queries: self
                .queries
                .iter()
                .map(|(key, record)| (key.clone(), record.clone()))
                .collect(),
        }
    }

    /// Rebuild a manager from a snapshot.
    pub fn from_persisted(persisted: PersistedManager<T>, options: ManagerOptions) -> Self {
        let items: HashMap<_, _> = persisted
            .items
            .into_values()
            .map(|item| (item.id(), Arc::new(item)))
            .collect();
        let queries: HashMap<_, _> = persisted.queries.into_iter().collect();

        QueryManager {
            items: Arc::new(items),
            queries: Arc::new(queries),
            options: Arc::new(options),
            matcher: None,
        }
    }

    /// Restore from JSON, reporting why the value was rejected.
    pub fn try_restore(value: &Value, options: ManagerOptions) -> Result<Self, CacheError> {
        let persisted = PersistedManager::from_value(value)?;
        Ok(Self::from_persisted(persisted, options))
    }

    /// Restore from JSON, failing closed: invalid data yields an empty
    /// manager.
    pub fn restore(value: &Value, options: ManagerOptions) -> Self {
        match Self::try_restore(value, options.clone()) {
            Ok(manager) => manager,
            Err(err) => {
                tracing::warn!(error = %err, "discarding persisted query manager");
                Self::new(options)
            }
        }
    }
}
