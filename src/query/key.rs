//! QueryKey - deterministic string keys for normalized queries.

use serde_json::{Map, Value};

use super::{Query, QueryDefaults};
use crate::item::CollectionKey;

/// Separator between the collection prefix and the query JSON.
const SEPARATOR: char = ':';

/// The parts recovered from a serialized query key.
///
/// Both fields are `None` when the key could not be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryDetails {
    pub collection_key: Option<CollectionKey>,
    pub query: Option<Query>,
}

/// Serializes queries to stable string keys.
///
/// Keys are the JSON encoding of the normalized query with fields in
/// sorted order, optionally prefixed with `"{collection}:"`.
#[derive(Debug, Clone, Copy)]
pub struct QueryKey<'a> {
    defaults: &'a QueryDefaults,
}

impl<'a> QueryKey<'a> {
    pub fn new(defaults: &'a QueryDefaults) -> Self {
        QueryKey { defaults }
    }

    /// Serialize the normalized query, page included.
    pub fn serialize(&self, query: &Query, collection: Option<&CollectionKey>) -> String {
        encode(&self.defaults.normalize(query), collection)
    }

    /// Serialize the normalized query with `page` and `number` removed.
    ///
    /// This is the key under which a query's result record is stored.
    pub fn serialize_without_pagination(
        &self,
        query: &Query,
        collection: Option<&CollectionKey>,
    ) -> String {
        encode(
            &self.defaults.normalize(query).without_pagination(),
            collection,
        )
    }

    /// Parse a key produced by [`QueryKey::serialize`].
    ///
    /// Never fails: malformed keys yield empty [`QueryDetails`].
    pub fn deserialize(serialized: &str) -> QueryDetails {
        let Some(start) = serialized.find('{') else {
            return QueryDetails::default();
        };

        let (prefix, json) = serialized.split_at(start);
        let collection_key = if prefix.is_empty() {
            None
        } else {
            match prefix.strip_suffix(SEPARATOR) {
                Some(raw) if !raw.is_empty() => raw.parse::<CollectionKey>().ok(),
                _ => return QueryDetails::default(),
            }
        };

        match serde_json::from_str::<Query>(json) {
            Ok(query) => QueryDetails {
                collection_key,
                query: Some(query),
            },
            Err(_) => QueryDetails::default(),
        }
    }
}

fn encode(query: &Query, collection: Option<&CollectionKey>) -> String {
    let object: Map<String, Value> = query
        .iter()
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();
    let json = Value::Object(object).to_string();

    match collection {
        Some(key) => format!("{}{}{}", key, SEPARATOR, json),
        None => json,
    }
}
