//! Queries - filter, sort and pagination descriptors.
//!
//! A [`Query`] is an ordered map of field name to JSON value. Normalizing
//! a query against its [`QueryDefaults`] drops every field that equals its
//! declared default, so that two queries differing only in default values
//! compare and serialize identically.

mod key;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use key::{QueryDetails, QueryKey};

/// Query field holding the 1-based page number.
pub const PAGE: &str = "page";
/// Query field holding the page size.
pub const NUMBER: &str = "number";
/// Fields describing pagination rather than the result set.
pub const PAGINATION_KEYS: [&str; 2] = [PAGE, NUMBER];

const FALLBACK_PAGE: u64 = 1;
const FALLBACK_NUMBER: u64 = 20;

/// A filter/sort/pagination descriptor.
///
/// Fields are kept in a `BTreeMap`, so iteration and serialization order
/// is always sorted by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(BTreeMap<String, Value>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn with_search(self, search: impl Into<String>) -> Self {
        self.with("search", search.into())
    }

    pub fn with_page(self, page: u64) -> Self {
        self.with(PAGE, page)
    }

    pub fn with_number(self, number: u64) -> Self {
        self.with(NUMBER, number)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Explicit page number, if one is set.
    pub fn page(&self) -> Option<u64> {
        self.0.get(PAGE).and_then(Value::as_u64)
    }

    /// Explicit page size, if one is set.
    pub fn number(&self) -> Option<u64> {
        self.0.get(NUMBER).and_then(Value::as_u64)
    }

    /// Whether any pagination field is set explicitly.
    pub fn is_paginated(&self) -> bool {
        PAGINATION_KEYS.iter().any(|k| self.0.contains_key(*k))
    }

    /// A copy of this query without `page` and `number`.
    pub fn without_pagination(&self) -> Query {
        let mut query = self.clone();
        for key in PAGINATION_KEYS {
            query.0.remove(key);
        }
        query
    }
}

impl From<BTreeMap<String, Value>> for Query {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Query(fields)
    }
}

impl FromIterator<(String, Value)> for Query {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Query(iter.into_iter().collect())
    }
}

/// Declared default values for a family of queries.
///
/// Used both for normalization (default-valued fields are omitted) and to
/// resolve the effective page and page size of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryDefaults(BTreeMap<String, Value>);

impl Default for QueryDefaults {
    fn default() -> Self {
        QueryDefaults::empty()
            .default_value(PAGE, FALLBACK_PAGE)
            .default_value(NUMBER, FALLBACK_NUMBER)
    }
}

impl QueryDefaults {
    /// Defaults with no declared fields at all; page and page size still
    /// fall back to 1 and 20.
    pub fn empty() -> Self {
        QueryDefaults(BTreeMap::new())
    }

    /// The defaults used for theme and post listings: first page of twenty,
    /// no search, newest first, `post` type.
    pub fn standard() -> Self {
        QueryDefaults::default()
            .default_value("search", "")
            .default_value("order_by", "date")
            .default_value("order", "DESC")
            .default_value("type", "post")
    }

    /// Declare a default value, builder style.
    pub fn default_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Drop every field of `query` that equals its declared default.
    pub fn normalize(&self, query: &Query) -> Query {
        query
            .iter()
            .filter(|(field, value)| self.0.get(field.as_str()) != Some(*value))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// The declared defaults overlaid with the fields of `query`.
    pub fn resolve(&self, query: &Query) -> Query {
        let mut resolved = Query(self.0.clone());
        for (field, value) in query.iter() {
            resolved.set(field.clone(), value.clone());
        }
        resolved
    }

    /// Effective page of `query`, starting at 1.
    pub fn page_of(&self, query: &Query) -> u64 {
        query
            .page()
            .or_else(|| self.0.get(PAGE).and_then(Value::as_u64))
            .unwrap_or(FALLBACK_PAGE)
            .max(1)
    }

    /// Effective page size of `query`, never zero.
    pub fn number_of(&self, query: &Query) -> u64 {
        query
            .number()
            .or_else(|| self.0.get(NUMBER).and_then(Value::as_u64))
            .unwrap_or(FALLBACK_NUMBER)
            .max(1)
    }
}
