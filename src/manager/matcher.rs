//! QueryMatcher - decides whether an item belongs to a query's results.
//!
//! Only consulted when items arrive without an originating query: the
//! manager then walks its known queries and inserts or evicts the items
//! according to the matcher.

use serde_json::Value;
use std::cmp::Ordering;

use crate::item::Item;
use crate::query::Query;

/// Membership and ordering rules for a family of queries.
///
/// The query passed in has every declared default filled in.
pub trait QueryMatcher<T: Item>: Send + Sync {
    /// Whether `item` is part of the result set of `query`.
    fn matches(&self, query: &Query, item: &T) -> bool;

    /// Ordering of two matching items within `query`'s results.
    fn compare(&self, _query: &Query, _a: &T, _b: &T) -> Ordering {
        Ordering::Equal
    }
}

/// Matches items by comparing query fields against item attributes.
///
/// - `search` is a case-insensitive substring match over `search_fields`
/// - `order_by` / `order` (`"ASC"` or `"DESC"`) drive `compare`
/// - any other query field must equal the item attribute of the same name
///   when the item has one
#[derive(Debug, Clone)]
pub struct AttributeMatcher {
    search_fields: Vec<String>,
}

const SEARCH: &str = "search";
const ORDER_BY: &str = "order_by";
const ORDER: &str = "order";

impl AttributeMatcher {
    pub fn new<I, S>(search_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeMatcher {
            search_fields: search_fields.into_iter().map(Into::into).collect(),
        }
    }

    fn matches_search(&self, search: &str, item: &Value) -> bool {
        if search.is_empty() {
            return true;
        }
        let needle = search.to_lowercase();
        self.search_fields.iter().any(|field| {
            item.get(field)
                .and_then(Value::as_str)
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        })
    }
}

impl<T: Item> QueryMatcher<T> for AttributeMatcher {
    fn matches(&self, query: &Query, item: &T) -> bool {
        let Ok(item) = serde_json::to_value(item) else {
            return false;
        };

        query.iter().all(|(field, expected)| match field.as_str() {
            SEARCH => self.matches_search(expected.as_str().unwrap_or_default(), &item),
            ORDER_BY | ORDER => true,
            f if crate::query::PAGINATION_KEYS.contains(&f) => true,
            _ => item.get(field).map_or(true, |actual| actual == expected),
        })
    }

    fn compare(&self, query: &Query, a: &T, b: &T) -> Ordering {
        let Some(order_by) = query.get(ORDER_BY).and_then(Value::as_str) else {
            return Ordering::Equal;
        };
        let (Ok(a), Ok(b)) = (serde_json::to_value(a), serde_json::to_value(b)) else {
            return Ordering::Equal;
        };

        let ordering = compare_values(a.get(order_by), b.get(order_by));
        match query.get(ORDER).and_then(Value::as_str) {
            Some(order) if order.eq_ignore_ascii_case("DESC") => ordering.reverse(),
            _ => ordering,
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
