//! Items - the entities held by a query manager.
//!
//! An item is any server-fetched entity addressed by an [`ItemId`] and
//! scoped to an owning [`CollectionKey`] (a site, or a global namespace
//! such as `"wpcom"`).
//!
//! ## Example
//!
//! ```ignore
//! use entity_query_cache::Item;
//!
//! #[derive(Serialize, Deserialize, Clone, PartialEq, Item)]
//! struct Theme {
//!     #[item(id)]
//!     #[serde(rename = "ID")]
//!     pub id: u64,
//!     #[item(collection)]
//!     pub site_id: u64,
//!     #[item(global_id)]
//!     pub global_id: String,
//!     pub title: String,
//! }
//! ```

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trait for types that can be stored in a query manager.
pub trait Item: Serialize + DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// Returns the identifier of this item within its collection.
    fn id(&self) -> ItemId;

    /// Returns the collection (site or global namespace) owning this item.
    fn collection_key(&self) -> CollectionKey;

    /// Returns an identifier that is unique across all collections, if the
    /// entity carries one.
    fn global_id(&self) -> Option<String> {
        None
    }
}

/// Identifier of an item within its collection: numeric or textual.
///
/// Serialized untagged, so JSON shows a bare number or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(u64),
    Text(String),
}

impl ItemId {
    /// Parses an ID as found in a JSON object key: digits become a number.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<u64>() {
            Ok(n) => ItemId::Number(n),
            Err(_) => ItemId::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        ItemId::Number(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        ItemId::Text(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        ItemId::Text(value.to_string())
    }
}

/// The scope under which items and queries are partitioned.
///
/// Keys are persisted through their `Display` form, and an all-digit text
/// reads back as a site. Build keys with `From` or `parse`, which apply the
/// same rule, rather than naming an all-digit `Named` key directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CollectionKey {
    /// A numeric site.
    Site(u64),
    /// A named, global pseudo-site such as `"wpcom"`. Never all digits.
    Named(String),
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKey::Site(id) => write!(f, "{}", id),
            CollectionKey::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for CollectionKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CollectionKey::from(s))
    }
}

impl From<u64> for CollectionKey {
    fn from(value: u64) -> Self {
        CollectionKey::Site(value)
    }
}

impl From<String> for CollectionKey {
    fn from(value: String) -> Self {
        match value.parse::<u64>() {
            Ok(site) => CollectionKey::Site(site),
            Err(_) => CollectionKey::Named(value),
        }
    }
}

impl From<&str> for CollectionKey {
    fn from(value: &str) -> Self {
        CollectionKey::from(value.to_string())
    }
}

/// Location of an item: its collection and its ID inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemPath {
    pub collection: CollectionKey,
    pub id: ItemId,
}

impl ItemPath {
    pub fn of<T: Item>(item: &T) -> Self {
        ItemPath {
            collection: item.collection_key(),
            id: item.id(),
        }
    }
}
