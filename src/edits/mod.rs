//! Edits - unsaved local modifications merged over canonical items.
//!
//! Merging follows one rule for arrays: an array in the edits replaces the
//! canonical value wholesale (a term selection is a full selection, not a
//! delta). Objects merge recursively and everything else overwrites.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::item::ItemId;

/// Which entity an edit record belongs to: an existing item, or `None`
/// for a new draft that has no server ID yet.
pub type EditTarget = Option<ItemId>;

/// Deep-merge `overlay` onto `base`, replacing arrays instead of merging
/// them.
pub fn merge_ignoring_arrays(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            merge_into(&mut merged, overlay);
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// In-place form of [`merge_ignoring_arrays`] for object maps.
pub fn merge_into(target: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// The effective view of an entity: canonical data with edits applied.
///
/// With only edits present, the edits themselves describe a brand-new
/// entity. With neither present there is nothing to show.
pub fn edited_item(canonical: Option<&Value>, edits: Option<&Map<String, Value>>) -> Option<Value> {
    match (canonical, edits) {
        (None, None) => None,
        (Some(canonical), None) => Some(canonical.clone()),
        (None, Some(edits)) => Some(Value::Object(edits.clone())),
        (Some(canonical), Some(edits)) => {
            Some(merge_ignoring_arrays(canonical, &Value::Object(edits.clone())))
        }
    }
}

/// Look up a dotted path (`"discussion.comments_open"`) in an edited item.
pub fn edited_value<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(item, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// How edits are compared against canonical data to decide dirtiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditPolicy {
    /// Values a brand-new entity starts with; editing a field to its
    /// default does not make a draft dirty.
    pub new_item_defaults: Map<String, Value>,
    /// Fields that never count as a change (e.g. a `type` discriminator).
    pub ignored_fields: Vec<String>,
}

impl Default for EditPolicy {
    fn default() -> Self {
        EditPolicy {
            new_item_defaults: Map::new(),
            ignored_fields: vec!["type".to_string()],
        }
    }
}

impl EditPolicy {
    /// Policy for posts and themes: drafts start with `status: "draft"`.
    pub fn standard() -> Self {
        let mut policy = EditPolicy::default();
        policy
            .new_item_defaults
            .insert("status".to_string(), Value::from("draft"));
        policy
    }

    pub fn with_default(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.new_item_defaults.insert(field.into(), value.into());
        self
    }

    pub fn ignoring(mut self, field: impl Into<String>) -> Self {
        self.ignored_fields.push(field.into());
        self
    }

    fn is_ignored(&self, field: &str) -> bool {
        self.ignored_fields.iter().any(|f| f == field)
    }

    /// Whether `edits` would change anything when saved.
    ///
    /// For an existing entity each edited field is merged over the canonical
    /// field (arrays replacing) and compared with it. For a new entity a
    /// field is a change unless it has a declared default and equals it.
    pub fn is_dirty(&self, canonical: Option<&Value>, edits: Option<&Map<String, Value>>) -> bool {
        let Some(edits) = edits else {
            return false;
        };

        edits
            .iter()
            .filter(|(field, _)| !self.is_ignored(field))
            .any(|(field, value)| match canonical {
                Some(canonical) => match canonical.get(field) {
                    Some(current) => merge_ignoring_arrays(current, value) != *current,
                    None => true,
                },
                None => self.new_item_defaults.get(field) != Some(value),
            })
    }
}
