//! Entity payload helpers.
//!
//! Entities are opaque string-keyed objects carried as JSON-DOM values.
//! The map type preserves insertion order (serde_json's `preserve_order`
//! feature), which the ordered list/batch response contracts rely on.

use serde_json::Value;

/// An entity payload: a string-keyed object of scalar values.
pub type Entity = serde_json::Map<String, Value>;

/// Coerces a scalar property value to its index-key string form.
///
/// Strings pass through, numbers render decimally. Anything else (bool,
/// array, object, null) does not participate in index rows.
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Ensures the payload carries an `id`: the payload's own if present,
/// otherwise the caller's storage key.
#[must_use]
pub fn with_id(key: &str, mut value: Entity) -> Entity {
    if !value.contains_key("id") {
        value.insert("id".to_owned(), Value::String(key.to_owned()));
    }
    value
}

/// Shallow union of `current` and `patch`; patch properties win.
///
/// Properties absent from the patch are preserved.
#[must_use]
pub fn merge(current: &Entity, patch: &Entity) -> Entity {
    let mut merged = current.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// The id an entity is projected under in list responses.
///
/// Falls back to the storage key when the payload carries no usable id.
#[must_use]
pub fn entity_id(storage_key: &str, entity: &Entity) -> String {
    entity
        .get("id")
        .and_then(scalar_to_string)
        .unwrap_or_else(|| storage_key.to_owned())
}
