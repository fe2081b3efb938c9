//! Key encoding for the flat KV namespace.
//!
//! All subsystems share one namespace; prefixes disambiguate:
//!
//! | Key | Meaning |
//! |---|---|
//! | `<userKey>` | entity payload |
//! | `idx:<property>` | index declaration |
//! | `<property>--<value>` | index entry (value = entity payload) |
//! | `relationship$<node>$<name>` | neighbor set of `node` under `name` |
//! | `relationship-name$<name>` | inverse directional name for `name` |

/// Prefix for index declarations.
pub const INDEX_DECLARATION_PREFIX: &str = "idx:";

/// Separator between property and value in an index entry key.
pub const INDEX_ENTRY_SEPARATOR: &str = "--";

/// Prefix for neighbor-set keys.
pub const RELATIONSHIP_PREFIX: &str = "relationship$";

/// Prefix for directional-name mapping keys.
pub const RELATIONSHIP_NAME_PREFIX: &str = "relationship-name$";

/// Prefix covering every relationship row (sets and name mappings).
pub const RELATIONSHIP_NAMESPACE: &str = "relationship";

/// Key of the declaration for an index on `property`.
#[must_use]
pub fn index_declaration_key(property: &str) -> String {
    format!("{INDEX_DECLARATION_PREFIX}{property}")
}

/// Key of the index entry for `property` holding `value`.
#[must_use]
pub fn index_entry_key(property: &str, value: &str) -> String {
    format!("{property}{INDEX_ENTRY_SEPARATOR}{value}")
}

/// Key of the neighbor set of `node` under the directional name `name`.
#[must_use]
pub fn relationship_key(node: &str, name: &str) -> String {
    format!("{RELATIONSHIP_PREFIX}{node}${name}")
}

/// Prefix selecting every neighbor set of `node`.
#[must_use]
pub fn relationship_node_prefix(node: &str) -> String {
    format!("{RELATIONSHIP_PREFIX}{node}$")
}

/// Key of the inverse-name mapping for the directional name `name`.
#[must_use]
pub fn relationship_name_key(name: &str) -> String {
    format!("{RELATIONSHIP_NAME_PREFIX}{name}")
}

/// Splits a neighbor-set key into `(node, directional name)`.
///
/// Returns `None` for keys outside the relationship-set namespace. The
/// node id ends at the first `$` after the prefix; the remainder is the
/// directional name.
#[must_use]
pub fn parse_relationship_key(key: &str) -> Option<(&str, &str)> {
    key.strip_prefix(RELATIONSHIP_PREFIX)?.split_once('$')
}

/// Resolves a storage key from the optional `key` / `index` pair used by
/// read and list requests: both present → `<index>--<key>`, one present →
/// that value alone, neither → `None`.
#[must_use]
pub fn resolve_storage_key(key: Option<&str>, index: Option<&str>) -> Option<String> {
    match (key, index) {
        (Some(key), Some(index)) => Some(index_entry_key(index, key)),
        (Some(key), None) => Some(key.to_owned()),
        (None, Some(index)) => Some(index.to_owned()),
        (None, None) => None,
    }
}
