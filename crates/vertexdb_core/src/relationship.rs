//! Relationship engine: symmetric named edges between nodes.
//!
//! An edge relates `node_a` and `node_b` under two directional names
//! (e.g. `parent`/`child`). For each node, the neighbors under one
//! directional name are stored as a single insertion-ordered set at
//! `relationship$<node>$<name>`. For every directional-name pair ever
//! created, a reverse lookup row at `relationship-name$<name>` records the
//! inverse, so a cascade that only knows one side of an edge can construct
//! the mirror set key.
//!
//! Single-edge create and remove run inside a KV transaction. Batch
//! variants trade atomicity for bulk efficiency: they read the distinct
//! set keys through [`ChunkedKv`], merge in memory, and bulk-write.

use crate::chunk::ChunkedKv;
use crate::error::{StoreError, StoreResult};
use crate::keys::{
    parse_relationship_key, relationship_key, relationship_name_key, relationship_node_prefix,
    RELATIONSHIP_NAMESPACE,
};
use crate::pagination::paginate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use vertexdb_storage::{KvBackend, KvTransaction, ListOptions, StorageResult};

/// Request to create one edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    /// One endpoint of the edge.
    pub node_a: String,
    /// The other endpoint.
    pub node_b: String,
    /// Directional name from `node_a` to `node_b`.
    pub node_a_to_b_relationship_name: String,
    /// Directional name from `node_b` to `node_a`.
    pub node_b_to_a_relationship_name: String,
}

/// Request to remove one edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveEdgeSpec {
    /// One endpoint of the edge.
    pub node_a: String,
    /// The other endpoint.
    pub node_b: String,
    /// Directional name from `node_a` to `node_b`.
    pub a_to_b: String,
    /// Directional name from `node_b` to `node_a`.
    pub b_to_a: String,
}

/// Request to check one edge direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRelationshipRequest {
    /// The node whose neighbor set is consulted.
    pub node_a: String,
    /// The neighbor looked for.
    pub node_b: String,
    /// Directional name from `node_a` to `node_b`.
    pub name: String,
}

/// Request naming a single node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    /// The node identifier.
    pub node: String,
}

/// Request to list one node's neighbors under a directional name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRelationshipsRequest {
    /// The directional name to list under.
    pub name: String,
    /// The node whose neighbors are listed.
    pub node: String,
    /// Trim the window to its first N members.
    #[serde(default)]
    pub first: Option<usize>,
    /// Trim the window to its last N members.
    #[serde(default)]
    pub last: Option<usize>,
    /// End the window just before this neighbor.
    #[serde(default)]
    pub before: Option<String>,
    /// Start the window just after this neighbor.
    #[serde(default)]
    pub after: Option<String>,
}

/// A batch of list requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchListRequest {
    /// The individual list requests.
    pub requests: Vec<ListRelationshipsRequest>,
}

/// One page of neighbors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    /// The neighbors inside the window.
    pub relationships: Vec<String>,
    /// Whether members exist before the window.
    pub has_before: bool,
    /// Whether members exist after the window.
    pub has_after: bool,
}

impl ListPage {
    /// An empty page with no members on either side.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            relationships: Vec::new(),
            has_before: false,
            has_after: false,
        }
    }
}

/// Decodes a stored neighbor set into its members.
///
/// Anything but an array of strings decodes to the members it does carry;
/// a missing or malformed row is an empty set.
fn decode_set(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_owned))
            .collect(),
        _ => Vec::new(),
    }
}

/// Encodes members back into the stored representation.
fn encode_set(members: &[String]) -> Value {
    Value::Array(members.iter().cloned().map(Value::String).collect())
}

/// Adds `member` to the set at `key`, preserving insertion order.
fn add_member(txn: &mut dyn KvTransaction, key: &str, member: &str) -> StorageResult<()> {
    let mut members = txn.get(key)?.as_ref().map(decode_set).unwrap_or_default();
    if !members.iter().any(|m| m == member) {
        members.push(member.to_owned());
    }
    txn.put(key, encode_set(&members))
}

/// Strips `member` from the set at `key`, if the set exists.
fn strip_member(txn: &mut dyn KvTransaction, key: &str, member: &str) -> StorageResult<()> {
    if let Some(value) = txn.get(key)? {
        let mut members = decode_set(&value);
        members.retain(|m| m != member);
        txn.put(key, encode_set(&members))?;
    }
    Ok(())
}

/// Maintains bidirectional edges and their name mappings.
pub struct RelationshipEngine {
    kv: Arc<dyn KvBackend>,
    chunked: ChunkedKv,
}

impl RelationshipEngine {
    /// Creates the engine over the shared backend and chunked view.
    #[must_use]
    pub fn new(kv: Arc<dyn KvBackend>, chunked: ChunkedKv) -> Self {
        Self { kv, chunked }
    }

    /// Creates one edge transactionally: both neighbor sets gain a member
    /// and both name mappings are persisted.
    pub fn create(&self, spec: &EdgeSpec) -> StoreResult<()> {
        let a_to_b = &spec.node_a_to_b_relationship_name;
        let b_to_a = &spec.node_b_to_a_relationship_name;
        self.chunked.invalidate_cache();
        self.kv.transaction(&mut |txn| {
            add_member(txn, &relationship_key(&spec.node_a, a_to_b), &spec.node_b)?;
            add_member(txn, &relationship_key(&spec.node_b, b_to_a), &spec.node_a)?;
            txn.put(&relationship_name_key(a_to_b), Value::String(b_to_a.clone()))?;
            txn.put(&relationship_name_key(b_to_a), Value::String(a_to_b.clone()))?;
            Ok(())
        })?;
        Ok(())
    }

    /// Creates many edges through bulk reads and writes.
    ///
    /// The `node_a` side and the `node_b` side are applied sequentially so
    /// the two passes never race on a shared set key.
    pub fn create_batch(&self, specs: &[EdgeSpec]) -> StoreResult<()> {
        if specs.is_empty() {
            return Ok(());
        }
        let right: Vec<(String, String)> = specs
            .iter()
            .map(|spec| {
                (
                    relationship_key(&spec.node_a, &spec.node_a_to_b_relationship_name),
                    spec.node_b.clone(),
                )
            })
            .collect();
        let left: Vec<(String, String)> = specs
            .iter()
            .map(|spec| {
                (
                    relationship_key(&spec.node_b, &spec.node_b_to_a_relationship_name),
                    spec.node_a.clone(),
                )
            })
            .collect();

        self.apply_additions(&right)?;
        self.apply_additions(&left)?;

        let mut names: BTreeMap<String, Value> = BTreeMap::new();
        for spec in specs {
            let a_to_b = &spec.node_a_to_b_relationship_name;
            let b_to_a = &spec.node_b_to_a_relationship_name;
            names.insert(relationship_name_key(a_to_b), Value::String(b_to_a.clone()));
            names.insert(relationship_name_key(b_to_a), Value::String(a_to_b.clone()));
        }
        self.chunked.put_many(names.into_iter().collect())?;
        Ok(())
    }

    /// Returns whether `node_b` is a neighbor of `node_a` under `name`.
    ///
    /// `NotFound` when no set exists for that `(node_a, name)`.
    pub fn has(&self, request: &ReadRelationshipRequest) -> StoreResult<bool> {
        let key = relationship_key(&request.node_a, &request.name);
        match self.chunked.get(&key)? {
            Some(value) => Ok(decode_set(&value).iter().any(|m| m == &request.node_b)),
            None => Err(StoreError::not_found(format!(
                "no {} relationships for {}",
                request.name, request.node_a
            ))),
        }
    }

    /// Removes one edge transactionally, mirroring [`Self::create`].
    ///
    /// A KV-layer failure collapses to `false` rather than an error.
    pub fn remove(&self, spec: &RemoveEdgeSpec) -> bool {
        self.chunked.invalidate_cache();
        let result = self.kv.transaction(&mut |txn| {
            strip_member(txn, &relationship_key(&spec.node_a, &spec.a_to_b), &spec.node_b)?;
            strip_member(txn, &relationship_key(&spec.node_b, &spec.b_to_a), &spec.node_a)?;
            Ok(())
        });
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "edge removal failed");
                false
            }
        }
    }

    /// Removes many edges through bulk reads and writes.
    pub fn remove_batch(&self, specs: &[RemoveEdgeSpec]) -> bool {
        if specs.is_empty() {
            return true;
        }
        let right: Vec<(String, String)> = specs
            .iter()
            .map(|spec| (relationship_key(&spec.node_a, &spec.a_to_b), spec.node_b.clone()))
            .collect();
        let left: Vec<(String, String)> = specs
            .iter()
            .map(|spec| (relationship_key(&spec.node_b, &spec.b_to_a), spec.node_a.clone()))
            .collect();

        let result = self
            .apply_removals(&right)
            .and_then(|()| self.apply_removals(&left));
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(%err, "batch edge removal failed");
                false
            }
        }
    }

    /// Removes every edge incident to `node`, in both directions.
    ///
    /// A KV-layer failure collapses to `false`.
    pub fn remove_node(&self, node: &str) -> bool {
        match self.try_remove_node(node) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(node, %err, "node cascade failed");
                false
            }
        }
    }

    fn try_remove_node(&self, node: &str) -> StoreResult<()> {
        self.chunked.invalidate_cache();
        let sources = self
            .kv
            .list(&ListOptions::prefixed(relationship_node_prefix(node)))?;
        if sources.is_empty() {
            return Ok(());
        }

        // Recover the inverse directional names so mirror set keys can be
        // constructed from the source side alone.
        let name_keys: Vec<String> = sources
            .iter()
            .filter_map(|(key, _)| parse_relationship_key(key))
            .map(|(_, name)| relationship_name_key(name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mappings = self.chunked.get_many(&name_keys)?;

        let mut mirror_removals: Vec<(String, String)> = Vec::new();
        for (key, value) in &sources {
            let Some((_, name)) = parse_relationship_key(key) else {
                continue;
            };
            let Some(inverse) = mappings
                .get(&relationship_name_key(name))
                .and_then(Value::as_str)
            else {
                tracing::warn!(name, "missing inverse name mapping, skipping mirror cleanup");
                continue;
            };
            for target in decode_set(value) {
                mirror_removals.push((relationship_key(&target, inverse), node.to_owned()));
            }
        }

        let source_keys: Vec<String> = sources.into_iter().map(|(key, _)| key).collect();
        self.chunked.delete_many(&source_keys)?;
        self.apply_removals(&mirror_removals)?;
        Ok(())
    }

    /// Cascades [`Self::remove_node`] over many nodes.
    ///
    /// Every node is attempted; the result is `true` only if all
    /// succeeded.
    pub fn remove_node_batch(&self, nodes: &[String]) -> bool {
        let mut all_ok = true;
        for node in nodes {
            all_ok &= self.remove_node(node);
        }
        all_ok
    }

    /// Lists one node's neighbors under a directional name, paginated.
    pub fn list(&self, request: &ListRelationshipsRequest) -> StoreResult<ListPage> {
        let key = relationship_key(&request.node, &request.name);
        let members = self
            .chunked
            .get(&key)?
            .as_ref()
            .map(decode_set)
            .unwrap_or_default();
        let (relationships, has_before, has_after) = paginate(
            &members,
            request.first,
            request.last,
            request.before.as_deref(),
            request.after.as_deref(),
        )?;
        Ok(ListPage {
            relationships,
            has_before,
            has_after,
        })
    }

    /// Applies [`Self::list`] per request over one bulk read.
    ///
    /// An individual request that fails (bad combination, unknown cursor)
    /// degrades to an empty page rather than failing the batch.
    pub fn list_batch(&self, requests: &[ListRelationshipsRequest]) -> StoreResult<Vec<ListPage>> {
        let keys: Vec<String> = requests
            .iter()
            .map(|request| relationship_key(&request.node, &request.name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let sets = self.chunked.get_many(&keys)?;

        Ok(requests
            .iter()
            .map(|request| {
                let members = sets
                    .get(&relationship_key(&request.node, &request.name))
                    .map(decode_set)
                    .unwrap_or_default();
                paginate(
                    &members,
                    request.first,
                    request.last,
                    request.before.as_deref(),
                    request.after.as_deref(),
                )
                .map(|(relationships, has_before, has_after)| ListPage {
                    relationships,
                    has_before,
                    has_after,
                })
                .unwrap_or_else(|_| ListPage::empty())
            })
            .collect())
    }

    /// Deletes every relationship row (sets and name mappings).
    ///
    /// Returns the number of rows removed.
    pub fn purge(&self) -> StoreResult<usize> {
        self.chunked.invalidate_cache();
        let rows = self
            .kv
            .list(&ListOptions::prefixed(RELATIONSHIP_NAMESPACE))?;
        let keys: Vec<String> = rows.into_iter().map(|(key, _)| key).collect();
        self.chunked.delete_many(&keys)
    }

    /// Bulk-merges new members into the sets named by `additions`.
    fn apply_additions(&self, additions: &[(String, String)]) -> StoreResult<()> {
        let keys: Vec<String> = additions
            .iter()
            .map(|(key, _)| key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let existing = self.chunked.get_many(&keys)?;

        let mut sets: BTreeMap<String, Vec<String>> = keys
            .iter()
            .map(|key| {
                let members = existing.get(key).map(decode_set).unwrap_or_default();
                (key.clone(), members)
            })
            .collect();
        for (key, member) in additions {
            let members = sets.entry(key.clone()).or_default();
            if !members.iter().any(|m| m == member) {
                members.push(member.clone());
            }
        }

        let rows: Vec<(String, Value)> = sets
            .into_iter()
            .map(|(key, members)| (key, encode_set(&members)))
            .collect();
        self.chunked.put_many(rows)
    }

    /// Bulk-strips members from the sets named by `removals`.
    ///
    /// Sets that do not exist are left untouched.
    fn apply_removals(&self, removals: &[(String, String)]) -> StoreResult<()> {
        let keys: Vec<String> = removals
            .iter()
            .map(|(key, _)| key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let existing = self.chunked.get_many(&keys)?;

        let mut sets: BTreeMap<String, Vec<String>> = existing
            .iter()
            .map(|(key, value)| (key.clone(), decode_set(value)))
            .collect();
        for (key, member) in removals {
            if let Some(members) = sets.get_mut(key) {
                members.retain(|m| m != member);
            }
        }

        let rows: Vec<(String, Value)> = sets
            .into_iter()
            .map(|(key, members)| (key, encode_set(&members)))
            .collect();
        self.chunked.put_many(rows)
    }
}

impl std::fmt::Debug for RelationshipEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReadCache;
    use vertexdb_storage::{InMemoryKv, ReadOptions, MAX_BATCH};

    fn engine() -> (RelationshipEngine, Arc<InMemoryKv>) {
        let kv = Arc::new(InMemoryKv::new());
        let cache = Arc::new(ReadCache::new());
        let chunked = ChunkedKv::new(kv.clone(), cache, MAX_BATCH, true);
        (RelationshipEngine::new(kv.clone(), chunked), kv)
    }

    fn edge(a: &str, b: &str, a_to_b: &str, b_to_a: &str) -> EdgeSpec {
        EdgeSpec {
            node_a: a.to_owned(),
            node_b: b.to_owned(),
            node_a_to_b_relationship_name: a_to_b.to_owned(),
            node_b_to_a_relationship_name: b_to_a.to_owned(),
        }
    }

    fn read(a: &str, b: &str, name: &str) -> ReadRelationshipRequest {
        ReadRelationshipRequest {
            node_a: a.to_owned(),
            node_b: b.to_owned(),
            name: name.to_owned(),
        }
    }

    fn list_request(node: &str, name: &str) -> ListRelationshipsRequest {
        ListRelationshipsRequest {
            name: name.to_owned(),
            node: node.to_owned(),
            first: None,
            last: None,
            before: None,
            after: None,
        }
    }

    #[test]
    fn create_maintains_both_directions_and_name_mappings() {
        let (engine, kv) = engine();
        engine.create(&edge("a", "b", "parent", "child")).unwrap();

        assert!(engine.has(&read("a", "b", "parent")).unwrap());
        assert!(engine.has(&read("b", "a", "child")).unwrap());

        let opts = ReadOptions::default();
        assert_eq!(
            kv.get("relationship-name$parent", &opts).unwrap(),
            Some(Value::String("child".into()))
        );
        assert_eq!(
            kv.get("relationship-name$child", &opts).unwrap(),
            Some(Value::String("parent".into()))
        );
    }

    #[test]
    fn create_is_idempotent_per_member() {
        let (engine, _) = engine();
        engine.create(&edge("a", "b", "parent", "child")).unwrap();
        engine.create(&edge("a", "b", "parent", "child")).unwrap();

        let page = engine.list(&list_request("a", "parent")).unwrap();
        assert_eq!(page.relationships, vec!["b".to_owned()]);
    }

    #[test]
    fn has_on_missing_set_is_not_found() {
        let (engine, _) = engine();
        let err = engine.has(&read("ghost", "b", "parent")).unwrap_err();
        assert!(matches!(err, crate::error::StoreError::NotFound { .. }));
    }

    #[test]
    fn batch_create_merges_into_shared_sets() {
        let (engine, _) = engine();
        let specs: Vec<EdgeSpec> = ["b", "c", "d", "e"]
            .iter()
            .map(|b| edge("a", b, "parent", "child"))
            .collect();
        engine.create_batch(&specs).unwrap();

        let page = engine.list(&list_request("a", "parent")).unwrap();
        assert_eq!(
            page.relationships,
            vec!["b".to_owned(), "c".to_owned(), "d".to_owned(), "e".to_owned()]
        );
        assert!(engine.has(&read("c", "a", "child")).unwrap());
    }

    #[test]
    fn remove_deletes_both_directions() {
        let (engine, _) = engine();
        engine.create(&edge("a", "b", "parent", "child")).unwrap();

        let removed = engine.remove(&RemoveEdgeSpec {
            node_a: "a".into(),
            node_b: "b".into(),
            a_to_b: "parent".into(),
            b_to_a: "child".into(),
        });
        assert!(removed);
        assert!(!engine.has(&read("a", "b", "parent")).unwrap());
        assert!(!engine.has(&read("b", "a", "child")).unwrap());
    }

    #[test]
    fn remove_node_cascades_into_mirror_sets() {
        let (engine, kv) = engine();
        engine.create(&edge("a", "b", "children", "parents")).unwrap();
        engine.create(&edge("a", "c", "children", "parents")).unwrap();
        engine.create(&edge("x", "a", "likes", "liked-by")).unwrap();

        assert!(engine.remove_node("a"));

        // a's own sets are gone
        let opts = ReadOptions::default();
        assert!(kv.get("relationship$a$children", &opts).unwrap().is_none());
        assert!(kv.get("relationship$a$liked-by", &opts).unwrap().is_none());

        // and a no longer appears in any mirror set
        assert!(!engine.has(&read("b", "a", "parents")).unwrap());
        assert!(!engine.has(&read("c", "a", "parents")).unwrap());
        assert!(!engine.has(&read("x", "a", "likes")).unwrap());
    }

    #[test]
    fn remove_node_without_edges_succeeds() {
        let (engine, _) = engine();
        assert!(engine.remove_node("lonely"));
    }

    #[test]
    fn pagination_window_matches_cursor_semantics() {
        let (engine, _) = engine();
        let specs: Vec<EdgeSpec> = ["b", "c", "d", "e"]
            .iter()
            .map(|b| edge("a", b, "parent", "child"))
            .collect();
        engine.create_batch(&specs).unwrap();

        let mut request = list_request("a", "parent");
        request.first = Some(2);
        request.after = Some("b".into());
        let page = engine.list(&request).unwrap();

        assert_eq!(page.relationships, vec!["c".to_owned(), "d".to_owned()]);
        assert!(page.has_before);
        assert!(page.has_after);
    }

    #[test]
    fn list_on_missing_set_is_empty() {
        let (engine, _) = engine();
        let page = engine.list(&list_request("ghost", "parent")).unwrap();
        assert_eq!(page, ListPage::empty());
    }

    #[test]
    fn batch_list_degrades_failures_to_empty_pages() {
        let (engine, _) = engine();
        engine.create(&edge("a", "b", "parent", "child")).unwrap();

        let good = list_request("a", "parent");
        let mut bad = list_request("a", "parent");
        bad.after = Some("unknown-cursor".into());

        let pages = engine.list_batch(&[good, bad]).unwrap();
        assert_eq!(pages[0].relationships, vec!["b".to_owned()]);
        assert_eq!(pages[1], ListPage::empty());
    }

    #[test]
    fn purge_removes_sets_and_name_mappings() {
        let (engine, kv) = engine();
        engine.create(&edge("a", "b", "parent", "child")).unwrap();
        kv.put("unrelated", Value::String("stays".into())).unwrap();

        // 2 sets + 2 name mappings
        assert_eq!(engine.purge().unwrap(), 4);
        assert_eq!(kv.len(), 1);
    }
}
