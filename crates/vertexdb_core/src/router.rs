//! Tagged request dispatch.
//!
//! A request is an envelope `{type, operation, request, tag?}`. The
//! `(type, operation)` pair selects an engine operation; the body is
//! deserialized into that operation's request type. Unknown pairs are
//! [`StoreError::UnknownOperation`]; malformed bodies are
//! [`StoreError::BadRequest`].
//!
//! The `diagnostic` envelope type is accepted by the parser but carries no
//! in-scope operations (diagnostics live in the hosting transport), so it
//! resolves to `UnknownOperation` like any other unknown pair.

use crate::entity::{
    BatchCreateRequest, BatchEntriesRequest, BatchReadRequest, BatchRemoveRequest,
    CreateQueryRequest, ListQueryRequest, ReadQueryRequest, RemoveQueryRequest,
    UpdateQueryRequest,
};
use crate::error::{StoreError, StoreResult};
use crate::index::IndexDefinition;
use crate::relationship::{
    BatchListRequest, EdgeSpec, ListRelationshipsRequest, NodeRequest, ReadRelationshipRequest,
    RemoveEdgeSpec,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

/// The dispatch envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Engine selector: `query`, `relationship`, `index`, `store`, or
    /// `diagnostic`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Operation within the engine.
    pub operation: String,
    /// Operation-specific body.
    #[serde(default)]
    pub request: Value,
    /// Opaque correlation tag, echoed by the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Request to declare an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIndexRequest {
    /// The entity property to index.
    pub property: String,
}

/// Request naming an index declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexIdRequest {
    /// Storage key of the declaration.
    pub id: String,
}

/// Request to restore from a backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    /// Name of the backup blob.
    pub backup_id: String,
}

/// Index engine operations.
#[derive(Debug, Clone)]
pub enum IndexCommand {
    /// Declare an index.
    Create(CreateIndexRequest),
    /// Read a declaration.
    Read(IndexIdRequest),
    /// Overwrite a declaration.
    Update(IndexDefinition),
    /// Delete a declaration.
    Remove(IndexIdRequest),
    /// List every declaration.
    List,
}

/// Entity engine operations.
#[derive(Debug, Clone)]
pub enum QueryCommand {
    /// Create one entity.
    Create(CreateQueryRequest),
    /// Create many entities.
    BatchCreate(BatchCreateRequest),
    /// Read one entity.
    Read(ReadQueryRequest),
    /// Read many entities.
    BatchRead(BatchReadRequest),
    /// Update one entity.
    Update(UpdateQueryRequest),
    /// Update many entities strictly.
    BatchUpdate(BatchEntriesRequest),
    /// Merge many entities, creating missing ones.
    BatchUpsert(BatchEntriesRequest),
    /// Remove one entity.
    Remove(RemoveQueryRequest),
    /// Remove many entities.
    BatchRemove(BatchRemoveRequest),
    /// List entities under a prefix.
    List(ListQueryRequest),
    /// Delete the entire namespace.
    Purge,
}

/// Relationship engine operations.
#[derive(Debug, Clone)]
pub enum RelationshipCommand {
    /// Create one edge.
    Create(EdgeSpec),
    /// Create many edges.
    BatchCreate(Vec<EdgeSpec>),
    /// Check one edge direction.
    Read(ReadRelationshipRequest),
    /// Remove one edge.
    Remove(RemoveEdgeSpec),
    /// Remove many edges.
    BatchRemove(Vec<RemoveEdgeSpec>),
    /// Remove every edge incident to a node.
    RemoveNode(NodeRequest),
    /// Cascade node removal over many nodes.
    BatchRemoveNode(Vec<NodeRequest>),
    /// List one node's neighbors.
    List(ListRelationshipsRequest),
    /// List neighbors for many requests.
    BatchList(BatchListRequest),
    /// Delete every relationship row.
    Purge,
}

/// Backup/restore operations.
#[derive(Debug, Clone)]
pub enum StoreCommand {
    /// Write the full KV image to a blob.
    Backup,
    /// Rehydrate from a named backup.
    Restore(RestoreRequest),
}

/// A parsed request, dispatched by engine.
#[derive(Debug, Clone)]
pub enum Command {
    /// Index engine.
    Index(IndexCommand),
    /// Entity engine.
    Query(QueryCommand),
    /// Relationship engine.
    Relationship(RelationshipCommand),
    /// Backup/restore.
    Store(StoreCommand),
}

/// Deserializes an envelope body, mapping failures to `BadRequest`.
fn body<T: DeserializeOwned>(envelope: &Envelope) -> StoreResult<T> {
    serde_json::from_value(envelope.request.clone()).map_err(|err| {
        StoreError::bad_request(format!(
            "malformed {}/{} request: {err}",
            envelope.kind, envelope.operation
        ))
    })
}

impl Command {
    /// Parses an envelope into a command.
    pub fn parse(envelope: &Envelope) -> StoreResult<Self> {
        let command = match (envelope.kind.as_str(), envelope.operation.as_str()) {
            ("index", "create") => Self::Index(IndexCommand::Create(body(envelope)?)),
            ("index", "read") => Self::Index(IndexCommand::Read(body(envelope)?)),
            ("index", "update") => Self::Index(IndexCommand::Update(body(envelope)?)),
            ("index", "remove") => Self::Index(IndexCommand::Remove(body(envelope)?)),
            ("index", "list") => Self::Index(IndexCommand::List),

            ("query", "create") => Self::Query(QueryCommand::Create(body(envelope)?)),
            ("query", "batchCreate") => Self::Query(QueryCommand::BatchCreate(body(envelope)?)),
            ("query", "read") => Self::Query(QueryCommand::Read(body(envelope)?)),
            ("query", "batchRead") => Self::Query(QueryCommand::BatchRead(body(envelope)?)),
            ("query", "update") => Self::Query(QueryCommand::Update(body(envelope)?)),
            ("query", "batchUpdate") => Self::Query(QueryCommand::BatchUpdate(body(envelope)?)),
            ("query", "batchUpsert") => Self::Query(QueryCommand::BatchUpsert(body(envelope)?)),
            ("query", "remove") => Self::Query(QueryCommand::Remove(body(envelope)?)),
            ("query", "batchRemove") => Self::Query(QueryCommand::BatchRemove(body(envelope)?)),
            ("query", "list") => Self::Query(QueryCommand::List(body(envelope)?)),
            ("query", "purge") => Self::Query(QueryCommand::Purge),

            ("relationship", "create") => {
                Self::Relationship(RelationshipCommand::Create(body(envelope)?))
            }
            ("relationship", "batchCreate") => {
                Self::Relationship(RelationshipCommand::BatchCreate(body(envelope)?))
            }
            ("relationship", "read") => {
                Self::Relationship(RelationshipCommand::Read(body(envelope)?))
            }
            ("relationship", "remove") => {
                Self::Relationship(RelationshipCommand::Remove(body(envelope)?))
            }
            ("relationship", "batchRemove") => {
                Self::Relationship(RelationshipCommand::BatchRemove(body(envelope)?))
            }
            ("relationship", "removeNode") => {
                Self::Relationship(RelationshipCommand::RemoveNode(body(envelope)?))
            }
            ("relationship", "batchRemoveNode") => {
                Self::Relationship(RelationshipCommand::BatchRemoveNode(body(envelope)?))
            }
            ("relationship", "list") => {
                Self::Relationship(RelationshipCommand::List(body(envelope)?))
            }
            ("relationship", "batchList") => {
                Self::Relationship(RelationshipCommand::BatchList(body(envelope)?))
            }
            ("relationship", "purge") => Self::Relationship(RelationshipCommand::Purge),

            ("store", "backup") => Self::Store(StoreCommand::Backup),
            ("store", "restore") => Self::Store(StoreCommand::Restore(body(envelope)?)),

            (kind, operation) => {
                return Err(StoreError::unknown_operation(kind, operation));
            }
        };
        Ok(command)
    }

    /// Whether this command writes, which requires invalidating the read
    /// cache before dispatch.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        match self {
            Self::Index(command) => !matches!(command, IndexCommand::Read(_) | IndexCommand::List),
            Self::Query(command) => !matches!(
                command,
                QueryCommand::Read(_) | QueryCommand::BatchRead(_) | QueryCommand::List(_)
            ),
            Self::Relationship(command) => !matches!(
                command,
                RelationshipCommand::Read(_)
                    | RelationshipCommand::List(_)
                    | RelationshipCommand::BatchList(_)
            ),
            Self::Store(command) => matches!(command, StoreCommand::Restore(_)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(kind: &str, operation: &str, request: Value) -> Envelope {
        Envelope {
            kind: kind.to_owned(),
            operation: operation.to_owned(),
            request,
            tag: None,
        }
    }

    #[test]
    fn parses_a_query_create() {
        let parsed = Command::parse(&envelope(
            "query",
            "create",
            json!({"key": "e", "value": {"a": 1}}),
        ))
        .unwrap();
        match parsed {
            Command::Query(QueryCommand::Create(request)) => {
                assert_eq!(request.key, "e");
                assert_eq!(request.value.get("a"), Some(&json!(1)));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_relationship_field_names() {
        let parsed = Command::parse(&envelope(
            "relationship",
            "create",
            json!({
                "nodeA": "a",
                "nodeB": "b",
                "nodeAToBRelationshipName": "parent",
                "nodeBToARelationshipName": "child",
            }),
        ))
        .unwrap();
        match parsed {
            Command::Relationship(RelationshipCommand::Create(spec)) => {
                assert_eq!(spec.node_a_to_b_relationship_name, "parent");
                assert_eq!(spec.node_b_to_a_relationship_name, "child");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_pairs_are_unknown_operations() {
        let err = Command::parse(&envelope("query", "zap", json!({}))).unwrap_err();
        assert!(matches!(err, StoreError::UnknownOperation { .. }));

        let err = Command::parse(&envelope("diagnostic", "echo", json!({}))).unwrap_err();
        assert!(matches!(err, StoreError::UnknownOperation { .. }));
    }

    #[test]
    fn malformed_bodies_are_bad_requests() {
        let err = Command::parse(&envelope("query", "create", json!({"value": 3}))).unwrap_err();
        assert!(matches!(err, StoreError::BadRequest { .. }));
    }

    #[test]
    fn mutation_detection_covers_the_catalog() {
        let mutations = [
            ("index", "create", json!({"property": "a"})),
            ("query", "purge", json!({})),
            ("query", "remove", json!({"key": "k"})),
            ("relationship", "purge", json!({})),
            ("store", "restore", json!({"backupId": "b"})),
        ];
        for (kind, operation, request) in mutations {
            let command = Command::parse(&envelope(kind, operation, request)).unwrap();
            assert!(command.is_mutation(), "{kind}/{operation} should mutate");
        }

        let reads = [
            ("index", "list", json!({})),
            ("query", "read", json!({"key": "k"})),
            ("query", "list", json!({})),
            ("relationship", "read", json!({"nodeA": "a", "nodeB": "b", "name": "n"})),
            ("store", "backup", json!({})),
        ];
        for (kind, operation, request) in reads {
            let command = Command::parse(&envelope(kind, operation, request)).unwrap();
            assert!(!command.is_mutation(), "{kind}/{operation} should not mutate");
        }
    }

    #[test]
    fn envelope_roundtrips_through_json() {
        let text = r#"{"type":"store","operation":"restore","request":{"backupId":"b"},"tag":"t1"}"#;
        let envelope: Envelope = serde_json::from_str(text).unwrap();
        assert_eq!(envelope.kind, "store");
        assert_eq!(envelope.tag.as_deref(), Some("t1"));

        match Command::parse(&envelope).unwrap() {
            Command::Store(StoreCommand::Restore(request)) => {
                assert_eq!(request.backup_id, "b");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
