//! End-to-end scenarios over the store facade.

use serde_json::{json, Value};
use std::sync::Arc;
use vertexdb_core::{Config, Envelope, GraphStore, StoreError};
use vertexdb_storage::{InMemoryBlobStore, InMemoryKv, MAX_BATCH};

fn open_store() -> GraphStore {
    GraphStore::open(
        Config::new("tenant-a"),
        Arc::new(InMemoryKv::new()),
        Arc::new(InMemoryBlobStore::new()),
    )
    .unwrap()
}

fn envelope(kind: &str, operation: &str, request: Value) -> Envelope {
    Envelope {
        kind: kind.to_owned(),
        operation: operation.to_owned(),
        request,
        tag: None,
    }
}

fn dispatch(store: &GraphStore, kind: &str, operation: &str, request: Value) -> Value {
    store
        .dispatch(&envelope(kind, operation, request))
        .unwrap_or_else(|err| panic!("{kind}/{operation} failed: {err}"))
}

#[test]
fn index_round_trip() {
    let store = open_store();

    dispatch(&store, "index", "create", json!({"property": "a"}));
    dispatch(
        &store,
        "query",
        "create",
        json!({"key": "entity-a", "value": {"a": 1, "b": 2, "c": 3}}),
    );

    let read = dispatch(&store, "query", "read", json!({"key": "1", "index": "a"}));
    assert_eq!(read, json!({"a": 1, "b": 2, "c": 3, "id": "entity-a"}));
}

#[test]
fn relationship_pagination() {
    let store = open_store();

    for neighbor in ["b", "c", "d", "e"] {
        dispatch(
            &store,
            "relationship",
            "create",
            json!({
                "nodeA": "a",
                "nodeB": neighbor,
                "nodeAToBRelationshipName": "parent",
                "nodeBToARelationshipName": "child",
            }),
        );
    }

    let page = dispatch(
        &store,
        "relationship",
        "list",
        json!({"node": "a", "name": "parent", "first": 2, "after": "b"}),
    );
    assert_eq!(
        page,
        json!({"relationships": ["c", "d"], "hasBefore": true, "hasAfter": true})
    );
}

#[test]
fn range_query_over_a_prefix() {
    let store = open_store();

    dispatch(
        &store,
        "query",
        "batchCreate",
        json!({"entries": {
            "entity-a": {"a": 1, "b": 2, "c": 3},
            "entity-b": {"a": 4, "b": 5, "c": 6},
            "entity-c": {"a": 7, "b": 8, "c": 9},
        }}),
    );

    let listed = dispatch(
        &store,
        "query",
        "list",
        json!({"key": "entity", "query": [{"property": "b", "min": 5, "max": 8}]}),
    );
    let keys: Vec<&String> = listed.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["entity-b", "entity-c"]);
}

#[test]
fn cascade_on_entity_delete() {
    let store = open_store();

    dispatch(
        &store,
        "query",
        "create",
        json!({"key": "a", "value": {"a": 1, "b": 2, "c": 3}}),
    );
    dispatch(
        &store,
        "relationship",
        "create",
        json!({
            "nodeA": "a",
            "nodeB": "b",
            "nodeAToBRelationshipName": "children",
            "nodeBToARelationshipName": "parents",
        }),
    );

    let removed = dispatch(&store, "query", "remove", json!({"key": "a"}));
    assert_eq!(removed, json!({"success": true}));

    let forward = dispatch(
        &store,
        "relationship",
        "list",
        json!({"name": "children", "node": "a"}),
    );
    assert_eq!(forward["relationships"], json!([]));

    let backward = dispatch(
        &store,
        "relationship",
        "list",
        json!({"name": "parents", "node": "b"}),
    );
    assert_eq!(backward["relationships"], json!([]));
}

#[test]
fn backup_then_restore_roundtrips_the_partition() {
    let store = open_store();

    dispatch(
        &store,
        "query",
        "batchCreate",
        json!({"entries": {
            "entity-a": {"a": 1, "b": 2, "c": 3},
            "entity-b": {"a": 4, "b": 5, "c": 6},
        }}),
    );

    let backup_id = dispatch(&store, "store", "backup", json!({}));
    let backup_id = backup_id.as_str().unwrap().to_owned();

    assert_eq!(dispatch(&store, "query", "purge", json!({})), json!(true));
    let emptied = dispatch(&store, "query", "list", json!({}));
    assert!(emptied.as_object().unwrap().is_empty());

    let restored = dispatch(&store, "store", "restore", json!({"backupId": backup_id}));
    assert_eq!(restored, json!({"count": 2}));

    let listed = dispatch(&store, "query", "list", json!({"key": "entity"}));
    assert_eq!(
        listed,
        json!({
            "entity-a": {"a": 1, "b": 2, "c": 3, "id": "entity-a"},
            "entity-b": {"a": 4, "b": 5, "c": 6, "id": "entity-b"},
        })
    );
}

#[test]
fn batch_upsert_updates_index_rows() {
    let store = open_store();

    dispatch(&store, "index", "create", json!({"property": "a"}));
    dispatch(
        &store,
        "query",
        "create",
        json!({"key": "entity-a", "value": {"a": 1, "b": 2, "c": 3}}),
    );

    dispatch(
        &store,
        "query",
        "batchUpsert",
        json!({"entries": {
            "entity-a": {"a": 101, "b": 2, "c": 3},
            "entity-b": {"a": 104, "b": 5, "c": 6},
        }}),
    );

    let by_index = dispatch(&store, "query", "list", json!({"index": "a"}));
    let entries = by_index.as_object().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["entity-a"]["a"], json!(101));
    assert_eq!(entries["entity-b"]["a"], json!(104));
}

#[test]
fn forbidden_pagination_combinations_are_bad_requests() {
    let store = open_store();

    let combinations = [
        json!({"node": "a", "name": "n", "first": 1, "before": "x"}),
        json!({"node": "a", "name": "n", "last": 1, "after": "x"}),
        json!({"node": "a", "name": "n", "first": 1, "last": 1}),
    ];
    for request in combinations {
        let err = store
            .dispatch(&envelope("relationship", "list", request))
            .unwrap_err();
        assert!(matches!(err, StoreError::BadRequest { .. }));
        assert_eq!(err.status_code(), 400);
    }

    let err = store
        .dispatch(&envelope(
            "query",
            "list",
            json!({"key": "e", "first": 1, "last": 1}),
        ))
        .unwrap_err();
    assert!(matches!(err, StoreError::BadRequest { .. }));
}

#[test]
fn unknown_cursor_is_not_found() {
    let store = open_store();

    dispatch(
        &store,
        "relationship",
        "create",
        json!({
            "nodeA": "a",
            "nodeB": "b",
            "nodeAToBRelationshipName": "parent",
            "nodeBToARelationshipName": "child",
        }),
    );

    let err = store
        .dispatch(&envelope(
            "relationship",
            "list",
            json!({"node": "a", "name": "parent", "after": "nope"}),
        ))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(err.status_code(), 404);
}

#[test]
fn chunked_batches_behave_identically_at_and_past_the_cap() {
    for count in [MAX_BATCH, MAX_BATCH + 1] {
        let store = open_store();

        let mut entries = serde_json::Map::new();
        for i in 0..count {
            entries.insert(format!("entity-{i:04}"), json!({"n": i}));
        }
        let created = dispatch(&store, "query", "batchCreate", json!({"entries": entries}));
        assert_eq!(created.as_array().unwrap().len(), count);

        let keys: Vec<String> = (0..count).map(|i| format!("entity-{i:04}")).collect();
        let read = dispatch(&store, "query", "batchRead", json!({"keys": keys.clone()}));
        let read = read.as_array().unwrap();
        assert_eq!(read.len(), count);
        assert!(read.iter().all(|entity| !entity.is_null()));

        dispatch(&store, "query", "batchRemove", json!({"keys": keys}));
        let listed = dispatch(&store, "query", "list", json!({"key": "entity-"}));
        assert!(listed.as_object().unwrap().is_empty());
    }
}

#[test]
fn batch_read_preserves_input_order_and_length() {
    let store = open_store();

    dispatch(
        &store,
        "query",
        "batchCreate",
        json!({"entries": {"k1": {"n": 1}, "k2": {"n": 2}}}),
    );

    let read = dispatch(
        &store,
        "query",
        "batchRead",
        json!({"keys": ["k2", "ghost", "k1"]}),
    );
    let read = read.as_array().unwrap();
    assert_eq!(read.len(), 3);
    assert_eq!(read[0]["n"], json!(2));
    assert!(read[1].is_null());
    assert_eq!(read[2]["n"], json!(1));
}

#[test]
fn indexed_reads_follow_updates() {
    let store = open_store();

    dispatch(&store, "index", "create", json!({"property": "email"}));
    dispatch(
        &store,
        "query",
        "create",
        json!({"key": "u1", "value": {"email": "old@example.com"}}),
    );
    dispatch(
        &store,
        "query",
        "update",
        json!({"key": "u1", "value": {"email": "new@example.com"}}),
    );

    let by_new = dispatch(
        &store,
        "query",
        "read",
        json!({"key": "new@example.com", "index": "email"}),
    );
    assert_eq!(by_new["id"], json!("u1"));

    let err = store
        .dispatch(&envelope(
            "query",
            "read",
            json!({"key": "old@example.com", "index": "email"}),
        ))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn relationship_batch_operations() {
    let store = open_store();

    let edges: Vec<Value> = ["b", "c", "d"]
        .iter()
        .map(|neighbor| {
            json!({
                "nodeA": "hub",
                "nodeB": neighbor,
                "nodeAToBRelationshipName": "links",
                "nodeBToARelationshipName": "linked-from",
            })
        })
        .collect();
    dispatch(&store, "relationship", "batchCreate", json!(edges));

    let pages = dispatch(
        &store,
        "relationship",
        "batchList",
        json!({"requests": [
            {"node": "hub", "name": "links"},
            {"node": "c", "name": "linked-from"},
        ]}),
    );
    let pages = pages.as_array().unwrap();
    assert_eq!(pages[0]["relationships"], json!(["b", "c", "d"]));
    assert_eq!(pages[1]["relationships"], json!(["hub"]));

    let removed = dispatch(
        &store,
        "relationship",
        "batchRemoveNode",
        json!([{"node": "hub"}]),
    );
    assert_eq!(removed, json!({"success": true}));

    let exists = store
        .dispatch(&envelope(
            "relationship",
            "read",
            json!({"nodeA": "c", "nodeB": "hub", "name": "linked-from"}),
        ))
        .unwrap();
    assert_eq!(exists, json!({"exists": false}));
}

#[test]
fn relationship_purge_reports_deleted_rows() {
    let store = open_store();

    dispatch(
        &store,
        "relationship",
        "create",
        json!({
            "nodeA": "a",
            "nodeB": "b",
            "nodeAToBRelationshipName": "x",
            "nodeBToARelationshipName": "y",
        }),
    );

    // two neighbor sets plus two name mappings
    let removed = dispatch(&store, "relationship", "purge", json!({}));
    assert_eq!(removed, json!(4));
}
