mod common;

use common::memory_session;
use serde_json::json;
use tavern_ext_host::TavernHost;
use tavern_ext_vars::{VarError, VarScope};

#[test]
fn test_replace_then_get_round_trips_every_scope() {
    let (host, _, session) = memory_session();
    host.switch_chat(Some("alice.png"));
    host.push_message();
    let vars = &session.variables;

    let document = json!({
        "title": "adventure",
        "hp": 12,
        "flags": {"met_guard": true},
        "inventory": ["rope", "torch"],
    });
    for scope in VarScope::ALL {
        vars.replace(scope, document.clone(), None).unwrap();
        let back = vars.get(scope, None).unwrap();
        assert_eq!(back, document, "round trip failed for {scope}");
    }
}

#[test]
fn test_get_returns_detached_snapshots() {
    let (host, _, session) = memory_session();
    host.switch_chat(Some("alice.png"));
    let vars = &session.variables;

    vars.replace(VarScope::Chat, json!({"hp": 10}), None).unwrap();
    let mut first = vars.get(VarScope::Chat, None).unwrap();
    first["hp"] = json!(999);
    let second = vars.get(VarScope::Chat, None).unwrap();
    assert_eq!(second["hp"], json!(10), "mutating a snapshot must not leak");
}

#[test]
fn test_replace_rejects_non_mappings() {
    let (_, _, session) = memory_session();
    let err = session
        .variables
        .replace(VarScope::Global, json!([1, 2, 3]), None)
        .unwrap_err();
    assert!(matches!(err, VarError::NotAMapping { .. }));
}

#[test]
fn test_insert_or_assign_then_insert_composition() {
    let (_, _, session) = memory_session();
    let vars = &session.variables;

    vars.insert_or_assign(VarScope::Global, &json!({"a": 1}), None).unwrap();
    vars.insert_or_assign(VarScope::Global, &json!({"a": 2, "b": 3}), None)
        .unwrap();
    let doc = vars.get(VarScope::Global, None).unwrap();
    assert_eq!(doc["a"], json!(2), "incoming wins on assign");
    assert_eq!(doc["b"], json!(3));

    vars.insert(VarScope::Global, &json!({"a": 99, "c": 4}), None).unwrap();
    let doc = vars.get(VarScope::Global, None).unwrap();
    assert_eq!(doc["a"], json!(2), "existing wins on insert");
    assert_eq!(doc["c"], json!(4));
}

#[test]
fn test_update_with_is_one_replace() {
    let (host, _, session) = memory_session();
    let vars = &session.variables;

    // Each logical update is a single settings save: count SettingsUpdated
    // events for a global-scope transform.
    vars.replace(VarScope::Global, json!({"x": 1}), None).unwrap();
    let mut events = host.subscribe();
    vars.update_with(
        VarScope::Global,
        |doc| {
            doc["x"] = json!(2);
            doc["y"] = json!(3);
        },
        None,
    )
    .unwrap();

    let mut saves = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, tavern_ext_host::HostEvent::SettingsUpdated) {
            saves += 1;
        }
    }
    assert_eq!(saves, 1, "multi-key transform must persist exactly once");
}

#[test]
fn test_rename_is_atomic_and_checks_existence() {
    let (_, _, session) = memory_session();
    let vars = &session.variables;

    vars.replace(VarScope::Global, json!({"old": {"deep": true}}), None)
        .unwrap();
    vars.rename_key(VarScope::Global, "old", "new", None).unwrap();
    let doc = vars.get(VarScope::Global, None).unwrap();
    assert!(doc.get("old").is_none());
    assert_eq!(doc["new"], json!({"deep": true}));

    let err = vars
        .rename_key(VarScope::Global, "ghost", "whatever", None)
        .unwrap_err();
    assert!(matches!(err, VarError::KeyNotFound(_)));
    // Failed rename changed nothing.
    assert_eq!(vars.get(VarScope::Global, None).unwrap(), doc);
}

#[test]
fn test_delete_key_dotted_path() {
    let (_, _, session) = memory_session();
    let vars = &session.variables;

    vars.replace(VarScope::Global, json!({"a": {"b": {"c": 1, "d": 2}}}), None)
        .unwrap();
    assert!(vars.delete_key(VarScope::Global, "a.b.c", None).unwrap());
    let doc = vars.get(VarScope::Global, None).unwrap();
    assert_eq!(doc, json!({"a": {"b": {"d": 2}}}));

    // Deleting again reports false and leaves the mapping unchanged.
    assert!(!vars.delete_key(VarScope::Global, "a.b.c", None).unwrap());
    assert_eq!(vars.get(VarScope::Global, None).unwrap(), doc);
}

#[test]
fn test_message_scope_defaults_to_latest() {
    let (host, _, session) = memory_session();
    host.switch_chat(Some("alice.png"));
    let first = host.push_message();
    let second = host.push_message();
    let vars = &session.variables;

    vars.replace(VarScope::Message, json!({"floor": "latest"}), None).unwrap();
    assert_eq!(
        host.message_variables(second).unwrap(),
        json!({"floor": "latest"})
    );
    assert_eq!(host.message_variables(first).unwrap(), json!({}));

    // Explicit index addresses an earlier floor.
    vars.replace(VarScope::Message, json!({"floor": "first"}), Some(first))
        .unwrap();
    assert_eq!(
        vars.get(VarScope::Message, Some(first)).unwrap(),
        json!({"floor": "first"})
    );
}

#[test]
fn test_message_scope_out_of_range() {
    let (host, _, session) = memory_session();
    host.switch_chat(Some("alice.png"));
    let vars = &session.variables;

    // Empty chat: even the default index has nothing to address.
    let err = vars.get(VarScope::Message, None).unwrap_err();
    assert!(matches!(err, VarError::MessageIndexOutOfRange { .. }));

    host.push_message();
    let err = vars.get(VarScope::Message, Some(5)).unwrap_err();
    assert!(matches!(
        err,
        VarError::MessageIndexOutOfRange { index: 5, len: 1 }
    ));
}

#[test]
fn test_message_scope_tracks_active_swipe() {
    let (host, _, session) = memory_session();
    host.switch_chat(Some("alice.png"));
    let idx = host.push_message();
    let vars = &session.variables;

    vars.replace(VarScope::Message, json!({"swipe": 0}), None).unwrap();
    host.add_swipe(idx).unwrap();
    // The variable API addresses the active slot; the new swipe is empty.
    assert_eq!(vars.get(VarScope::Message, None).unwrap(), json!({}));
}
