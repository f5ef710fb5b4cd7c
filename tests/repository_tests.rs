mod common;

use common::memory_session;
use tavern_ext::ExtError;
use tavern_ext_config::{Script, ScriptScope};
use tavern_ext_host::TavernHost;

#[test]
fn test_save_script_upserts_and_persists() {
    let (host, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    let mut script = Script::new("Foo", "pass");
    repo.save_script(&script, ScriptScope::Global).unwrap();
    assert_eq!(repo.global_scripts().len(), 1);

    script.content = "pass  # edited".to_string();
    repo.save_script(&script, ScriptScope::Global).unwrap();
    let scripts = repo.global_scripts();
    assert_eq!(scripts.len(), 1, "upsert must not duplicate");
    assert_eq!(scripts[0].content, "pass  # edited");

    // Persisted, not just cached.
    let settings = host.extension_settings().unwrap();
    assert_eq!(settings.global_scripts.len(), 1);
}

#[test]
fn test_save_script_rejects_empty_name() {
    let (_, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    let mut script = Script::new("", "pass");
    script.name = "   ".to_string();
    let err = repo.save_script(&script, ScriptScope::Global).unwrap_err();
    assert!(matches!(err, ExtError::Validation(_)));
    assert!(repo.global_scripts().is_empty(), "nothing persisted");
}

#[test]
fn test_delete_script_not_found() {
    let (_, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    let err = repo.delete_script("nope", ScriptScope::Global).unwrap_err();
    assert!(matches!(err, ExtError::NotFound(_)));
}

#[test]
fn test_character_scripts_resync_from_host() {
    let (host, _, session) = memory_session();
    host.switch_chat(Some("alice.png"));
    let repo = session.orchestrator.repository();

    assert!(repo.character_scripts().unwrap().is_empty());

    // Host actions can change character data underneath the repository.
    let script = Script::new("Local", "pass");
    host.save_character_scripts(std::slice::from_ref(&script)).unwrap();
    let scripts = repo.character_scripts().unwrap();
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].id, script.id);
}

#[test]
fn test_move_script_between_scopes() {
    let (host, _, session) = memory_session();
    host.switch_chat(Some("alice.png"));
    let repo = session.orchestrator.repository();

    let script = Script::new("Wanderer", "pass");
    repo.save_script(&script, ScriptScope::Global).unwrap();
    assert_eq!(repo.script_scope(&script), ScriptScope::Global);

    repo.move_script_to_other_scope(&script, ScriptScope::Global)
        .unwrap();
    assert!(repo.global_scripts().is_empty());
    let characters = repo.character_scripts().unwrap();
    assert_eq!(characters.len(), 1);
    assert_eq!(characters[0].id, script.id, "identity is stable across moves");
    assert_eq!(repo.script_scope(&script), ScriptScope::Character);
}

#[test]
fn test_reorder_scripts() {
    let (_, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    let a = Script::new("a", "1");
    let b = Script::new("b", "1");
    let c = Script::new("c", "1");
    for script in [&a, &b, &c] {
        repo.save_script(script, ScriptScope::Global).unwrap();
    }

    repo.reorder_scripts(ScriptScope::Global, &[c.id.clone(), a.id.clone(), b.id.clone()])
        .unwrap();
    let names: Vec<String> = repo.global_scripts().iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, ["c", "a", "b"]);

    // Partial orders keep the rest stable at the end.
    repo.reorder_scripts(ScriptScope::Global, &[b.id.clone()]).unwrap();
    let names: Vec<String> = repo.global_scripts().iter().map(|s| s.name.clone()).collect();
    assert_eq!(names, ["b", "c", "a"]);

    let err = repo
        .reorder_scripts(ScriptScope::Global, &["ghost".to_string()])
        .unwrap_err();
    assert!(matches!(err, ExtError::NotFound(_)));
}

#[test]
fn test_type_enablement_global_flag() {
    let (_, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    assert!(repo.type_enabled(ScriptScope::Global).unwrap());
    repo.update_type_enabled(ScriptScope::Global, false).unwrap();
    assert!(!repo.type_enabled(ScriptScope::Global).unwrap());
}

#[test]
fn test_type_enablement_character_allow_list() {
    let (host, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    // No chat open: the character flag reads as off, and toggling it is an
    // error because there is nobody to allow.
    assert!(!repo.type_enabled(ScriptScope::Character).unwrap());
    assert!(repo.update_type_enabled(ScriptScope::Character, true).is_err());

    host.switch_chat(Some("alice.png"));
    assert!(!repo.type_enabled(ScriptScope::Character).unwrap());
    repo.update_type_enabled(ScriptScope::Character, true).unwrap();
    assert!(repo.type_enabled(ScriptScope::Character).unwrap());

    let settings = host.extension_settings().unwrap();
    assert!(settings.character_allowed("alice.png"));

    // The allow-list is per character.
    host.switch_chat(Some("bob.png"));
    assert!(!repo.type_enabled(ScriptScope::Character).unwrap());
}

#[test]
fn test_purge_character_from_allow_list() {
    let (host, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    host.switch_chat(Some("alice.png"));
    repo.update_type_enabled(ScriptScope::Character, true).unwrap();
    repo.purge_character("alice.png").unwrap();
    assert!(!host.extension_settings().unwrap().character_allowed("alice.png"));
}

#[test]
fn test_builtin_catalog_upserts_without_clobbering() {
    let (_, _, session) = memory_session();
    let repo = session.orchestrator.repository();

    let added = repo.load_builtin_scripts().unwrap();
    assert!(added >= 2);

    // Modify one catalog entry, then re-instantiate.
    let mut scripts = repo.global_scripts();
    scripts[0].content = "# user tweak".to_string();
    repo.save_script(&scripts[0], ScriptScope::Global).unwrap();

    let added_again = repo.load_builtin_scripts().unwrap();
    assert_eq!(added_again, 0, "stable ids mean no duplicates");
    assert_eq!(repo.global_scripts()[0].content, "# user tweak");
}
