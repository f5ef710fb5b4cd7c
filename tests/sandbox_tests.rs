use std::time::Duration;

use tavern_ext_config::{SandboxRunner, Script, ScriptScope};
use tavern_ext_sandbox::{BridgeCommand, BridgeEvent, SandboxError, SandboxHost};

fn settle() {
    std::thread::sleep(Duration::from_millis(2500));
}

fn python_host() -> SandboxHost {
    SandboxHost::new(SandboxRunner::default())
}

#[test]
fn test_run_stop_lifecycle() {
    let mut host = python_host();
    let script = Script::new("Idle", "pass");

    host.run(&script, ScriptScope::Global).unwrap();
    assert!(host.has_context(&script.id));
    assert!(host.is_running(&script.id), "bridge loop keeps the process alive");

    assert!(host.stop(&script.id), "stop reports a real teardown");
    assert!(!host.has_context(&script.id));
    assert!(!host.stop(&script.id), "second stop is a no-op");
}

#[test]
fn test_rerun_destroys_stale_context_first() {
    let mut host = python_host();
    let script = Script::new("Restarted", "pass");

    host.run(&script, ScriptScope::Global).unwrap();
    host.run(&script, ScriptScope::Global).unwrap();
    host.run(&script, ScriptScope::Global).unwrap();

    assert_eq!(
        host.context_ids(),
        vec![script.id.clone()],
        "at most one live context per script id"
    );
    host.clear_all();
}

#[test]
fn test_bridge_event_round_trip() {
    let mut host = python_host();
    let script = Script::new(
        "Echo",
        r#"def _on_custom(event):
    log("info", "saw " + event["name"])

on_event("Custom", _on_custom)
"#,
    );

    host.run(&script, ScriptScope::Global).unwrap();
    host.send_event(
        &script.id,
        &BridgeEvent::Custom {
            name: "ping".to_string(),
            fields: Default::default(),
        },
    )
    .unwrap();
    settle();

    let commands = host.drain_commands();
    assert!(
        commands.iter().any(|(id, cmd)| {
            id == &script.id
                && matches!(
                    cmd,
                    BridgeCommand::Log { level, message }
                        if level == "info" && message == "saw ping"
                )
        }),
        "expected the handler's Log command, got: {commands:?}"
    );
    host.clear_all();
}

#[test]
fn test_stderr_lines_are_collected() {
    let mut host = python_host();
    let script = Script::new("Noisy", "print(\"boom\", file=sys.stderr)");

    host.run(&script, ScriptScope::Global).unwrap();
    settle();

    let errors = host.drain_errors();
    assert!(
        errors
            .iter()
            .any(|(name, line)| name == "Noisy" && line == "boom"),
        "expected the stderr line, got: {errors:?}"
    );
    host.clear_all();
}

#[test]
fn test_run_by_scope_filters_enabled() {
    let mut host = python_host();
    let mut on = Script::new("On", "pass");
    on.enabled = true;
    let off = Script::new("Off", "pass");

    let failures = host.run_by_scope(&[on.clone(), off.clone()], ScriptScope::Global);
    assert!(failures.is_empty());
    assert!(host.has_context(&on.id));
    assert!(!host.has_context(&off.id));

    host.stop_by_scope(&[on.clone(), off]);
    assert!(!host.has_context(&on.id));
}

#[test]
fn test_stop_scope_only_touches_that_scope() {
    let mut host = python_host();
    let global = Script::new("G", "pass");
    let local = Script::new("L", "pass");

    host.run(&global, ScriptScope::Global).unwrap();
    host.run(&local, ScriptScope::Character).unwrap();

    let stopped = host.stop_scope(ScriptScope::Character);
    assert_eq!(stopped, vec![local.id.clone()]);
    assert!(host.has_context(&global.id));
    assert!(!host.has_context(&local.id));
    host.clear_all();
}

#[test]
fn test_clear_all_destroys_everything() {
    let mut host = python_host();
    for name in ["a", "b", "c"] {
        host.run(&Script::new(name, "pass"), ScriptScope::Global).unwrap();
    }
    assert_eq!(host.context_ids().len(), 3);

    host.clear_all();
    assert!(host.context_ids().is_empty());
}

#[test]
fn test_spawn_failure_is_typed_and_leaves_no_context() {
    let mut host = SandboxHost::new(SandboxRunner {
        program: "tavern-ext-no-such-runner".to_string(),
        args: Vec::new(),
    });
    let script = Script::new("Unlaunchable", "pass");

    let err = host.run(&script, ScriptScope::Global).unwrap_err();
    assert!(matches!(err, SandboxError::Spawn { .. }));
    assert!(!host.has_context(&script.id));
}

#[test]
fn test_send_to_unknown_context() {
    let mut host = python_host();
    let err = host
        .send_event(
            "ghost",
            &BridgeEvent::ChatChanged { character_id: None },
        )
        .unwrap_err();
    assert!(matches!(err, SandboxError::UnknownContext(_)));
}
