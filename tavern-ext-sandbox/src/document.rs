//! Execution document synthesis.
//!
//! A context runs a single generated file: the bridge prelude (host API
//! proxies exposed as bare identifiers), the script's own source as the
//! module body, then the bridge main loop. The prelude speaks the protocol
//! from [`crate::protocol`] over stdin/stdout.

use tavern_ext_config::Script;

/// Bridge runtime injected ahead of every script body.
pub const BRIDGE_PRELUDE: &str = r#"# tavern-ext bridge runtime (generated; do not edit)
import json
import sys

_handlers = {}
_button_handlers = {}


def on_event(kind, handler):
    """Register a handler for a bridge event kind."""
    _handlers.setdefault(kind, []).append(handler)


def on_button(name, handler):
    """Register a handler for one of this script's declared buttons."""
    _button_handlers.setdefault(name, []).append(handler)


def _send(command):
    sys.stdout.write(json.dumps(command) + "\n")
    sys.stdout.flush()


def log(level, message):
    _send({"type": "Log", "level": level, "message": str(message)})


def notify(level, message):
    _send({"type": "Notify", "level": level, "message": str(message)})


def set_variable(scope, name, value):
    _send({"type": "SetVariable", "scope": scope, "name": name, "value": value})


def emit_event(name, fields=None):
    _send({"type": "EmitEvent", "name": name, "fields": fields or {}})


def _dispatch(event):
    kind = event.get("kind")
    if kind == "ButtonClicked":
        for handler in _button_handlers.get(event.get("button"), []):
            handler(event)
    for handler in _handlers.get(kind, []):
        handler(event)


def _run():
    for line in sys.stdin:
        line = line.strip()
        if not line:
            continue
        try:
            event = json.loads(line)
        except ValueError as exc:
            print("bridge: bad event line: %s" % exc, file=sys.stderr)
            sys.stderr.flush()
            continue
        try:
            _dispatch(event)
        except Exception as exc:
            print("script error: %s" % exc, file=sys.stderr)
            sys.stderr.flush()
"#;

/// Assemble the full execution document for a script.
pub fn synthesize_document(script: &Script) -> String {
    let mut doc = String::with_capacity(
        BRIDGE_PRELUDE.len() + script.content.len() + 128,
    );
    doc.push_str(BRIDGE_PRELUDE);
    doc.push_str("\n# ---- script body: ");
    doc.push_str(&script.name.replace('\n', " "));
    doc.push_str(" ----\n");
    doc.push_str(&script.content);
    if !script.content.ends_with('\n') {
        doc.push('\n');
    }
    doc.push_str("\n# ---- bridge main loop ----\n_run()\n");
    doc
}
