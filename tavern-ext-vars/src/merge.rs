//! Deep-merge and dotted-path helpers over JSON documents.

use serde_json::Value;

/// Merge `incoming` into `target`; incoming wins on conflicts.
///
/// Objects are merged recursively, everything else (including arrays) is
/// replaced wholesale.
pub fn deep_merge(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(target_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match target_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target_slot, incoming_value) => *target_slot = incoming_value.clone(),
    }
}

/// Fill `incoming` into `target` as defaults; existing values win.
pub fn deep_defaults(target: &mut Value, incoming: &Value) {
    if let (Value::Object(target_map), Value::Object(incoming_map)) = (target, incoming) {
        for (key, value) in incoming_map {
            match target_map.get_mut(key) {
                Some(existing) => deep_defaults(existing, value),
                None => {
                    target_map.insert(key.clone(), value.clone());
                }
            }
        }
    }
    // A non-object target already "exists", so it wins and nothing happens.
}

/// Remove the value at a dotted path like `a.b.c`.
///
/// Returns whether anything was actually removed. Empty intermediate
/// objects are left in place; only the leaf entry goes away.
pub fn remove_path(root: &mut Value, dotted: &str) -> bool {
    let mut segments = dotted.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        let Value::Object(map) = current else {
            return false;
        };
        if segments.peek().is_none() {
            return map.remove(segment).is_some();
        }
        match map.get_mut(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    false
}

/// JSON type name for error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
