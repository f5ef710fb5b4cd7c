//! Uniform read/transform/write access to the four variable scopes.

use serde_json::Value;
use tavern_ext_host::{SharedHost, TavernHost};

use crate::error::VarError;
use crate::merge::{deep_defaults, deep_merge, remove_path, type_name};
use crate::scope::VarScope;

/// Parameterized accessor over the host's four variable stores.
///
/// Message-scope operations take an optional message index, defaulting to
/// the latest message. All other scopes ignore the index.
#[derive(Clone)]
pub struct VariableStore {
    host: SharedHost,
}

impl VariableStore {
    /// Create a store over the given host.
    pub fn new(host: SharedHost) -> Self {
        Self { host }
    }

    /// The backing host handle.
    pub fn host(&self) -> &SharedHost {
        &self.host
    }

    fn resolve_message_index(&self, index: Option<usize>) -> Result<usize, VarError> {
        let len = self.host.message_count();
        match index {
            Some(i) if i < len => Ok(i),
            Some(i) => Err(VarError::MessageIndexOutOfRange { index: i, len }),
            None if len > 0 => Ok(len - 1),
            None => Err(VarError::MessageIndexOutOfRange { index: 0, len: 0 }),
        }
    }

    /// Snapshot of a scope's document.
    ///
    /// Always an owned copy; mutating the result never affects later reads.
    pub fn get(&self, scope: VarScope, index: Option<usize>) -> Result<Value, VarError> {
        match scope {
            VarScope::Global => Ok(self.host.extension_settings()?.variables),
            VarScope::Character => Ok(self.host.character_variables()?),
            VarScope::Chat => Ok(self.host.chat_variables()?),
            VarScope::Message => {
                let index = self.resolve_message_index(index)?;
                Ok(self.host.message_variables(index)?)
            }
        }
    }

    /// Atomically overwrite a scope's entire document and persist it.
    pub fn replace(
        &self,
        scope: VarScope,
        document: Value,
        index: Option<usize>,
    ) -> Result<(), VarError> {
        if !document.is_object() {
            return Err(VarError::NotAMapping {
                scope: scope.name(),
                got: type_name(&document),
            });
        }
        match scope {
            VarScope::Global => {
                let mut settings = self.host.extension_settings()?;
                settings.variables = document;
                self.host.save_extension_settings(&settings)?;
            }
            VarScope::Character => self.host.set_character_variables(document)?,
            VarScope::Chat => self.host.set_chat_variables(document)?,
            VarScope::Message => {
                let index = self.resolve_message_index(index)?;
                self.host.set_message_variables(index, document)?;
            }
        }
        Ok(())
    }

    /// Read, transform, replace — the primitive every multi-key operation
    /// composes through, so each logical update is exactly one replace.
    ///
    /// Returns the document as persisted. The message index is resolved
    /// once up front so the read and the write address the same message.
    pub fn update_with(
        &self,
        scope: VarScope,
        transform: impl FnOnce(&mut Value),
        index: Option<usize>,
    ) -> Result<Value, VarError> {
        let index = match scope {
            VarScope::Message => Some(self.resolve_message_index(index)?),
            _ => None,
        };
        let mut document = self.get(scope, index)?;
        transform(&mut document);
        self.replace(scope, document.clone(), index)?;
        Ok(document)
    }

    /// Deep-merge `incoming` over the scope document; incoming wins.
    pub fn insert_or_assign(
        &self,
        scope: VarScope,
        incoming: &Value,
        index: Option<usize>,
    ) -> Result<Value, VarError> {
        self.update_with(scope, |doc| deep_merge(doc, incoming), index)
    }

    /// Deep-fill `incoming` as defaults; existing values win.
    pub fn insert(
        &self,
        scope: VarScope,
        incoming: &Value,
        index: Option<usize>,
    ) -> Result<Value, VarError> {
        self.update_with(scope, |doc| deep_defaults(doc, incoming), index)
    }

    /// Unset a dotted path like `a.b.c`; returns whether anything was
    /// actually removed.
    pub fn delete_key(
        &self,
        scope: VarScope,
        dotted: &str,
        index: Option<usize>,
    ) -> Result<bool, VarError> {
        let mut removed = false;
        self.update_with(scope, |doc| removed = remove_path(doc, dotted), index)?;
        Ok(removed)
    }

    /// Rename a top-level variable in a single observable transition.
    ///
    /// Fails with [`VarError::KeyNotFound`] before any write when `old` is
    /// absent, so a failed rename never persists anything.
    pub fn rename_key(
        &self,
        scope: VarScope,
        old: &str,
        new: &str,
        index: Option<usize>,
    ) -> Result<(), VarError> {
        let index = match scope {
            VarScope::Message => Some(self.resolve_message_index(index)?),
            _ => None,
        };
        let mut document = self.get(scope, index)?;
        let Value::Object(map) = &mut document else {
            return Err(VarError::NotAMapping {
                scope: scope.name(),
                got: type_name(&document),
            });
        };
        let value = map
            .remove(old)
            .ok_or_else(|| VarError::KeyNotFound(old.to_string()))?;
        map.insert(new.to_string(), value);
        self.replace(scope, document, index)
    }
}
