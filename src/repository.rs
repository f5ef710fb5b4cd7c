//! Persisted script store.
//!
//! Two collections hold scripts: the global list inside extension settings
//! and the active character's embedded list. The global list is cached in
//! memory and reloaded after every persist; the character list is re-read
//! from the host on each access, since host actions can change character
//! data underneath us. Every mutation persists before returning — there is
//! no separate commit step and no rollback, the last successful persist
//! wins.

use parking_lot::RwLock;

use tavern_ext_config::{Script, ScriptScope, builtin_scripts};
use tavern_ext_host::{HostError, SharedHost, TavernHost};

use crate::error::ExtError;

/// CRUD and enablement operations over the two script collections.
pub struct ScriptRepository {
    host: SharedHost,
    global: RwLock<Vec<Script>>,
}

impl ScriptRepository {
    /// Load the repository from the host's persisted settings.
    pub fn new(host: SharedHost) -> Result<Self, ExtError> {
        let global = host.extension_settings()?.global_scripts;
        Ok(Self {
            host,
            global: RwLock::new(global),
        })
    }

    /// Re-read the global list from persisted settings (used after the
    /// settings document changed outside this repository).
    pub fn refresh(&self) -> Result<(), ExtError> {
        *self.global.write() = self.host.extension_settings()?.global_scripts;
        Ok(())
    }

    /// Snapshot of the global scripts.
    pub fn global_scripts(&self) -> Vec<Script> {
        self.global.read().clone()
    }

    /// The active character's embedded scripts, re-read from the host.
    pub fn character_scripts(&self) -> Result<Vec<Script>, ExtError> {
        Ok(self.host.character_scripts()?)
    }

    /// Character scripts, treating "no chat open" as an empty list.
    pub fn character_scripts_or_empty(&self) -> Result<Vec<Script>, ExtError> {
        match self.host.character_scripts() {
            Ok(scripts) => Ok(scripts),
            Err(HostError::NoActiveCharacter) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Scripts of either scope.
    pub fn scripts(&self, scope: ScriptScope) -> Result<Vec<Script>, ExtError> {
        match scope {
            ScriptScope::Global => Ok(self.global_scripts()),
            ScriptScope::Character => self.character_scripts(),
        }
    }

    fn persist(&self, scope: ScriptScope, scripts: Vec<Script>) -> Result<(), ExtError> {
        match scope {
            ScriptScope::Global => {
                let mut settings = self.host.extension_settings()?;
                settings.global_scripts = scripts;
                self.host.save_extension_settings(&settings)?;
                *self.global.write() = settings.global_scripts;
            }
            ScriptScope::Character => self.host.save_character_scripts(&scripts)?,
        }
        Ok(())
    }

    /// Upsert a script by id into the scope's collection and persist.
    ///
    /// Fails with [`ExtError::Validation`] when the name is empty, before
    /// anything is written.
    pub fn save_script(&self, script: &Script, scope: ScriptScope) -> Result<(), ExtError> {
        if script.name.trim().is_empty() {
            return Err(ExtError::Validation(
                "script name must not be empty".to_string(),
            ));
        }
        let mut scripts = self.scripts(scope)?;
        match scripts.iter_mut().find(|s| s.id == script.id) {
            Some(slot) => *slot = script.clone(),
            None => scripts.push(script.clone()),
        }
        self.persist(scope, scripts)
    }

    /// Remove a script by id and persist; returns the removed record.
    pub fn delete_script(&self, id: &str, scope: ScriptScope) -> Result<Script, ExtError> {
        let mut scripts = self.scripts(scope)?;
        let position = scripts
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ExtError::NotFound(format!("id {id} in {scope} scripts")))?;
        let removed = scripts.remove(position);
        self.persist(scope, scripts)?;
        Ok(removed)
    }

    /// Reorder a scope's scripts to match `ids`; unmentioned scripts keep
    /// their relative order at the end.
    pub fn reorder_scripts(&self, scope: ScriptScope, ids: &[String]) -> Result<(), ExtError> {
        let mut remaining = self.scripts(scope)?;
        let mut reordered = Vec::with_capacity(remaining.len());
        for id in ids {
            let position = remaining
                .iter()
                .position(|s| &s.id == id)
                .ok_or_else(|| ExtError::NotFound(format!("id {id} in {scope} scripts")))?;
            reordered.push(remaining.remove(position));
        }
        reordered.append(&mut remaining);
        self.persist(scope, reordered)
    }

    /// Move a script to the other scope.
    ///
    /// Two sequential persists (remove from source, append to destination),
    /// deliberately not atomic: an interruption between them loses the
    /// script from both collections, so callers re-verify afterwards.
    pub fn move_script_to_other_scope(
        &self,
        script: &Script,
        from: ScriptScope,
    ) -> Result<(), ExtError> {
        let removed = self.delete_script(&script.id, from)?;
        let mut destination = self.scripts(from.other())?;
        destination.push(removed);
        self.persist(from.other(), destination)
    }

    /// Which scope owns a script: membership test against the global list,
    /// anything else is assumed character-scoped.
    pub fn script_scope(&self, script: &Script) -> ScriptScope {
        if self.global.read().iter().any(|s| s.id == script.id) {
            ScriptScope::Global
        } else {
            ScriptScope::Character
        }
    }

    /// Look a script up by id in one scope.
    pub fn find_in_scope(
        &self,
        id: &str,
        scope: ScriptScope,
    ) -> Result<Option<Script>, ExtError> {
        let scripts = match scope {
            ScriptScope::Global => self.global_scripts(),
            ScriptScope::Character => self.character_scripts_or_empty()?,
        };
        Ok(scripts.into_iter().find(|s| s.id == id))
    }

    /// Look a script up by id across both scopes (global first).
    pub fn find_script(&self, id: &str) -> Result<Option<(Script, ScriptScope)>, ExtError> {
        for scope in [ScriptScope::Global, ScriptScope::Character] {
            if let Some(script) = self.find_in_scope(id, scope)? {
                return Ok(Some((script, scope)));
            }
        }
        Ok(None)
    }

    /// Flip a scope's master enable flag.
    ///
    /// Global scope is a plain settings boolean; character scope adds or
    /// removes the active character from the persisted allow-list.
    pub fn update_type_enabled(&self, scope: ScriptScope, enabled: bool) -> Result<(), ExtError> {
        let mut settings = self.host.extension_settings()?;
        match scope {
            ScriptScope::Global => settings.global_scripts_enabled = enabled,
            ScriptScope::Character => {
                let character = self
                    .host
                    .active_character_id()
                    .ok_or(ExtError::Host(HostError::NoActiveCharacter))?;
                settings.set_character_allowed(&character, enabled);
            }
        }
        Ok(self.host.save_extension_settings(&settings)?)
    }

    /// Whether a scope's master flag is currently on.
    ///
    /// Character scope is off whenever no chat is open.
    pub fn type_enabled(&self, scope: ScriptScope) -> Result<bool, ExtError> {
        let settings = self.host.extension_settings()?;
        Ok(match scope {
            ScriptScope::Global => settings.global_scripts_enabled,
            ScriptScope::Character => self
                .host
                .active_character_id()
                .is_some_and(|character| settings.character_allowed(&character)),
        })
    }

    /// Whether the extension as a whole is enabled.
    pub fn extension_enabled(&self) -> Result<bool, ExtError> {
        Ok(self.host.extension_settings()?.enabled)
    }

    /// Drop a deleted character from the scripts allow-list.
    pub fn purge_character(&self, character_id: &str) -> Result<(), ExtError> {
        let mut settings = self.host.extension_settings()?;
        if settings.set_character_allowed(character_id, false) {
            self.host.save_extension_settings(&settings)?;
        }
        Ok(())
    }

    /// Instantiate the built-in catalog into the global list.
    ///
    /// Catalog ids are deterministic, so entries the user already has
    /// (possibly modified) are left alone. Returns how many were added.
    pub fn load_builtin_scripts(&self) -> Result<usize, ExtError> {
        let mut globals = self.global_scripts();
        let mut added = 0;
        for entry in builtin_scripts() {
            if !globals.iter().any(|s| s.id == entry.id) {
                globals.push(entry);
                added += 1;
            }
        }
        if added > 0 {
            self.persist(ScriptScope::Global, globals)?;
        }
        Ok(added)
    }

    /// The backing host handle.
    pub fn host(&self) -> &SharedHost {
        &self.host
    }
}
