//! Script records: the unit of user-authored automation.
//!
//! A [`Script`] lives in exactly one of two persisted collections at a time:
//! the global list (extension settings) or the active character's embedded
//! list. Which collection holds it determines its [`ScriptScope`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// Which persisted collection owns a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptScope {
    /// Stored in extension-wide settings, available across all characters.
    Global,
    /// Embedded in the active character's record.
    Character,
}

impl ScriptScope {
    /// The opposite scope, used when moving a script between collections.
    pub fn other(self) -> Self {
        match self {
            ScriptScope::Global => ScriptScope::Character,
            ScriptScope::Character => ScriptScope::Global,
        }
    }
}

impl std::fmt::Display for ScriptScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptScope::Global => write!(f, "global"),
            ScriptScope::Character => write!(f, "character"),
        }
    }
}

/// A button a script asks the host UI to render.
///
/// Clicking a rendered button emits a bus event keyed by
/// [`Script::button_event_key`], which the running script listens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptButton {
    /// Button label, unique within one script.
    pub name: String,

    /// Whether the button is currently rendered (default: true)
    #[serde(default = "crate::defaults::bool_true")]
    pub visible: bool,
}

/// A persisted user script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Opaque unique id, stable across moves and imports.
    pub id: String,

    /// Display name, non-empty; also the export filename basis.
    pub name: String,

    /// Source text executed inside the sandbox.
    pub content: String,

    /// Documentation blob; may be a URL resolved lazily.
    #[serde(default)]
    pub info: String,

    /// Whether the user wants this script running (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// UI triggers the script declares.
    #[serde(default)]
    pub buttons: Vec<ScriptButton>,
}

impl Script {
    /// Create a new script with a fresh random id, disabled.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            content: content.into(),
            info: String::new(),
            enabled: false,
            buttons: Vec::new(),
        }
    }

    /// Assign a fresh random id, returning the previous one.
    ///
    /// Used by collision resolution when the user keeps both copies.
    pub fn regenerate_id(&mut self) -> String {
        std::mem::replace(&mut self.id, Uuid::new_v4().to_string())
    }

    /// Bus event key for one of this script's buttons: `{id}_{button}`.
    pub fn button_event_key(&self, button: &str) -> String {
        format!("{}_{}", self.id, button)
    }

    /// Buttons that should currently be rendered.
    pub fn visible_buttons(&self) -> impl Iterator<Item = &ScriptButton> {
        self.buttons.iter().filter(|b| b.visible)
    }

    /// Filesystem-safe export filename for this script, without extension.
    pub fn export_file_stem(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if stem.is_empty() { "script".to_string() } else { stem }
    }
}

/// The JSON shape scripts are shared as.
///
/// Exports never carry `enabled` (imports always land disabled) and never
/// carry `id`; imports *may* carry an id so a record exported by other
/// tooling keeps its identity, which is what makes import collisions
/// possible in the first place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptExport {
    /// Optional identity carried by foreign records; never written on export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name.
    pub name: String,

    /// Source text.
    pub content: String,

    /// Documentation blob.
    #[serde(default)]
    pub info: String,

    /// Declared UI buttons.
    #[serde(default)]
    pub buttons: Vec<ScriptButton>,
}

impl ScriptExport {
    /// Parse raw file text into an export record.
    ///
    /// Fails with [`ConfigError::Validation`] when `name` or `content` is
    /// missing or empty, before any further processing.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let record: ScriptExport = serde_json::from_str(raw)?;
        if record.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "imported script has no name".to_string(),
            ));
        }
        if record.content.is_empty() {
            return Err(ConfigError::Validation(format!(
                "imported script '{}' has no content",
                record.name
            )));
        }
        Ok(record)
    }

    /// Materialize a [`Script`] from this record.
    ///
    /// Keeps a carried id, otherwise mints a fresh one. Imports always
    /// start disabled.
    pub fn into_script(self) -> Script {
        Script {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: self.name,
            content: self.content,
            info: self.info,
            enabled: false,
            buttons: self.buttons,
        }
    }
}

impl From<&Script> for ScriptExport {
    fn from(script: &Script) -> Self {
        Self {
            id: None,
            name: script.name.clone(),
            content: script.content.clone(),
            info: script.info.clone(),
            buttons: script.buttons.clone(),
        }
    }
}
