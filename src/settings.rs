//! Persisted application settings.
//!
//! Settings live in a TOML file organised in groups, one table per group:
//!
//! ```toml
//! [Settings_Worksheet]
//! LaTeXEngine = "xelatex"
//! ```
//!
//! The renderer reads exactly one value from it, the engine name under
//! [`WORKSHEET_GROUP`] / [`LATEX_ENGINE_KEY`]. A missing file is an empty
//! store, not an error; only a file that exists but does not parse is.

use crate::error::TexRenderError;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::debug;

/// Group holding worksheet-related settings.
pub const WORKSHEET_GROUP: &str = "Settings_Worksheet";

/// Key of the LaTeX engine name inside [`WORKSHEET_GROUP`].
pub const LATEX_ENGINE_KEY: &str = "LaTeXEngine";

/// Engine used when nothing is configured.
pub const DEFAULT_LATEX_ENGINE: &str = "pdflatex";

/// Overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "TEXRENDER_SETTINGS";

/// Group/key/value settings backed by a TOML file.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    groups: Table,
}

impl SettingsStore {
    /// Default settings location: `$TEXRENDER_SETTINGS`, else
    /// `<config dir>/texrender/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(p) = std::env::var(SETTINGS_PATH_ENV) {
            if !p.is_empty() {
                return Some(PathBuf::from(p));
            }
        }
        dirs::config_dir().map(|d| d.join("texrender").join("settings.toml"))
    }

    /// Load from [`SettingsStore::default_path`], or an empty store when no
    /// location can be determined.
    pub fn load_default() -> Result<Self, TexRenderError> {
        match Self::default_path() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load settings from `path`. A missing file yields an empty store bound
    /// to that path.
    pub fn load_from_file(path: &Path) -> Result<Self, TexRenderError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}", path.display());
                return Ok(Self {
                    path: Some(path.to_path_buf()),
                    groups: Table::new(),
                });
            }
            Err(e) => {
                return Err(TexRenderError::Settings {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })
            }
        };
        let mut store = Self::from_toml_str(&text).map_err(|e| match e {
            TexRenderError::Settings { detail, .. } => TexRenderError::Settings {
                path: path.to_path_buf(),
                detail,
            },
            other => other,
        })?;
        store.path = Some(path.to_path_buf());
        debug!("Loaded settings from {}", path.display());
        Ok(store)
    }

    /// Parse settings from TOML text without binding them to a file.
    pub fn from_toml_str(text: &str) -> Result<Self, TexRenderError> {
        let groups: Table = text.parse().map_err(|e: toml::de::Error| TexRenderError::Settings {
            path: PathBuf::new(),
            detail: e.to_string(),
        })?;
        Ok(Self { path: None, groups })
    }

    /// File this store loads from and saves to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read a string entry, falling back to `default` when the group or key
    /// is absent or not a string.
    pub fn read_entry(&self, group: &str, key: &str, default: &str) -> String {
        self.groups
            .get(group)
            .and_then(Value::as_table)
            .and_then(|t| t.get(key))
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Set a string entry, creating the group if needed.
    pub fn set_entry(&mut self, group: &str, key: &str, value: impl Into<String>) {
        let entry = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        if let Value::Table(t) = entry {
            t.insert(key.to_string(), Value::String(value.into()));
        }
    }

    /// Configured LaTeX engine name. Default: `pdflatex`.
    pub fn latex_engine(&self) -> String {
        self.read_entry(WORKSHEET_GROUP, LATEX_ENGINE_KEY, DEFAULT_LATEX_ENGINE)
    }

    /// Write the store back to its file, creating parent directories.
    pub fn save(&self) -> Result<(), TexRenderError> {
        let path = self.path.as_ref().ok_or_else(|| {
            TexRenderError::InvalidConfig("Settings store has no file path".into())
        })?;
        let settings_err = |detail: String| TexRenderError::Settings {
            path: path.clone(),
            detail,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| settings_err(e.to_string()))?;
        }
        let text = toml::to_string_pretty(&self.groups).map_err(|e| settings_err(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| settings_err(e.to_string()))
    }
}
