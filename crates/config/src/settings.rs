// History view settings
// Loaded from ~/.config/revgrid/settings.json (or an explicit .json/.toml path)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default `strftime` pattern for revision timestamps: "Sep 9, 2023, 2:00 PM"
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%b %-d, %Y, %-I:%M %p";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Revisions exposed per page of the history list
    #[serde(rename = "history.pageSize")]
    pub page_size: usize,

    /// Reload from the authoritative snapshot without asking when the
    /// revision chain has a gap
    #[serde(rename = "history.autoReloadFromSnapshot")]
    pub auto_reload_from_snapshot: bool,

    /// Offset applied to UTC revision timestamps before display
    #[serde(rename = "history.utcOffsetMinutes")]
    pub utc_offset_minutes: i32,

    #[serde(rename = "history.timestampFormat")]
    pub timestamp_format: String,

    /// Report every materialized document to the diagnostics sink
    #[serde(rename = "history.debug")]
    pub debug: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            auto_reload_from_snapshot: true,
            utc_offset_minutes: 0,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            debug: false,
        }
    }
}

/// Error type for settings loading.
#[derive(Debug)]
pub enum SettingsError {
    Io(String),
    Parse(String),
    /// A value parsed but makes no sense (e.g. a zero page size)
    Invalid(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(msg) => write!(f, "I/O error: {}", msg),
            SettingsError::Parse(msg) => write!(f, "Parse error: {}", msg),
            SettingsError::Invalid(msg) => write!(f, "Invalid setting: {}", msg),
        }
    }
}

impl std::error::Error for SettingsError {}

impl HistorySettings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("revgrid")
            .join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Error loading {}: {}", path.display(), e);
                log::warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from an explicit path. `.toml` files are parsed as TOML,
    /// anything else as JSON with `//` comment lines.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;
        let settings = if path.extension().is_some_and(|ext| ext == "toml") {
            Self::from_toml(&contents)?
        } else {
            Self::from_json(&contents)?
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json(contents: &str) -> Result<Self, SettingsError> {
        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// TOML uses a `[history]` table instead of dotted keys.
    pub fn from_toml(contents: &str) -> Result<Self, SettingsError> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct TomlFile {
            history: TomlHistory,
        }

        #[derive(Deserialize)]
        #[serde(default, rename_all = "snake_case")]
        struct TomlHistory {
            page_size: usize,
            auto_reload_from_snapshot: bool,
            utc_offset_minutes: i32,
            timestamp_format: String,
            debug: bool,
        }

        impl Default for TomlHistory {
            fn default() -> Self {
                let d = HistorySettings::default();
                Self {
                    page_size: d.page_size,
                    auto_reload_from_snapshot: d.auto_reload_from_snapshot,
                    utc_offset_minutes: d.utc_offset_minutes,
                    timestamp_format: d.timestamp_format,
                    debug: d.debug,
                }
            }
        }

        let file: TomlFile =
            toml::from_str(contents).map_err(|e| SettingsError::Parse(e.to_string()))?;
        let h = file.history;
        Ok(Self {
            page_size: h.page_size,
            auto_reload_from_snapshot: h.auto_reload_from_snapshot,
            utc_offset_minutes: h.utc_offset_minutes,
            timestamp_format: h.timestamp_format,
            debug: h.debug,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.page_size == 0 {
            return Err(SettingsError::Invalid("history.pageSize must be at least 1".into()));
        }
        // UTC offsets range from -12:00 to +14:00
        if !(-12 * 60..=14 * 60).contains(&self.utc_offset_minutes) {
            return Err(SettingsError::Invalid(format!(
                "history.utcOffsetMinutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        if self.timestamp_format.trim().is_empty() {
            return Err(SettingsError::Invalid("history.timestampFormat is empty".into()));
        }
        Ok(())
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(&path, json).map_err(|e| e.to_string())
    }
}
