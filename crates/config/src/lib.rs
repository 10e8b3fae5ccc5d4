// Configuration loading

pub mod settings;

pub use settings::{HistorySettings, SettingsError};
