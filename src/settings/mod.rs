//! Settings module
//!
//! Configuration is read from a TOML or YAML file and then overridden by the
//! service environment variables.

pub mod settings_struct;

use thiserror::Error;

pub use settings_struct::{
    set_current, update_settings_from_content, update_settings_from_file, PanelSettings,
    RenderSettings, ServerSettings, Settings, GLOBAL,
};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings are neither valid TOML nor YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
