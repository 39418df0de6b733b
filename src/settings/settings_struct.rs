use std::path::Path;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::SettingsError;

/// Settings structure to hold global configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub panel: PanelSettings,
    pub render: RenderSettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_address: String,
    pub listen_port: u16,
    /// Public host name; `localhost` disables the reverse-proxy guard
    pub host: String,
    /// Leading path segment of subscription routes, without slashes
    pub custom_sub_prefix: String,
    pub log_level: String,
}

/// Upstream panel settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelSettings {
    /// Panel host, optionally with port
    pub domain: String,
    pub token: String,
    /// `http` or `https`
    pub scheme: String,
    pub timeout_secs: u64,
}

/// Document rendering settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Profile title shown by clients; the username is used when empty
    pub profile_title: String,
    pub update_interval_hours: u32,
    pub support_url: String,
    pub selector_group_name: String,
    pub auto_group_name: String,
    /// Emit one selector per node group tag
    pub region_groups: bool,
    pub test_url: String,
    /// Seconds between url-test checks
    pub test_interval: u32,
    /// Wrap the generic URI list in base64
    pub generic_base64: bool,
    pub clash_mixed_port: u16,
}

pub fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

pub fn default_listen_port() -> u16 {
    3010
}

pub fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            host: "localhost".to_string(),
            custom_sub_prefix: "sub".to_string(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PanelSettings {
    fn default() -> Self {
        PanelSettings {
            domain: String::new(),
            token: String::new(),
            scheme: "https".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            profile_title: String::new(),
            update_interval_hours: 12,
            support_url: String::new(),
            selector_group_name: "Proxy".to_string(),
            auto_group_name: "Auto".to_string(),
            region_groups: true,
            test_url: "https://www.gstatic.com/generate_204".to_string(),
            test_interval: 300,
            generic_base64: true,
            clash_mixed_port: 7890,
        }
    }
}

impl Settings {
    /// Create a new settings instance with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current() -> Arc<Settings> {
        GLOBAL
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Parse settings from TOML, falling back to YAML.
    pub fn load_from_content(content: &str) -> Result<Self, SettingsError> {
        let mut settings = match toml::from_str::<Settings>(content) {
            Ok(settings) => settings,
            Err(toml_err) => match serde_yaml::from_str::<Option<Settings>>(content) {
                Ok(settings) => settings.unwrap_or_default(),
                Err(yaml_err) => {
                    log::debug!("Settings are not TOML: {}", toml_err);
                    return Err(SettingsError::Yaml(yaml_err));
                }
            },
        };
        settings.normalize();
        Ok(settings)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Settings::load_from_content(&content)
    }

    /// Apply the service environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(level) = get("LOG_LEVEL") {
            self.server.log_level = level;
        }
        if let Some(port) = get("APP_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.listen_port = port,
                Err(_) => log::warn!("Ignoring invalid APP_PORT value '{}'", port),
            }
        }
        if let Some(host) = get("APP_HOST") {
            self.server.host = host;
        }
        if let Some(prefix) = get("CUSTOM_SUB_PREFIX") {
            self.server.custom_sub_prefix = prefix;
        }
        if let Some(domain) = get("REMNAWAVE_PLAIN_DOMAIN") {
            self.panel.domain = domain;
        }
        if let Some(token) = get("REMNAWAVE_API_TOKEN") {
            self.panel.token = token;
        }
        if let Some(scheme) = get("REQUEST_REMNAWAVE_SCHEME") {
            self.panel.scheme = scheme;
        }
        self.normalize();
    }

    fn normalize(&mut self) {
        if self.server.listen_address.trim().is_empty() {
            self.server.listen_address = default_listen_address();
        }
        if self.server.log_level.trim().is_empty() {
            self.server.log_level = default_log_level();
        }
        self.server.custom_sub_prefix = self.server.custom_sub_prefix.trim_matches('/').to_string();
        self.panel.domain = self
            .panel
            .domain
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        self.panel.scheme = self.panel.scheme.trim().to_ascii_lowercase();
        if self.panel.scheme != "http" {
            self.panel.scheme = "https".to_string();
        }
        if self.render.selector_group_name.trim().is_empty() {
            self.render.selector_group_name = RenderSettings::default().selector_group_name;
        }
        if self.render.auto_group_name.trim().is_empty() {
            self.render.auto_group_name = RenderSettings::default().auto_group_name;
        }
    }
}

// Global settings instance
pub static GLOBAL: LazyLock<RwLock<Arc<Settings>>> =
    LazyLock::new(|| RwLock::new(Arc::new(Settings::new())));

/// Replace the global settings.
pub fn set_current(settings: Settings) {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
}

/// Update settings directly from file path, applying environment overrides
pub fn update_settings_from_file(path: impl AsRef<Path>) -> Result<(), SettingsError> {
    install(Settings::load_from_file(path)?);
    Ok(())
}

/// Update settings from TOML or YAML content, applying environment overrides
pub fn update_settings_from_content(content: &str) -> Result<(), SettingsError> {
    install(Settings::load_from_content(content)?);
    Ok(())
}

fn install(mut settings: Settings) {
    settings.apply_env();
    set_current(settings);
}
