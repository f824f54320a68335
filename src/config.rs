use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub recommender: RecommenderConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub snapshots: SnapshotsConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_credential_path")]
    pub store_path: String,
    #[serde(default = "default_slot")]
    pub slot: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageConfig {
    #[serde(default)]
    pub verify_improvement: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotsConfig {
    #[serde(default = "default_snapshot_root")]
    pub root: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("shift-fill/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(endpoint) = overrides.endpoint {
            self.recommender.endpoint = endpoint;
        }
        if let Some(model) = overrides.model {
            self.recommender.model = model;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_credential_path(&self) -> PathBuf {
        expand_tilde(&self.credential.store_path)
    }

    pub fn resolved_snapshot_root(&self) -> PathBuf {
        expand_tilde(&self.snapshots.root)
    }

    pub fn default_template() -> String {
        let template = r#"[recommender]
endpoint = "https://generativelanguage.googleapis.com/v1beta"
model = "gemini-2.0-flash"
timeout_secs = 60
connect_timeout_secs = 10
temperature = 0.2

[credential]
store_path = "~/.config/shift-fill/credentials.json"
slot = "recommender_api_key"

[coverage]
# Recompute after-coverage from proposed shifts instead of the reported improvement.
verify_improvement = false

[snapshots]
root = "~/.local/share/shift-fill/snapshots"

[notify]
webhook_url = ""

[server]
host = "127.0.0.1"
port = 3001
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            store_path: default_credential_path(),
            slot: default_slot(),
        }
    }
}

impl Default for SnapshotsConfig {
    fn default() -> Self {
        Self {
            root: default_snapshot_root(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_temperature() -> f64 {
    0.2
}

fn default_credential_path() -> String {
    "~/.config/shift-fill/credentials.json".to_string()
}

fn default_slot() -> String {
    "recommender_api_key".to_string()
}

fn default_snapshot_root() -> String {
    "~/.local/share/shift-fill/snapshots".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).expect("template parses");
        let defaults = Config::default();
        assert_eq!(parsed.recommender.model, defaults.recommender.model);
        assert_eq!(parsed.credential.slot, defaults.credential.slot);
        assert_eq!(parsed.server.port, defaults.server.port);
        assert!(!parsed.coverage.verify_improvement);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: Config = toml::from_str("[coverage]\nverify_improvement = true\n")
            .expect("partial config parses");
        assert!(parsed.coverage.verify_improvement);
        assert_eq!(parsed.recommender.timeout_secs, 60);
    }

    #[test]
    fn overrides_replace_recommender_target() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            endpoint: Some("http://localhost:8080".to_string()),
            model: None,
        });
        assert_eq!(config.recommender.endpoint, "http://localhost:8080");
        assert_eq!(config.recommender.model, "gemini-2.0-flash");
    }
}
