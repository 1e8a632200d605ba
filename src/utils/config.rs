use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "ON_API_URL";

const CONFIG_FILE: &str = "config.yaml";
const APP_DIR: &str = "on-api-tester";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// API base URL without trailing slash, e.g. `https://school.myschoolapp.com/api`
    pub api: Option<String>,

    /// Endpoint catalog; the built-in ON API catalog when unset
    pub catalog: Option<PathBuf>,

    /// Per-request timeout. Unset leaves the HTTP client default in place.
    pub timeout_secs: Option<u64>,

    pub user_agent: Option<String>,

    /// Output directory for reports
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: None,
            catalog: None,
            timeout_secs: None,
            user_agent: Some(format!("on-api-tester/{}", env!("CARGO_PKG_VERSION"))),
            output_dir: PathBuf::from("./output"),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit file must exist. Otherwise the per-user config file is used
    /// when present. `ON_API_URL` overrides the file's `api`.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::user_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        if let Ok(api) = std::env::var(API_URL_ENV) {
            if !api.trim().is_empty() {
                config.api = Some(api);
            }
        }

        config.normalize();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.normalize();
        Ok(config)
    }

    /// `<config dir>/on-api-tester/config.yaml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    fn normalize(&mut self) {
        if let Some(api) = self.api.take() {
            let trimmed = api.trim().trim_end_matches('/').to_string();
            if !trimmed.is_empty() {
                self.api = Some(trimmed);
            }
        }
    }
}
