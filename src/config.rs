// src/config.rs
//! Service configuration.
//!
//! Resolution order:
//! 1) `$WELLNESS_CONFIG_PATH`
//! 2) `config/wellness.toml`
//! 3) built-in defaults
//!
//! Individual env vars (`WELLNESS_DATA_DIR`, `WELLNESS_REMOTE_URL`,
//! `WELLNESS_USER_ID`, `WELLNESS_REMOTE_TOKEN`, `WELLNESS_AUTOSAVE_MS`) override
//! the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::scoring::ScoreStrategy;

pub const DEFAULT_CONFIG_PATH: &str = "config/wellness.toml";
pub const ENV_CONFIG_PATH: &str = "WELLNESS_CONFIG_PATH";
pub const ENV_DATA_DIR: &str = "WELLNESS_DATA_DIR";
pub const ENV_REMOTE_URL: &str = "WELLNESS_REMOTE_URL";
pub const ENV_USER_ID: &str = "WELLNESS_USER_ID";
pub const ENV_REMOTE_TOKEN: &str = "WELLNESS_REMOTE_TOKEN";
pub const ENV_AUTOSAVE_MS: &str = "WELLNESS_AUTOSAVE_MS";

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_timeout_ms() -> u64 {
    5_000
}
fn default_autosave_ms() -> u64 {
    800
}
fn default_history_days() -> u32 {
    7
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Signed-in account; no user means local-only.
    #[serde(default)]
    pub user_id: Option<String>,
    /// "ENV" means: read from `WELLNESS_REMOTE_TOKEN`.
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_id: None,
            api_token: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScoringConfig {
    #[serde(default)]
    pub default_strategy: ScoreStrategy,
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_strategy: ScoreStrategy::default(),
            history_days: default_history_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AutosaveConfig {
    /// Quiet period before a pending save fires.
    #[serde(default = "default_autosave_ms")]
    pub delay_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_autosave_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing wellness config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading wellness config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Env path → default path → defaults, then env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var(ENV_REMOTE_URL) {
            self.remote.base_url = Some(url);
        }
        if let Ok(user) = std::env::var(ENV_USER_ID) {
            self.remote.user_id = Some(user);
        }
        if let Ok(ms) = std::env::var(ENV_AUTOSAVE_MS) {
            self.autosave.delay_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("{ENV_AUTOSAVE_MS} must be an integer"))?;
        }
        let wants_env_token = self
            .remote
            .api_token
            .as_deref()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("env"));
        if wants_env_token {
            self.remote.api_token = Some(
                std::env::var(ENV_REMOTE_TOKEN)
                    .map_err(|_| anyhow!("Missing {ENV_REMOTE_TOKEN} env var"))?,
            );
        }
        self.sanitize();
        Ok(())
    }

    fn sanitize(&mut self) {
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.remote.base_url) {
            self.remote.base_url = None;
        }
        if blank(&self.remote.user_id) {
            self.remote.user_id = None;
        }
        if self.remote.timeout_ms == 0 {
            self.remote.timeout_ms = default_timeout_ms();
        }
        if self.scoring.history_days == 0 {
            self.scoring.history_days = default_history_days();
        }
    }

    /// Remote mirroring needs both an endpoint and a signed-in user.
    pub fn remote_enabled(&self) -> bool {
        self.remote.base_url.is_some() && self.remote.user_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.autosave.delay_ms, 800);
        assert!(!cfg.remote_enabled());
    }

    #[test]
    fn sections_parse_and_blank_values_are_dropped() {
        let cfg = AppConfig::from_toml_str(
            r#"
[storage]
data_dir = "/tmp/w"

[remote]
base_url = "  "
user_id = "alice"
timeout_ms = 0

[scoring]
default_strategy = "pillar_weighted"
history_days = 30
"#,
        )
        .unwrap();
        assert_eq!(cfg.storage.data_dir, PathBuf::from("/tmp/w"));
        assert_eq!(cfg.remote.base_url, None);
        assert_eq!(cfg.remote.timeout_ms, 5_000);
        assert_eq!(cfg.scoring.default_strategy, ScoreStrategy::PillarWeighted);
        assert_eq!(cfg.scoring.history_days, 30);
    }

    #[test]
    fn bad_strategy_is_an_error() {
        assert!(AppConfig::from_toml_str("[scoring]\ndefault_strategy = \"median\"").is_err());
    }
}
