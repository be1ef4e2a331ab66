use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use akahu_sync_providers::{ActualConfig, AkahuConfig, OpenAiConfig, YnabConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Runtime settings, read from a TOML file with `AKAHU_SYNC_`-prefixed
/// environment overrides layered on top. Ledger sections are optional; a run
/// only talks to the ledgers that are configured.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub akahu: AkahuSection,
    #[serde(default)]
    pub ynab: Option<YnabSection>,
    #[serde(default)]
    pub actual: Option<ActualSection>,
    #[serde(default)]
    pub openai: Option<OpenAiSection>,
    #[serde(default)]
    pub sync: SyncSection,
}

#[derive(Debug, Deserialize)]
pub struct AkahuSection {
    pub user_token: String,
    pub app_token: String,
}

#[derive(Debug, Deserialize)]
pub struct YnabSection {
    pub bearer_token: String,
    pub budget_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ActualSection {
    pub server_url: String,
    pub password: String,
    pub sync_id: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiSection {
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncSection {
    /// Overrides the default mapping file location.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from `path` (or the default location when `None`). A
    /// missing file is fine as long as the environment supplies the required
    /// keys.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = config::Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path));
            }
            None => {
                if let Some(default) = default_config_path() {
                    builder = builder
                        .add_source(config::File::from(default.as_path()).required(false));
                }
            }
        }
        builder = builder.add_source(
            config::Environment::with_prefix("AKAHU_SYNC").separator("__"),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.akahu.user_token.is_empty() {
            return Err(ConfigError::Missing("akahu.user_token"));
        }
        if self.akahu.app_token.is_empty() {
            return Err(ConfigError::Missing("akahu.app_token"));
        }
        if self.ynab.is_none() && self.actual.is_none() {
            return Err(ConfigError::Missing(
                "at least one of [ynab] or [actual]",
            ));
        }
        Ok(())
    }

    pub fn akahu_config(&self) -> AkahuConfig {
        AkahuConfig {
            user_token: self.akahu.user_token.clone(),
            app_token: self.akahu.app_token.clone(),
        }
    }

    pub fn ynab_config(&self) -> Option<YnabConfig> {
        self.ynab.as_ref().map(|y| YnabConfig {
            bearer_token: y.bearer_token.clone(),
            budget_id: y.budget_id.clone(),
        })
    }

    pub fn actual_config(&self) -> Option<ActualConfig> {
        self.actual.as_ref().map(|a| ActualConfig {
            server_url: a.server_url.clone(),
            password: a.password.clone(),
            sync_id: a.sync_id.clone(),
        })
    }

    pub fn openai_config(&self) -> Option<OpenAiConfig> {
        self.openai.as_ref().map(|o| {
            let mut config = OpenAiConfig::new(o.api_key.clone());
            if let Some(model) = &o.model {
                config.model = model.clone();
            }
            if let Some(base_url) = &o.base_url {
                config.base_url = base_url.clone();
            }
            config
        })
    }

    /// Where the mapping document lives: explicit override, or the platform
    /// data directory.
    pub fn mapping_path(&self) -> PathBuf {
        if let Some(path) = &self.sync.mapping_file {
            return path.clone();
        }
        default_data_dir().join("akahu_budget_mapping.json")
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("nz", "akahu-sync", "akahu-sync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("nz", "akahu-sync", "akahu-sync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
