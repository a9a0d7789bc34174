use anyhow::{Context, Result};
use chanvid::PartialPolicy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "chanvid.toml";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8081";
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";
pub const DEFAULT_CHUNK_SIZE_KIB: u32 = 512;
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("api_id is not set; add it to the config file or export APP_ID")]
    MissingApiId,
    #[error("invalid api_id '{0}'")]
    InvalidApiId(String),
    #[error("api_hash is not set; add it to the config file or export APP_HASH")]
    MissingApiHash,
    #[error("chunk size must be a multiple of 4 KiB between 4 and 1024 KiB, got {0} KiB")]
    InvalidChunkSize(u32),
    #[error("{0}")]
    InvalidPolicy(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    pub api_url: Option<String>,
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub session_token: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub chunk_size_kib: Option<u32>,
    pub history_limit: Option<u32>,
    pub max_retries: Option<u32>,
    pub on_partial: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub source: Option<PathBuf>,
    pub existed: bool,
    pub data: AppConfig,
}

/// Everything the RPC gateway needs to accept our calls.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    pub session_token: Option<String>,
}

impl AppConfig {
    /// Environment wins over the file, matching the `.env` workflow of
    /// exporting `APP_ID` / `APP_HASH` before a run.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("APP_ID").filter(|value| !value.trim().is_empty()) {
            let parsed = raw
                .trim()
                .parse::<i32>()
                .map_err(|_| ConfigError::InvalidApiId(raw.clone()))?;
            self.api_id = Some(parsed);
        }
        if let Some(hash) = lookup("APP_HASH").filter(|value| !value.trim().is_empty()) {
            self.api_hash = Some(hash.trim().to_string());
        }
        if let Some(url) = lookup("CHANVID_API_URL").filter(|value| !value.trim().is_empty()) {
            self.api_url = Some(url.trim().to_string());
        }
        if let Some(token) = lookup("CHANVID_SESSION_TOKEN").filter(|value| !value.trim().is_empty())
        {
            self.session_token = Some(token.trim().to_string());
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let api_id = match self.api_id {
            Some(id) if id > 0 => id,
            Some(id) => return Err(ConfigError::InvalidApiId(id.to_string())),
            None => return Err(ConfigError::MissingApiId),
        };
        let api_hash = self
            .api_hash
            .as_deref()
            .map(str::trim)
            .filter(|hash| !hash.is_empty())
            .ok_or(ConfigError::MissingApiHash)?
            .to_string();
        Ok(Credentials {
            api_id,
            api_hash,
            session_token: self
                .session_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    pub fn history_limit(&self) -> u32 {
        self.history_limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }

    pub fn partial_policy(&self) -> Result<PartialPolicy, ConfigError> {
        match self.on_partial.as_deref() {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidPolicy),
            None => Ok(PartialPolicy::default()),
        }
    }
}

/// Converts a KiB setting into a request size the protocol accepts.
pub fn chunk_size_bytes(kib: u32) -> Result<u32, ConfigError> {
    if kib == 0 || kib % 4 != 0 || kib > chanvid::MAX_CHUNK_SIZE / 1024 {
        return Err(ConfigError::InvalidChunkSize(kib));
    }
    Ok(kib * 1024)
}

/// Reads `--config` when given, otherwise the per-user config file. A missing
/// file is not an error; every key has a built-in default.
pub fn load_config(path_override: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = config_location(path_override) else {
        return Ok(LoadedConfig {
            source: None,
            existed: false,
            data: AppConfig::default(),
        });
    };
    let stored = read_config_file(&path)?;
    Ok(LoadedConfig {
        existed: stored.is_some(),
        data: stored.unwrap_or_default(),
        source: Some(path),
    })
}

pub fn save_config(path_override: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    let path = config_location(path_override)
        .context("unable to determine configuration directory")?;
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let rendered = toml::to_string_pretty(config).context("failed to serialize configuration")?;
    fs::write(&path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn config_location(path_override: Option<&Path>) -> Option<PathBuf> {
    path_override.map(Path::to_path_buf).or_else(default_config_path)
}

fn read_config_file(path: &Path) -> Result<Option<AppConfig>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    toml::from_str(&raw)
        .map(Some)
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "chanvid").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
