use std::fs;
use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client configuration persisted as JSON in the platform data dir.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

pub fn get_app_data_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = dirs::data_dir()
        .ok_or(ConfigError::NoDataDir)?
        .join("Backchannel");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

fn get_config_path() -> Result<PathBuf, ConfigError> {
    Ok(get_app_data_dir()?.join("config.json"))
}

pub fn load_config() -> Result<ClientConfig, ConfigError> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok(ClientConfig::default());
    }

    let content = fs::read_to_string(&config_path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_config(config: &ClientConfig) -> Result<(), ConfigError> {
    let config_path = get_config_path()?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;
    Ok(())
}

pub fn set_api_key(key: &str) -> Result<(), ConfigError> {
    let mut config = load_config().unwrap_or_default();
    config.api_key = Some(key.to_string());
    save_config(&config)
}

impl ClientConfig {
    /// Resolve the effective (base_url, api_key, voice), erroring when no
    /// key is configured.
    pub fn effective(&self) -> Result<(String, String, String), ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let base_url = self
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let voice = self
            .voice
            .clone()
            .unwrap_or_else(|| super::backend::DEFAULT_VOICE.to_string());
        Ok((base_url, api_key, voice))
    }
}
