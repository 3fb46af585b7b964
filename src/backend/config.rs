use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::twitch::{
    Result, TwitchConfig, TwitchCredentials, TwitchError, EVENTSUB_API_URL, EVENTSUB_WS_URL,
};

const CONFIG_FILE: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub twitch: TwitchSettings,
}

/// `[twitch]` section of config.toml
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TwitchSettings {
    pub user_id: String,
    pub user_token: String,
    pub app_id: String,
    #[serde(default = "default_eventsub_url")]
    pub eventsub_url: String,
    #[serde(default = "default_subscriptions_url")]
    pub subscriptions_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub close_timeout_secs: u64,
}

fn default_eventsub_url() -> String {
    EVENTSUB_WS_URL.to_string()
}

fn default_subscriptions_url() -> String {
    EVENTSUB_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl TwitchSettings {
    pub fn credentials(&self) -> TwitchCredentials {
        TwitchCredentials::new(&self.user_id, &self.user_token, &self.app_id)
    }

    pub fn client_config(&self) -> TwitchConfig {
        TwitchConfig {
            eventsub_url: self.eventsub_url.clone(),
            subscriptions_url: self.subscriptions_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            close_timeout: Duration::from_secs(self.close_timeout_secs),
        }
    }
}

impl AppConfig {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TwitchError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;

        let twitch = &config.twitch;
        for (name, value) in [
            ("user_id", &twitch.user_id),
            ("user_token", &twitch.user_token),
            ("app_id", &twitch.app_id),
        ] {
            if value.trim().is_empty() {
                return Err(TwitchError::ConfigError(format!(
                    "twitch.{} must not be empty",
                    name
                )));
            }
        }

        Ok(config)
    }
}

/// Load the config from `path`, or from config.toml in the project root
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) => path,
        None => project_root::get_project_root()
            .map_err(|e| TwitchError::ConfigError(format!("Project root not found: {}", e)))?
            .join(CONFIG_FILE),
    };

    log::debug!("Loading config from {}", config_path.display());
    AppConfig::from_file(config_path)
}
