use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::providers::paysera;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: paysera::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Opening balances per currency code.
    #[serde(default = "default_balances")]
    pub balances: HashMap<String, f64>,
    #[serde(default = "default_sell_currency")]
    pub sell_currency: String,
    #[serde(default = "default_buy_currency")]
    pub buy_currency: String,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Delay between rate fetches, measured from fetch completion.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_balances() -> HashMap<String, f64> {
    HashMap::from([("EUR".to_string(), 1000.0)])
}

fn default_sell_currency() -> String {
    "EUR".to_string()
}

fn default_buy_currency() -> String {
    "USD".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            balances: default_balances(),
            sell_currency: default_sell_currency(),
            buy_currency: default_buy_currency(),
            provider: ProviderConfig::default(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AppConfig {
    /// Loads the default config file, or built-in defaults when none exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "jsbanez", "currex")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
