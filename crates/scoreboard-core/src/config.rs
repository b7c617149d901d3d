//! Application configuration management.
//!
//! Configuration is stored at `~/.config/scoreboard/config.json`. Missing
//! fields take their defaults, and `SCOREBOARD_*` environment variables
//! override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "scoreboard";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Client storage file name inside the cache directory
const STORAGE_FILE: &str = "storage.json";

const DEFAULT_API_URL: &str = "https://script.google.com/macros/s/AKfycbxTqAwe_PfNoqXBFuXkdcRkvR-p6EUSATCEJWbvIuv1yUhsoiURwrP8lreQSC5tuFz2pg/exec";

pub const ENV_API_URL: &str = "SCOREBOARD_API_URL";
pub const ENV_PROXY_URL: &str = "SCOREBOARD_PROXY_URL";
pub const ENV_DEMO_MODE: &str = "SCOREBOARD_DEMO_MODE";
pub const ENV_DEMO_FALLBACK: &str = "SCOREBOARD_DEMO_FALLBACK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    /// CORS proxy prefix, e.g. `https://corsproxy.io/?`
    pub proxy_url: Option<String>,
    pub demo_mode: bool,
    /// Serve demo data when the live service fails
    pub demo_fallback: bool,
    pub refresh_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub teams_cache_ms: u64,
    pub rating_cache_ms: u64,
    pub request_timeout_secs: u64,
    pub demo_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            proxy_url: None,
            demo_mode: false,
            demo_fallback: true,
            refresh_interval_ms: 10_000,
            poll_interval_ms: 5_000,
            teams_cache_ms: 30_000,
            rating_cache_ms: 5_000,
            request_timeout_secs: 30,
            demo_delay_ms: 300,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load the config file (defaults when absent) and apply environment overrides.
    pub fn load() -> Result<Self> {
        Ok(Self::load_file()?.with_overrides(|name| std::env::var(name).ok()))
    }

    /// Builder form of [`Config::apply_overrides`]. Used on its own for the
    /// defaults when the config file is unreadable.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.apply_overrides(lookup);
        self
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn storage_path(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(STORAGE_FILE))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join("logs"))
    }

    /// Apply `SCOREBOARD_*` overrides read through `lookup`. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(proxy) = lookup(ENV_PROXY_URL) {
            let proxy = proxy.trim();
            self.proxy_url = (!proxy.is_empty()).then(|| proxy.to_string());
        }
        for (name, field) in [
            (ENV_DEMO_MODE, &mut self.demo_mode),
            (ENV_DEMO_FALLBACK, &mut self.demo_fallback),
        ] {
            if let Some(raw) = lookup(name) {
                match parse_flag(&raw) {
                    Some(flag) => *field = flag,
                    None => warn!(variable = name, value = %raw, "Ignoring invalid boolean"),
                }
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn teams_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.teams_cache_ms)
    }

    pub fn rating_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.rating_cache_ms)
    }

    pub fn demo_delay(&self) -> Duration {
        Duration::from_millis(self.demo_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.demo_mode);
        assert!(config.demo_fallback);
        assert_eq!(config.teams_cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.rating_cache_ttl(), Duration::from_secs(5));
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"demo_mode": true}"#).unwrap();
        assert!(config.demo_mode);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            (ENV_API_URL, "http://localhost:8080/exec"),
            (ENV_PROXY_URL, "https://corsproxy.io/?"),
            (ENV_DEMO_MODE, "yes"),
            (ENV_DEMO_FALLBACK, "0"),
        ]));
        assert_eq!(config.api_url, "http://localhost:8080/exec");
        assert_eq!(config.proxy_url.as_deref(), Some("https://corsproxy.io/?"));
        assert!(config.demo_mode);
        assert!(!config.demo_fallback);
    }

    #[test]
    fn test_defaults_still_take_env_overrides() {
        let config = Config::default().with_overrides(env(&[
            (ENV_API_URL, "http://localhost:8080/exec"),
            (ENV_DEMO_MODE, "true"),
        ]));
        assert_eq!(config.api_url, "http://localhost:8080/exec");
        assert!(config.demo_mode);
        assert_eq!(config.teams_cache_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_env_values_ignored() {
        let mut config = Config::default();
        config.apply_overrides(env(&[(ENV_DEMO_MODE, "maybe"), (ENV_PROXY_URL, "  ")]));
        assert!(!config.demo_mode);
        assert_eq!(config.proxy_url, None);
    }
}
