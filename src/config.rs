//! Configuration loading
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables, so a deployment can keep secrets out of the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::notion::MAX_PAGE_SIZE;

pub const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com/v1";
/// API version whose block payloads carry rich text under `text`
pub const DEFAULT_NOTION_VERSION: &str = "2021-08-16";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notion: NotionConfig,
    pub redis: RedisConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    /// Integration token; usually supplied through `NOTION_API_KEY`
    pub api_key: Option<String>,
    pub base_url: String,
    pub version: String,
    /// Results requested per search/list call, capped at 100 by the API
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_NOTION_BASE_URL.to_string(),
            version: DEFAULT_NOTION_VERSION.to_string(),
            page_size: MAX_PAGE_SIZE,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// Upper bound for a single cache command
    pub timeout_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Overall deadline for one full sync; 0 disables it
    pub deadline_secs: u64,
    /// Reap ids of blocks that disappeared from Notion
    pub prune_stale: bool,
    /// Run a full sync before serving
    pub on_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 120,
            prune_stale: true,
            on_start: true,
        }
    }
}

impl Config {
    /// Load configuration from `path` (if given) and apply environment overrides.
    ///
    /// A path that does not exist yields the defaults, mirroring how a fresh
    /// install starts without a config file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to resolve variable names.
    ///
    /// `REDISTOGO_URL` is only consulted when `REDIS_URL` is absent.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("NOTION_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.notion.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = lookup("NOTION_BASE_URL") {
            self.notion.base_url = url;
        }
        if let Some(url) = lookup("REDIS_URL").or_else(|| lookup("REDISTOGO_URL")) {
            self.redis.url = url;
        }
    }

    /// Page size actually sent to Notion
    pub fn page_size(&self) -> u32 {
        self.notion.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn notion_timeout(&self) -> Duration {
        Duration::from_secs(self.notion.timeout_secs)
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.timeout_secs)
    }

    pub fn sync_deadline(&self) -> Option<Duration> {
        (self.sync.deadline_secs > 0).then(|| Duration::from_secs(self.sync.deadline_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_file(Path::new("/nonexistent/dewey.toml")).unwrap();
        assert_eq!(config.notion.base_url, DEFAULT_NOTION_BASE_URL);
        assert_eq!(config.redis.url, DEFAULT_REDIS_URL);
        assert_eq!(config.page_size(), 100);
        assert!(config.sync.prune_stale);
        assert!(config.notion.api_key.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[redis]\nurl = \"redis://cache:6380\"\n\n[sync]\ndeadline_secs = 0"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.redis.url, "redis://cache:6380");
        assert_eq!(config.redis.timeout_secs, 5);
        assert_eq!(config.sync_deadline(), None);
        assert!(config.sync.on_start);
        assert_eq!(config.notion.version, DEFAULT_NOTION_VERSION);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[notion\npage_size = ").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_page_size_is_capped() {
        let mut config = Config::default();
        config.notion.page_size = 500;
        assert_eq!(config.page_size(), 100);
        config.notion.page_size = 0;
        assert_eq!(config.page_size(), 1);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("NOTION_API_KEY", " secret_abc "),
            ("REDIS_URL", "redis://primary:6379"),
            ("REDISTOGO_URL", "redis://redistogo:pw@fallback:9999/"),
        ]));
        assert_eq!(config.notion.api_key.as_deref(), Some("secret_abc"));
        assert_eq!(config.redis.url, "redis://primary:6379");
    }

    #[test]
    fn test_redistogo_fallback() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("REDISTOGO_URL", "redis://redistogo:pw@host:9999/")]));
        assert_eq!(config.redis.url, "redis://redistogo:pw@host:9999/");
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let mut config = Config::default();
        config.notion.api_key = Some("from-file".to_string());
        config.apply_overrides(env(&[("NOTION_API_KEY", "   ")]));
        assert_eq!(config.notion.api_key.as_deref(), Some("from-file"));
    }
}
