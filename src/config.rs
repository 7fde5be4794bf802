use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::QueryConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  /// Rows requested per listing page
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Age after which fresh data is refetched on access (unset: only invalidation refreshes)
  pub stale_time_secs: Option<u64>,
  /// How long an unwatched entry is kept before eviction
  #[serde(default = "default_gc_time_secs")]
  pub gc_time_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: None,
      gc_time_secs: default_gc_time_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Directory for log files (defaults to the platform data dir)
  pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

fn default_page_size() -> u32 {
  25
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_gc_time_secs() -> u64 {
  300
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./netcon.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/netcon/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) if p.exists() => Some(p.to_path_buf()),
      Some(p) => return Err(eyre!("Config file not found: {}", p.display())),
      None => Self::find_config_file(),
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/netcon/config.yaml\n\
         with at least:\n\n  api:\n    url: https://ipam.example.com"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("netcon.yaml");
    if local.exists() {
      return Some(local);
    }

    dirs::config_dir()
      .map(|dir| dir.join("netcon").join("config.yaml"))
      .filter(|path| path.exists())
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.page_size == 0 {
      return Err(eyre!("page_size must be greater than zero"));
    }
    Ok(config)
  }

  /// Bearer token for the backend, if one is set.
  pub fn api_token() -> Option<String> {
    std::env::var("NETCON_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  /// Cache timing derived from the `cache` section.
  pub fn query_config(&self) -> QueryConfig {
    QueryConfig {
      stale_time: self
        .cache
        .stale_time_secs
        .and_then(|secs| chrono::Duration::try_seconds(secs as i64)),
      gc_time: Some(Duration::from_secs(self.cache.gc_time_secs)),
    }
  }

  /// Header title: the configured one, else the API host.
  pub fn display_title(&self, host: &str) -> String {
    self
      .title
      .clone()
      .filter(|t| !t.is_empty())
      .unwrap_or_else(|| host.to_string())
  }
}
