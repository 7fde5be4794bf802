use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber, writing to a daily file since the terminal
/// belongs to the UI. `RUST_LOG` overrides the configured level.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
  let dir = log_dir(config);
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "netcon.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&config.level))
    .map_err(|e| eyre!("Invalid log level {:?}: {}", config.level, e))?;

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

fn log_dir(config: &LoggingConfig) -> PathBuf {
  config.dir.clone().unwrap_or_else(|| {
    dirs::data_local_dir()
      .unwrap_or_else(std::env::temp_dir)
      .join("netcon")
      .join("logs")
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_explicit_dir_wins() {
    let config = LoggingConfig {
      level: "debug".to_string(),
      dir: Some(PathBuf::from("/var/log/netcon")),
    };
    assert_eq!(log_dir(&config), PathBuf::from("/var/log/netcon"));
  }

  #[test]
  fn test_default_dir_is_namespaced() {
    let dir = log_dir(&LoggingConfig::default());
    assert!(dir.ends_with("netcon/logs"));
  }
}
