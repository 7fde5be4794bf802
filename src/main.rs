mod api;
mod app;
mod commands;
mod config;
mod event;
mod form;
mod logging;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "netcon")]
#[command(about = "A terminal console for IPAM networks and virtual machines")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/netcon/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overriding `api.url`
  #[arg(short, long)]
  url: Option<String>,

  /// Rows per listing page, overriding `page_size`
  #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
  page_size: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line overrides
  if let Some(url) = args.url {
    config.api.url = url;
  }
  if let Some(page_size) = args.page_size {
    config.page_size = page_size;
  }

  // Held until exit so buffered log lines are flushed
  let _log_guard = logging::init(&config.logging)?;

  // Initialize and run the app
  let mut app = app::App::new(config).await?;
  app.run().await?;

  Ok(())
}
