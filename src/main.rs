use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use fetchgate::{app, config, logging};

#[derive(Parser, Debug)]
#[command(name = "fetchgate")]
#[command(about = "Run a scripted session against the cached ledger client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fetchgate/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Employee id selected last during the filter changes
  #[arg(short, long)]
  employee: Option<String>,

  /// Write logs to this directory instead of stderr
  #[arg(long)]
  log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override log directory if specified on command line
  let config = if let Some(log_dir) = args.log_dir {
    config::Config {
      log_dir: Some(log_dir),
      ..config
    }
  } else {
    config
  };

  let _log_guard = logging::init(config.log_dir.as_deref())?;

  let mut app = app::App::new(&config)?;
  app.run(args.employee.as_deref()).await?;

  Ok(())
}
