use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "lanerun=info";

/// Default log file location: $XDG_STATE_HOME/lanerun/lanerun.log, falling
/// back to the data directory.
fn default_log_path() -> Result<PathBuf> {
  let dir = dirs::state_dir()
    .or_else(dirs::data_dir)
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/state")))
    .ok_or_else(|| eyre!("Could not determine log directory"))?;

  Ok(dir.join("lanerun").join("lanerun.log"))
}

/// Send tracing output to a file, since the terminal belongs to the game.
///
/// `RUST_LOG` overrides the default filter. Keep the returned guard alive
/// for the whole run or buffered lines are lost.
pub fn init(log_file: Option<&Path>) -> Result<WorkerGuard> {
  let path = match log_file {
    Some(p) => p.to_path_buf(),
    None => default_log_path()?,
  };

  let dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::never(dir, file_name);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
