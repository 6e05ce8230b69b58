//! Configuration and data file locations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use pledgekeeper_core::EngineConfig;
use tracing::{debug, info};

const APP_DIR: &str = "pledgekeeper";

/// Default location of the configuration file.
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

/// Load the engine configuration.
///
/// An explicit `path` must exist. Without one, the platform config file is
/// used when present and the defaults otherwise.
pub async fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let (path, required) = path.map_or_else(
        || (default_config_path(), false),
        |p| (p.to_path_buf(), true),
    );

    if !required && !path.exists() {
        debug!(path = %path.display(), "No config file; using defaults");
        return Ok(EngineConfig::default());
    }

    let contents = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Resolve the database file, creating its directory if needed.
///
/// Precedence: the `--database` flag, then `databasePath` from the config,
/// then the platform data directory.
pub async fn database_path(
    flag: Option<&Path>,
    config: &EngineConfig,
) -> anyhow::Result<String> {
    let path = flag
        .map(Path::to_path_buf)
        .or_else(|| config.database_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("pledgekeeper.db")
        });

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("database path {} is not valid UTF-8", path.display()))
}
