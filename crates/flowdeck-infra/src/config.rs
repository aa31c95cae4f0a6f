//! Console configuration loader for Flowdeck.
//!
//! Reads `config.toml` from the data directory (`~/.flowdeck/` in production)
//! and deserializes it into [`ConsoleConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed. Environment variables override the
//! file for the settings that differ per deployment.

use std::path::{Path, PathBuf};

use flowdeck_types::config::ConsoleConfig;

/// Resolve the data directory: `FLOWDECK_DATA_DIR` when set, otherwise
/// `~/.flowdeck`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLOWDECK_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flowdeck")
}

/// Root of the git-backed workflow repository.
pub fn resolve_repo_dir(config: &ConsoleConfig, data_dir: &Path) -> PathBuf {
    config
        .workflow
        .repo_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("workflow-repo"))
}

/// Load console configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`ConsoleConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
///
/// `FLOWDECK_DS_URL`, `FLOWDECK_DS_TOKEN`, and `FLOWDECK_REPO_DIR` override
/// the corresponding file settings in every case.
pub async fn load_console_config(data_dir: &Path) -> ConsoleConfig {
    let config_path = data_dir.join("config.toml");

    let mut config = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => match toml::from_str::<ConsoleConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}: {err}, using defaults",
                    config_path.display()
                );
                ConsoleConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            ConsoleConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            ConsoleConfig::default()
        }
    };

    apply_env_overrides(&mut config);
    config
}

fn apply_env_overrides(config: &mut ConsoleConfig) {
    if let Ok(url) = std::env::var("FLOWDECK_DS_URL") {
        config.ds.url = url;
    }
    if let Ok(token) = std::env::var("FLOWDECK_DS_TOKEN") {
        config.ds.token = token;
    }
    if let Ok(dir) = std::env::var("FLOWDECK_REPO_DIR") {
        config.workflow.repo_dir = Some(PathBuf::from(dir));
    }
}
