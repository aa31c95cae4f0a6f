//! Console configuration types for Flowdeck.
//!
//! `ConsoleConfig` represents the top-level `config.toml` that points the
//! console at the workflow repository and the upstream scheduler.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Flowdeck console.
///
/// Loaded from `{data_dir}/config.toml`. All fields have sensible defaults,
/// so an empty or missing file yields a runnable local setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default)]
    pub ds: DsConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Local workflow store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Root of the git-backed workflow repository. When unset, the loader
    /// resolves `{data_dir}/workflow-repo`.
    #[serde(default)]
    pub repo_dir: Option<PathBuf>,
}

/// Upstream scheduler connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsConfig {
    /// Base URL of the upstream scheduler API.
    #[serde(default = "default_ds_url")]
    pub url: String,

    /// Access token sent in the `token` header on every call.
    #[serde(default)]
    pub token: String,
}

fn default_ds_url() -> String {
    "http://localhost:12345/dolphinscheduler".to_string()
}

impl Default for DsConfig {
    fn default() -> Self {
        Self {
            url: default_ds_url(),
            token: String::new(),
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
