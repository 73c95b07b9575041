//! Migration configuration
//!
//! Every location the migration touches is spelled out here and handed to the
//! engine explicitly; nothing below the entry point reads global state.

mod facade;
mod sources;

pub use facade::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment prefix for configuration overrides (`REPOSHIFT__COMPRESS=false`).
pub const ENV_PREFIX: &str = "REPOSHIFT";

/// Optional per-repository configuration file read by [`ConfigLoader::load`].
pub const CONFIG_FILE_NAME: &str = "reposhift.toml";

fn default_true() -> bool {
    true
}

/// Migration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Root of the profile repository; holds `repository/node` and `container`.
    pub repository_path: PathBuf,

    /// Pack container location; defaults to `<repository_path>/container`.
    #[serde(default)]
    pub container_path: Option<PathBuf>,

    /// Where itemised diagnostic logs go; defaults to `<repository_path>/diagnostics`.
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,

    /// Compress objects while packing (default: true)
    #[serde(default = "default_true")]
    pub compress: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MigrationConfig {
    pub fn new(repository_path: impl Into<PathBuf>) -> Self {
        Self {
            repository_path: repository_path.into(),
            container_path: None,
            diagnostics_dir: None,
            compress: true,
            logging: LoggingConfig::default(),
        }
    }

    /// Legacy per-node folders: `<repository_path>/repository/node`.
    pub fn legacy_node_root(&self) -> PathBuf {
        self.repository_path.join("repository").join("node")
    }

    pub fn container_path(&self) -> PathBuf {
        self.container_path
            .clone()
            .unwrap_or_else(|| self.repository_path.join("container"))
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.diagnostics_dir
            .clone()
            .unwrap_or_else(|| self.repository_path.join("diagnostics"))
    }

    /// Install the global subscriber from the `logging` section; the default
    /// log file is scoped by `repository_path`.
    pub fn init_logging(&self) -> Result<(), ApiError> {
        crate::logging::init_logging(Some(&self.logging), Some(&self.repository_path))
    }
}
