//! ConfigLoader facade over the configuration sources.

use super::sources;
use super::{MigrationConfig, CONFIG_FILE_NAME};
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a repository root, with environment overlay.
    /// Precedence: defaults and repository argument (lowest) ->
    /// `<repository>/reposhift.toml` if present -> environment (highest).
    pub fn load(repository_path: &Path) -> Result<MigrationConfig, ConfigError> {
        let builder = sources::builder_with_defaults()?
            .set_default("repository_path", repository_path.to_string_lossy().to_string())?;
        let builder =
            sources::add_optional_file(builder, &repository_path.join(CONFIG_FILE_NAME))?;
        let builder = sources::add_environment(builder)?;

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<MigrationConfig, ConfigError> {
        let builder = sources::builder_with_defaults()?;
        let builder = sources::add_file(builder, path)?;
        let builder = sources::add_environment(builder)?;

        builder.build()?.try_deserialize()
    }
}
