//! Reposhift: legacy repository migration
//!
//! Moves the sharded, folder-per-node file repository into a content-addressed
//! pack store and produces, per node, the metadata document that maps the
//! node's virtual file hierarchy onto store keys.

pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod migration;
pub mod pack;
pub mod records;
pub mod report;
pub mod shard;
pub mod tree;
pub mod types;

pub use error::{ApiError, MigrationError, StorageError, StoreError, TreeError};
pub use metadata::MetadataDocument;
pub use migration::runner::{run_repository_migration, MigrationSummary};
pub use migration::{MigrationOutcome, MigrationReport, RepositoryMigrationEngine};
pub use pack::{ContentAddressedPacker, DiskPackContainer, MemoryPackStore, PackStore, StreamOpener};
pub use types::{Identity, StoreKey};
