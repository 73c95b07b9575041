//! Error types for the migration pipeline.

use crate::types::Identity;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a virtual repository tree.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("path already present in virtual repository: {}", .0.display())]
    DuplicatePath(PathBuf),

    #[error("path component {component} of {} is a file, not a directory", .path.display())]
    NotADirectory { path: PathBuf, component: String },

    #[error("file name is not valid UTF-8: {0:?}")]
    NonUtf8Name(PathBuf),

    #[error("path must be relative and non-empty: {0:?}")]
    InvalidPath(PathBuf),

    #[error("failed to walk source tree {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by pack stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pack container already initialised at {}", .0.display())]
    AlreadyInitialised(PathBuf),

    #[error("pack container not initialised at {}", .0.display())]
    NotInitialised(PathBuf),

    #[error("failed to read stream {description}: {source}")]
    Stream {
        description: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object not found: {0}")]
    UnknownKey(String),

    #[error("store returned {actual} keys for {expected} streams")]
    KeyCountMismatch { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] sled::Error),

    #[error("index entry encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("container config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Errors raised by the node record store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record store error: {0}")]
    Database(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("node not found: {0}")]
    NodeNotFound(Identity),
}

/// Errors that abort a repository migration.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("target pack store already holds {count} objects; refusing to migrate into it")]
    StorePopulated { count: u64 },

    #[error("failed to scan legacy repository at {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build virtual repository for node {identity}: {source}")]
    Tree {
        identity: Identity,
        #[source]
        source: TreeError,
    },

    #[error("bulk pack failed: {0}")]
    Store(#[from] StoreError),

    #[error("metadata of node {identity} has no directory at {path}")]
    DocumentPath { identity: Identity, path: String },
}

/// Top-level error for the migration entry point.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Diagnostics error: {0}")]
    Diagnostics(#[from] std::io::Error),
}
