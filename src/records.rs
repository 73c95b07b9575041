//! Node record store
//!
//! The database side of the migration: look a node up by identity and attach
//! its repository metadata. The engine never talks to this directly; the
//! runner applies documents once the whole migration has succeeded.

use crate::error::StorageError;
use crate::metadata::MetadataDocument;
use crate::types::Identity;
use serde::{Deserialize, Serialize};
use std::path::Path;

const NODES_TREE: &str = "nodes";

/// NodeRecord: the fields of a node the migration reads or writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub identity: Identity,
    pub node_type: String,
    #[serde(default)]
    pub repository_metadata: MetadataDocument,
}

impl NodeRecord {
    pub fn new(identity: Identity, node_type: impl Into<String>) -> Self {
        Self {
            identity,
            node_type: node_type.into(),
            repository_metadata: MetadataDocument::default(),
        }
    }
}

/// NodeRecord Store interface
pub trait NodeRecordStore {
    fn find_by_identity(&self, identity: &Identity) -> Result<Option<NodeRecord>, StorageError>;

    fn put(&self, record: &NodeRecord) -> Result<(), StorageError>;

    /// Replace the repository metadata of an existing node.
    fn update_repository_metadata(
        &self,
        identity: &Identity,
        metadata: &MetadataDocument,
    ) -> Result<(), StorageError> {
        let mut record = self
            .find_by_identity(identity)?
            .ok_or_else(|| StorageError::NodeNotFound(identity.clone()))?;
        record.repository_metadata = metadata.clone();
        self.put(&record)
    }
}

/// Records kept as JSON values in a sled tree keyed by identity.
pub struct SledNodeRecordStore {
    tree: sled::Tree,
}

impl SledNodeRecordStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, StorageError> {
        Ok(Self {
            tree: db.open_tree(NODES_TREE)?,
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.tree.flush()?;
        Ok(())
    }
}

impl NodeRecordStore for SledNodeRecordStore {
    fn find_by_identity(&self, identity: &Identity) -> Result<Option<NodeRecord>, StorageError> {
        match self.tree.get(identity.as_str())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn put(&self, record: &NodeRecord) -> Result<(), StorageError> {
        let value = serde_json::to_vec(record)?;
        self.tree.insert(record.identity.as_str(), value)?;
        Ok(())
    }
}
