//! Repository migration engine
//!
//! Moves every node folder of a legacy sharded repository into a pack store in
//! one pass:
//!
//! 1. scan the legacy shards for node folders; stop here if there are none
//! 2. make sure the target store is initialised and empty
//! 3. per node: build the virtual tree, keep its metadata document, queue its
//!    files on one global list, reset the tree
//! 4. pack the global list with a single store call
//! 5. write each returned key back into its node's document
//!
//! Keys are matched to files by position, so any failure in step 4 aborts the
//! whole run. Nothing is written to node records here; that happens in
//! [`runner`] once the engine has returned.

pub mod runner;

use crate::error::MigrationError;
use crate::metadata::MetadataDocument;
use crate::pack::{ContentAddressedPacker, PackStore};
use crate::report::Reporter;
use crate::shard::{DuplicateIdentity, LegacyShardScanner, MissingSubfolder};
use crate::tree::{ContentKey, LazyOpener, VirtualRepositoryTree};
use crate::types::Identity;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata produced for every migrated node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Identity -> fully resolved metadata document. Nodes without files map to `{}`.
    pub metadata: BTreeMap<Identity, MetadataDocument>,
    /// Node folders left out because they hold neither `path` nor `raw_input`.
    pub missing_subfolders: Vec<MissingSubfolder>,
    /// Node folders left out because their identity was already migrated from
    /// another folder.
    pub duplicate_identities: Vec<DuplicateIdentity>,
    /// Files packed across all nodes, duplicates included.
    pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// The legacy basepath does not exist.
    NothingToMigrate { basepath: PathBuf },
    Migrated(MigrationReport),
}

/// One file queued for the bulk pack.
struct QueuedFile {
    identity: Identity,
    parts: Vec<String>,
}

pub struct RepositoryMigrationEngine {
    scanner: LegacyShardScanner,
    compress: bool,
}

impl RepositoryMigrationEngine {
    /// Engine over the legacy node root (`<repository>/repository/node`).
    pub fn new(legacy_node_root: impl Into<PathBuf>) -> Self {
        Self {
            scanner: LegacyShardScanner::new(legacy_node_root),
            compress: true,
        }
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn legacy_node_root(&self) -> &Path {
        self.scanner.basepath()
    }

    pub fn migrate<S: PackStore>(
        &self,
        store: &mut S,
        reporter: &mut dyn Reporter,
    ) -> Result<MigrationOutcome, MigrationError> {
        let scan = self.scanner.scan(reporter)?;
        if !scan.basepath_found {
            return Ok(MigrationOutcome::NothingToMigrate {
                basepath: self.scanner.basepath().to_path_buf(),
            });
        }
        prepare_store(store)?;
        info!(nodes = scan.entities.len(), "discovered legacy node folders");

        let mut tree = VirtualRepositoryTree::new();
        let mut metadata = BTreeMap::new();
        let mut queued: Vec<QueuedFile> = Vec::new();
        let mut streams: Vec<LazyOpener> = Vec::new();

        for (identity, dirpath) in &scan.entities {
            let inserted = tree
                .insert_tree(dirpath)
                .map_err(|source| MigrationError::Tree {
                    identity: identity.clone(),
                    source,
                })?;
            metadata.insert(identity.clone(), tree.serialize());

            for (relative, opener) in tree.pending_files() {
                queued.push(QueuedFile {
                    identity: identity.clone(),
                    parts: path_parts(&relative),
                });
                streams.push(opener.clone());
            }
            debug!(node = %identity, files = inserted, "queued node files");

            tree.reset();
        }

        let keys = ContentAddressedPacker::new(store).pack(&streams, self.compress)?;
        drop(streams);

        for (key, file) in keys.into_iter().zip(&queued) {
            let document = metadata
                .get_mut(&file.identity)
                .ok_or_else(|| MigrationError::DocumentPath {
                    identity: file.identity.clone(),
                    path: file.parts.join("/"),
                })?;
            document
                .set_key(&file.parts, ContentKey::Resolved(key))
                .map_err(|conflict| MigrationError::DocumentPath {
                    identity: file.identity.clone(),
                    path: conflict.path,
                })?;
        }

        info!(
            nodes = metadata.len(),
            files = queued.len(),
            "resolved repository metadata"
        );
        Ok(MigrationOutcome::Migrated(MigrationReport {
            metadata,
            missing_subfolders: scan.missing_subfolders,
            duplicate_identities: scan.duplicate_identities,
            file_count: queued.len(),
        }))
    }
}

/// Initialise the store if needed; refuse one that already holds objects.
fn prepare_store<S: PackStore>(store: &mut S) -> Result<(), MigrationError> {
    if !store.is_initialised() {
        store.init()?;
        return Ok(());
    }
    let count = store.count_objects()?;
    if count > 0 {
        return Err(MigrationError::StorePopulated { count });
    }
    Ok(())
}

fn path_parts(relative: &Path) -> Vec<String> {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}
