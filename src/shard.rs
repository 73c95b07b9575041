//! Legacy shard scanner
//!
//! The legacy repository keeps one folder per node under
//! `<basepath>/<xx>/<yy>/<rest>`, where the three segments concatenate to the
//! node identity. A node's files live in its `path` subfolder, or in
//! `raw_input` for older calculation nodes.

use crate::error::MigrationError;
use crate::report::Reporter;
use crate::types::{is_lower_hex, Identity};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Preferred content subfolder of a legacy node folder.
pub const SUBFOLDER_PATH: &str = "path";
/// Fallback content subfolder, used by older calculation nodes.
pub const SUBFOLDER_RAW_INPUT: &str = "raw_input";

/// A node folder holding neither content subfolder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSubfolder {
    pub identity: Identity,
    pub dirpath: PathBuf,
}

/// A second node folder decoding to an identity already discovered.
///
/// Happens when both the hyphen-free and the hyphenated layout exist for one
/// node. The first folder in name order is migrated; this one is left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateIdentity {
    pub identity: Identity,
    pub dirpath: PathBuf,
    /// Content folder that was kept for the identity.
    pub kept: PathBuf,
}

/// Result of scanning a legacy node root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// False when the basepath does not exist; nothing to migrate.
    pub basepath_found: bool,
    /// Identity -> absolute path of the node's content folder, in identity order.
    pub entities: BTreeMap<Identity, PathBuf>,
    pub missing_subfolders: Vec<MissingSubfolder>,
    pub duplicate_identities: Vec<DuplicateIdentity>,
}

/// Walks the three shard levels of a legacy node repository.
pub struct LegacyShardScanner {
    basepath: PathBuf,
}

impl LegacyShardScanner {
    pub fn new(basepath: impl Into<PathBuf>) -> Self {
        Self {
            basepath: basepath.into(),
        }
    }

    pub fn basepath(&self) -> &Path {
        &self.basepath
    }

    /// Discover every node folder below the basepath.
    ///
    /// Names that do not fit the shard pattern are skipped without comment.
    /// Node folders lacking a content subfolder are reported and listed in
    /// [`ScanOutcome::missing_subfolders`]. A node folder whose identity was
    /// already found is reported and listed in
    /// [`ScanOutcome::duplicate_identities`]. Only I/O failures are errors.
    pub fn scan(&self, reporter: &mut dyn Reporter) -> Result<ScanOutcome, MigrationError> {
        let mut outcome = ScanOutcome::default();

        if !self.basepath.is_dir() {
            reporter.info(&format!(
                "could not find the repository basepath {}: nothing to migrate",
                self.basepath.display()
            ));
            return Ok(outcome);
        }
        outcome.basepath_found = true;

        for shard_one in self.subdirectories(&self.basepath, is_sub_level)? {
            for shard_two in self.subdirectories(&shard_one, is_sub_level)? {
                for shard_three in self.subdirectories(&shard_two, is_final_level)? {
                    let Some(identity) = identity_from_shards(&shard_one, &shard_two, &shard_three)
                    else {
                        debug!(path = %shard_three.display(), "skipping malformed shard folder");
                        continue;
                    };

                    match content_subfolder(&shard_three) {
                        Some(content) => match outcome.entities.entry(identity) {
                            Entry::Vacant(slot) => {
                                slot.insert(content);
                            }
                            Entry::Occupied(slot) => {
                                reporter.warn(&format!(
                                    "skipping node repository folder {} as node<{}> was already found at {}",
                                    shard_three.display(),
                                    slot.key().hyphenated(),
                                    slot.get().display()
                                ));
                                outcome.duplicate_identities.push(DuplicateIdentity {
                                    identity: slot.key().clone(),
                                    dirpath: shard_three,
                                    kept: slot.get().clone(),
                                });
                            }
                        },
                        None => {
                            reporter.warn(&format!(
                                "skipping node repository folder {} as it does not contain `{}` nor `{}`",
                                shard_three.display(),
                                SUBFOLDER_PATH,
                                SUBFOLDER_RAW_INPUT
                            ));
                            outcome.missing_subfolders.push(MissingSubfolder {
                                identity,
                                dirpath: shard_three,
                            });
                        }
                    }
                }
            }
        }

        debug!(
            entities = outcome.entities.len(),
            missing = outcome.missing_subfolders.len(),
            duplicates = outcome.duplicate_identities.len(),
            "scanned legacy repository"
        );
        Ok(outcome)
    }

    /// Subdirectories of `dir` whose names match `accept`, sorted by name.
    fn subdirectories(
        &self,
        dir: &Path,
        accept: fn(&str) -> bool,
    ) -> Result<Vec<PathBuf>, MigrationError> {
        let scan_error = |source| MigrationError::Scan {
            path: dir.to_path_buf(),
            source,
        };
        let mut found = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(scan_error)? {
            let entry = entry.map_err(scan_error)?;
            let matches = entry.file_name().to_str().map(accept).unwrap_or(false);
            if matches && entry.path().is_dir() {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}

fn content_subfolder(node_dir: &Path) -> Option<PathBuf> {
    [SUBFOLDER_PATH, SUBFOLDER_RAW_INPUT]
        .iter()
        .map(|name| node_dir.join(name))
        .find(|candidate| candidate.is_dir())
}

fn is_sub_level(name: &str) -> bool {
    name.len() == 2 && name.chars().all(is_lower_hex)
}

/// 28 hex characters (hyphen-free layout) or 32 hex-or-hyphen characters
/// (the hyphenated UUID tail).
fn is_final_level(name: &str) -> bool {
    match name.len() {
        28 => name.chars().all(is_lower_hex),
        32 => name.chars().all(|c| c == '-' || is_lower_hex(c)),
        _ => false,
    }
}

fn identity_from_shards(one: &Path, two: &Path, three: &Path) -> Option<Identity> {
    let mut joined = String::with_capacity(36);
    for segment in [one, two, three] {
        joined.push_str(segment.file_name()?.to_str()?);
    }
    let stripped: String = joined.chars().filter(|c| *c != '-').collect();
    Identity::parse(&stripped)
}

/// Legacy folder of a node: `<basepath>/<xx>/<yy>/<remaining 28>`.
pub fn legacy_node_dirpath(basepath: &Path, identity: &Identity) -> PathBuf {
    let id = identity.as_str();
    basepath.join(&id[0..2]).join(&id[2..4]).join(&id[4..])
}

/// Content subfolder (`path` or `raw_input`) of a node's legacy folder.
pub fn legacy_content_dirpath(basepath: &Path, identity: &Identity, subfolder: &str) -> PathBuf {
    legacy_node_dirpath(basepath, identity).join(subfolder)
}
