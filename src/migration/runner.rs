//! Migration step around the engine: runs it against the configured container,
//! attaches the resulting metadata to node records and reports the outcome.

use crate::config::MigrationConfig;
use crate::error::{ApiError, MigrationError};
use crate::migration::{MigrationOutcome, RepositoryMigrationEngine};
use crate::pack::DiskPackContainer;
use crate::records::NodeRecordStore;
use crate::report::{write_diagnostic_log, Reporter};
use crate::types::Identity;
use std::path::PathBuf;
use tracing::info;

/// What the migration step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// False when there was no legacy repository to migrate.
    pub performed: bool,
    /// Nodes whose record received repository metadata.
    pub migrated_nodes: usize,
    pub packed_files: usize,
    /// Legacy folders without a matching node record.
    pub orphaned_folders: Vec<Identity>,
    /// Legacy folders holding neither `path` nor `raw_input`.
    pub missing_subfolders: Vec<Identity>,
    /// Identities found in more than one legacy folder; only the first was migrated.
    pub duplicate_identities: Vec<Identity>,
    /// Diagnostic log files written during the run.
    pub diagnostic_logs: Vec<PathBuf>,
}

/// Migrate the legacy repository described by `config` and apply the result to `records`.
///
/// Records are only touched after the engine has returned successfully, so a
/// failed pack leaves every record as it was.
pub fn run_repository_migration(
    config: &MigrationConfig,
    records: &dyn NodeRecordStore,
    reporter: &mut dyn Reporter,
) -> Result<MigrationSummary, ApiError> {
    let legacy_root = config.legacy_node_root();
    let mut container = DiskPackContainer::open(config.container_path())
        .map_err(MigrationError::from)?;

    let engine = RepositoryMigrationEngine::new(&legacy_root).with_compression(config.compress);
    let report = match engine.migrate(&mut container, reporter)? {
        MigrationOutcome::NothingToMigrate { .. } => return Ok(MigrationSummary::default()),
        MigrationOutcome::Migrated(report) => report,
    };

    let mut summary = MigrationSummary {
        performed: true,
        packed_files: report.file_count,
        missing_subfolders: report
            .missing_subfolders
            .iter()
            .map(|m| m.identity.clone())
            .collect(),
        duplicate_identities: report
            .duplicate_identities
            .iter()
            .map(|d| d.identity.clone())
            .collect(),
        ..MigrationSummary::default()
    };

    for (identity, metadata) in &report.metadata {
        if records.find_by_identity(identity)?.is_none() {
            reporter.warn(&format!(
                "repo contained folder for node<{}>, but the node does not exist, skipping",
                identity.hyphenated()
            ));
            summary.orphaned_folders.push(identity.clone());
            continue;
        }
        records.update_repository_metadata(identity, metadata)?;
        summary.migrated_nodes += 1;
    }

    let diagnostics_dir = config.diagnostics_dir();
    if !report.missing_subfolders.is_empty() {
        let path = write_diagnostic_log(
            &diagnostics_dir,
            "migration-repository-missing-subfolder",
            "# node repository folders without `path` or `raw_input`; not migrated",
            report
                .missing_subfolders
                .iter()
                .map(|m| format!("{} {}", m.identity.hyphenated(), m.dirpath.display())),
        )?;
        reporter.warn(&format!(
            "detected node repository folders that were missing the required subfolder `path` or `raw_input`; \
             the paths of those folders were written to {}",
            path.display()
        ));
        summary.diagnostic_logs.push(path);
    }
    if !report.duplicate_identities.is_empty() {
        let path = write_diagnostic_log(
            &diagnostics_dir,
            "migration-repository-duplicate-identities",
            "# node repository folders whose identity was already migrated from another folder; not migrated",
            report.duplicate_identities.iter().map(|d| {
                format!(
                    "{} {} (kept {})",
                    d.identity.hyphenated(),
                    d.dirpath.display(),
                    d.kept.display()
                )
            }),
        )?;
        reporter.warn(&format!(
            "detected several node repository folders for the same node; the skipped folders were written to {}",
            path.display()
        ));
        summary.diagnostic_logs.push(path);
    }
    if !summary.orphaned_folders.is_empty() {
        let path = write_diagnostic_log(
            &diagnostics_dir,
            "migration-repository-orphaned-folders",
            "# legacy repository folders without a corresponding node; content packed but unreferenced",
            summary.orphaned_folders.iter().map(Identity::hyphenated),
        )?;
        reporter.warn(&format!(
            "detected repository folders for nodes that do not exist; their identities were written to {}",
            path.display()
        ));
        summary.diagnostic_logs.push(path);
    }

    if summary.migrated_nodes > 0 {
        reporter.warn(&format!(
            "migrated the file repository of {} nodes into {}; the legacy repository at {} was kept \
             and can be deleted once the migration is verified",
            summary.migrated_nodes,
            config.container_path().display(),
            legacy_root.display()
        ));
    }

    info!(
        nodes = summary.migrated_nodes,
        files = summary.packed_files,
        orphaned = summary.orphaned_folders.len(),
        missing = summary.missing_subfolders.len(),
        duplicates = summary.duplicate_identities.len(),
        "repository migration finished"
    );
    Ok(summary)
}
