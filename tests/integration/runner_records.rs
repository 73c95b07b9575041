use crate::integration::support::{identity, legacy_root, write_bare_node, write_node};
use reposhift::config::MigrationConfig;
use reposhift::records::{NodeRecord, NodeRecordStore, SledNodeRecordStore};
use reposhift::report::CollectingReporter;
use reposhift::shard::SUBFOLDER_PATH;
use reposhift::{run_repository_migration, ApiError, MigrationError, StoreError, StoreKey};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const KNOWN: &str = "0a0b0000000000000000000000000001";
const ORPHAN: &str = "0a0b0000000000000000000000000002";
const BARE: &str = "0c0d0000000000000000000000000003";

fn records() -> SledNodeRecordStore {
    let db = sled::Config::new().temporary(true).open().unwrap();
    SledNodeRecordStore::from_db(&db).unwrap()
}

#[test]
fn applies_metadata_and_reports_irregularities() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    let known = identity(KNOWN);
    let orphan = identity(ORPHAN);
    let bare = identity(BARE);
    write_node(&root, &known, SUBFOLDER_PATH, &[("in.txt", "input")]);
    write_node(&root, &orphan, SUBFOLDER_PATH, &[("other.txt", "other")]);
    write_bare_node(&root, &bare);

    let records = records();
    records.put(&NodeRecord::new(known.clone(), "data.core.singlefile")).unwrap();
    records.put(&NodeRecord::new(bare.clone(), "data.core.folder")).unwrap();

    let config = MigrationConfig::new(temp.path());
    let mut reporter = CollectingReporter::default();
    let summary = run_repository_migration(&config, &records, &mut reporter).unwrap();

    assert!(summary.performed);
    assert_eq!(summary.migrated_nodes, 1);
    assert_eq!(summary.packed_files, 2);
    assert_eq!(summary.orphaned_folders, vec![orphan.clone()]);
    assert_eq!(summary.missing_subfolders, vec![bare.clone()]);
    assert_eq!(summary.diagnostic_logs.len(), 2);

    let updated = records.find_by_identity(&known).unwrap().unwrap();
    let key = StoreKey::for_hash(&blake3::hash(b"input"));
    assert_eq!(
        updated.repository_metadata.to_json().unwrap(),
        json!({"o": {"in.txt": {"k": key.as_str()}}})
    );
    let untouched = records.find_by_identity(&bare).unwrap().unwrap();
    assert_eq!(untouched.repository_metadata.to_json().unwrap(), json!({}));
    assert!(records.find_by_identity(&orphan).unwrap().is_none());

    for log in &summary.diagnostic_logs {
        assert!(log.starts_with(config.diagnostics_dir()));
    }
    let missing_log = summary
        .diagnostic_logs
        .iter()
        .find(|p| p.to_string_lossy().contains("missing-subfolder"))
        .unwrap();
    assert!(fs::read_to_string(missing_log).unwrap().contains(&bare.hyphenated()));

    let warnings = reporter.warnings();
    assert!(warnings.iter().any(|w| w.contains(&orphan.hyphenated())));
    assert!(warnings.iter().any(|w| w.contains("migrated the file repository of 1 nodes")));

    // Legacy data stays where it was.
    assert!(root.exists());
}

#[test]
fn no_legacy_repository_is_a_no_op() {
    let temp = TempDir::new().unwrap();
    let records = records();
    let config = MigrationConfig::new(temp.path());
    let mut reporter = CollectingReporter::default();

    let summary = run_repository_migration(&config, &records, &mut reporter).unwrap();
    assert!(!summary.performed);
    assert_eq!(summary.migrated_nodes, 0);
    assert!(reporter.infos()[0].contains("nothing to migrate"));
    assert!(!config.container_path().exists());
}

#[test]
fn rerun_against_populated_container_fails_without_touching_records() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    let known = identity(KNOWN);
    write_node(&root, &known, SUBFOLDER_PATH, &[("in.txt", "input")]);

    let records = records();
    records.put(&NodeRecord::new(known.clone(), "data.core.singlefile")).unwrap();
    let config = MigrationConfig::new(temp.path());

    run_repository_migration(&config, &records, &mut CollectingReporter::default()).unwrap();
    let before = records.find_by_identity(&known).unwrap();

    fs::write(root.join("0a/0b/0000000000000000000000000001/path/new.txt"), "late").unwrap();
    let err = run_repository_migration(&config, &records, &mut CollectingReporter::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Migration(MigrationError::StorePopulated { .. })
    ));
    assert_eq!(records.find_by_identity(&known).unwrap(), before);
}

#[test]
fn duplicate_identity_folders_are_logged_not_lost() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    let hyphenated = root.join("01/23/4567-89ab-cdef-0123-456789abcdef");
    let plain = root.join("01/23/456789abcdef0123456789abcdef");
    fs::create_dir_all(hyphenated.join(SUBFOLDER_PATH)).unwrap();
    fs::create_dir_all(plain.join(SUBFOLDER_PATH)).unwrap();
    fs::write(hyphenated.join("path/from_hyphenated.txt"), "a").unwrap();
    fs::write(plain.join("path/from_plain.txt"), "b").unwrap();

    let id = identity("0123456789abcdef0123456789abcdef");
    let records = records();
    records.put(&NodeRecord::new(id.clone(), "data.core.folder")).unwrap();

    let config = MigrationConfig::new(temp.path());
    let mut reporter = CollectingReporter::default();
    let summary = run_repository_migration(&config, &records, &mut reporter).unwrap();

    assert_eq!(summary.migrated_nodes, 1);
    assert_eq!(summary.packed_files, 1);
    assert_eq!(summary.duplicate_identities, vec![id.clone()]);

    let log = summary
        .diagnostic_logs
        .iter()
        .find(|p| p.to_string_lossy().contains("duplicate-identities"))
        .unwrap();
    let content = fs::read_to_string(log).unwrap();
    assert!(content.contains(&id.hyphenated()));
    assert!(content.contains(&plain.display().to_string()));
    assert!(reporter
        .warnings()
        .iter()
        .any(|w| w.contains(&plain.display().to_string())));
    assert!(plain.join("path/from_plain.txt").exists());
}

#[cfg(target_os = "linux")]
#[test]
fn unreadable_file_aborts_run_and_leaves_records_untouched() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    let known = identity(KNOWN);
    let broken = identity(BARE);
    write_node(&root, &known, SUBFOLDER_PATH, &[("in.txt", "input")]);
    let dir = write_node(&root, &broken, SUBFOLDER_PATH, &[("ok.txt", "fine")]);
    // Stats as a regular file, but reading from offset 0 fails with EIO.
    std::os::unix::fs::symlink("/proc/self/mem", dir.join("unreadable.bin")).unwrap();

    let records = records();
    records.put(&NodeRecord::new(known.clone(), "data.core.singlefile")).unwrap();
    records.put(&NodeRecord::new(broken.clone(), "data.core.folder")).unwrap();

    let config = MigrationConfig::new(temp.path());
    let mut reporter = CollectingReporter::default();
    let err = run_repository_migration(&config, &records, &mut reporter).unwrap_err();

    assert!(matches!(
        err,
        ApiError::Migration(MigrationError::Store(StoreError::Stream { .. }))
    ));
    for id in [&known, &broken] {
        let record = records.find_by_identity(id).unwrap().unwrap();
        assert_eq!(record.repository_metadata.to_json().unwrap(), json!({}));
    }
    assert!(!reporter
        .warnings()
        .iter()
        .any(|w| w.contains("migrated the file repository")));
}
