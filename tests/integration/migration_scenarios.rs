use crate::integration::support::{identity, legacy_root, write_bare_node, write_node};
use reposhift::report::CollectingReporter;
use reposhift::shard::{SUBFOLDER_PATH, SUBFOLDER_RAW_INPUT};
use reposhift::{
    DiskPackContainer, MemoryPackStore, MigrationError, MigrationOutcome, MigrationReport,
    PackStore, RepositoryMigrationEngine, StoreKey,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const ID_ONE: &str = "aabbcccccccccccccccccccccccccccc";
const ID_TWO: &str = "ddeeffffffffffffffffffffffffffff";

fn migrated<S: PackStore>(root: &std::path::Path, store: &mut S) -> (MigrationReport, CollectingReporter) {
    let mut reporter = CollectingReporter::default();
    let outcome = RepositoryMigrationEngine::new(root)
        .migrate(store, &mut reporter)
        .unwrap();
    match outcome {
        MigrationOutcome::Migrated(report) => (report, reporter),
        other => panic!("expected a migration, got {:?}", other),
    }
}

#[test]
fn identical_content_across_nodes_resolves_to_one_key() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    let one = identity(ID_ONE);
    let two = identity(ID_TWO);
    write_node(&root, &one, SUBFOLDER_PATH, &[("file1.txt", "abc")]);
    write_node(&root, &two, SUBFOLDER_RAW_INPUT, &[("sub/file2.txt", "abc")]);

    let mut container = DiskPackContainer::open(temp.path().join("container")).unwrap();
    let (report, reporter) = migrated(&root, &mut container);

    let key = StoreKey::for_hash(&blake3::hash(b"abc"));
    assert_eq!(report.metadata.len(), 2);
    assert_eq!(
        report.metadata[&one].to_json().unwrap(),
        json!({"o": {"file1.txt": {"k": key.as_str()}}})
    );
    assert_eq!(
        report.metadata[&two].to_json().unwrap(),
        json!({"o": {"sub": {"o": {"file2.txt": {"k": key.as_str()}}}}})
    );
    assert_eq!(report.file_count, 2);
    assert!(report.missing_subfolders.is_empty());
    assert!(reporter.warnings().is_empty());

    assert_eq!(container.count_objects().unwrap(), 1);
    assert_eq!(container.get_object_content(&key).unwrap(), b"abc");
}

#[test]
fn node_without_content_subfolder_is_left_out() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    let kept = identity(ID_ONE);
    let bare = identity(ID_TWO);
    write_node(&root, &kept, SUBFOLDER_PATH, &[("a.txt", "a")]);
    let bare_dir = write_bare_node(&root, &bare);

    let mut store = MemoryPackStore::new();
    let (report, reporter) = migrated(&root, &mut store);

    assert!(report.metadata.contains_key(&kept));
    assert!(!report.metadata.contains_key(&bare));
    assert_eq!(report.missing_subfolders.len(), 1);
    assert_eq!(report.missing_subfolders[0].identity, bare);
    assert_eq!(report.missing_subfolders[0].dirpath, bare_dir);
    assert_eq!(reporter.warnings().len(), 1);
}

#[test]
fn empty_legacy_root_makes_no_pack_call() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    fs::create_dir_all(&root).unwrap();

    let mut store = MemoryPackStore::new();
    let (report, _) = migrated(&root, &mut store);
    assert!(report.metadata.is_empty());
    assert_eq!(store.batch_calls(), 0);
}

#[test]
fn absent_legacy_root_reports_nothing_to_migrate() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());

    let mut store = MemoryPackStore::new();
    let mut reporter = CollectingReporter::default();
    let outcome = RepositoryMigrationEngine::new(&root)
        .migrate(&mut store, &mut reporter)
        .unwrap();

    assert!(matches!(outcome, MigrationOutcome::NothingToMigrate { .. }));
    assert_eq!(reporter.infos().len(), 1);
    assert!(reporter.warnings().is_empty());
}

#[test]
fn all_nodes_are_packed_in_one_batch() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    for (i, id) in [
        "00000000000000000000000000000001",
        "00000000000000000000000000000002",
        "11000000000000000000000000000003",
    ]
    .iter()
    .enumerate()
    {
        let content = format!("node {}", i);
        write_node(
            &root,
            &identity(id),
            SUBFOLDER_PATH,
            &[("x.txt", content.as_str()), ("nested/y.txt", "shared")],
        );
    }

    let mut store = MemoryPackStore::new();
    let (report, _) = migrated(&root, &mut store);
    assert_eq!(store.batch_calls(), 1);
    assert_eq!(report.file_count, 6);
    // three distinct x.txt plus one shared y.txt
    assert_eq!(store.count_objects().unwrap(), 4);
    for document in report.metadata.values() {
        assert_eq!(document.count_files(), 2);
        assert!(document.is_resolved());
    }
}

#[test]
fn resolved_documents_mirror_directory_shape() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    let id = identity(ID_ONE);
    let dir = write_node(
        &root,
        &id,
        SUBFOLDER_PATH,
        &[
            ("top.dat", "1"),
            ("a/b/c/deep.dat", "2"),
            ("a/side.dat", "3"),
        ],
    );
    fs::create_dir_all(dir.join("a/empty")).unwrap();

    let mut store = MemoryPackStore::new();
    let (report, _) = migrated(&root, &mut store);
    let document = &report.metadata[&id];

    let k = |content: &[u8]| StoreKey::for_hash(&blake3::hash(content)).to_string();
    assert_eq!(
        document.to_json().unwrap(),
        json!({"o": {
            "a": {"o": {
                "b": {"o": {"c": {"o": {"deep.dat": {"k": k(b"2")}}}}},
                "empty": {},
                "side.dat": {"k": k(b"3")},
            }},
            "top.dat": {"k": k(b"1")},
        }})
    );

    for (parts, key) in document.files() {
        let on_disk = fs::read(dir.join(parts.join("/"))).unwrap();
        let stored = store.get_object_content(key.as_resolved().unwrap()).unwrap();
        assert_eq!(stored, on_disk);
    }
}

#[test]
fn populated_container_aborts_second_run() {
    let temp = TempDir::new().unwrap();
    let root = legacy_root(temp.path());
    write_node(&root, &identity(ID_ONE), SUBFOLDER_PATH, &[("f", "data")]);

    let mut container = DiskPackContainer::open(temp.path().join("container")).unwrap();
    migrated(&root, &mut container);

    let err = RepositoryMigrationEngine::new(&root)
        .migrate(&mut container, &mut CollectingReporter::default())
        .unwrap_err();
    assert!(matches!(err, MigrationError::StorePopulated { count: 1 }));
}
