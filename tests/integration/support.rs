use reposhift::shard::{legacy_content_dirpath, legacy_node_dirpath};
use reposhift::Identity;
use std::fs;
use std::path::{Path, PathBuf};

pub fn identity(s: &str) -> Identity {
    Identity::parse(s).unwrap()
}

/// Legacy node root under `repository`: `<repository>/repository/node`.
pub fn legacy_root(repository: &Path) -> PathBuf {
    repository.join("repository").join("node")
}

/// Write `files` (relative path, content) into the node's `subfolder`.
pub fn write_node(root: &Path, id: &Identity, subfolder: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = legacy_content_dirpath(root, id, subfolder);
    fs::create_dir_all(&dir).unwrap();
    for (relative, content) in files {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

/// A node folder with neither `path` nor `raw_input`.
pub fn write_bare_node(root: &Path, id: &Identity) -> PathBuf {
    let dir = legacy_node_dirpath(root, id);
    fs::create_dir_all(dir.join("unrelated")).unwrap();
    dir
}
