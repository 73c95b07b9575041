//! Virtual repository: the in-memory file hierarchy of a single node.
//!
//! Built from a real directory with [`VirtualRepositoryTree::insert_tree`], turned
//! into a [`MetadataDocument`] with [`VirtualRepositoryTree::serialize`], then
//! cleared with [`VirtualRepositoryTree::reset`] so only one node's tree is held
//! in memory at a time.

use crate::error::TreeError;
use crate::metadata::MetadataDocument;
use crate::tree::node::{ContentKey, DirectoryNode, FileNode, VirtualFileNode};
use std::collections::btree_map::Entry;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// In-memory tree rooted at an unnamed directory.
#[derive(Debug, Default)]
pub struct VirtualRepositoryTree {
    root: DirectoryNode,
}

impl VirtualRepositoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn root(&self) -> &DirectoryNode {
        &self.root
    }

    /// Copy the structure of `source` into the tree.
    ///
    /// Every regular file becomes a file node holding a pending reference to its
    /// real path; every subdirectory becomes a directory node, empty ones
    /// included. Returns the number of files inserted. A relative path that is
    /// already present is an error: the tree must be reset between nodes.
    pub fn insert_tree(&mut self, source: &Path) -> Result<usize, TreeError> {
        let mut inserted = 0;
        let walker = WalkDir::new(source)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| TreeError::Walk {
                path: source.to_path_buf(),
                source: e,
            })?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|_| TreeError::InvalidPath(entry.path().to_path_buf()))?;

            let file_type = entry.file_type();
            let is_dir = if file_type.is_symlink() {
                // Links are taken for what they point at; dangling ones are skipped.
                match std::fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_file() => false,
                    Ok(meta) if meta.is_dir() => {
                        debug!(path = %entry.path().display(), "skipping directory symlink");
                        continue;
                    }
                    _ => {
                        debug!(path = %entry.path().display(), "skipping dangling or special symlink");
                        continue;
                    }
                }
            } else if file_type.is_dir() {
                true
            } else if file_type.is_file() {
                false
            } else {
                debug!(path = %entry.path().display(), "skipping special file");
                continue;
            };

            if is_dir {
                self.create_directory(relative)?;
            } else {
                self.insert_file(relative, ContentKey::pending(entry.path()))?;
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    /// Ensure a directory exists at `relative`, creating parents as needed.
    pub fn create_directory(&mut self, relative: &Path) -> Result<(), TreeError> {
        let parts = split_relative(relative)?;
        self.directory_mut(relative, &parts)?;
        Ok(())
    }

    /// Insert a single file, creating parent directories as needed.
    pub fn insert_file(&mut self, relative: &Path, key: ContentKey) -> Result<(), TreeError> {
        let mut parts = split_relative(relative)?;
        let name = parts.pop().ok_or_else(|| TreeError::InvalidPath(relative.to_path_buf()))?;
        let parent = self.directory_mut(relative, &parts)?;

        match parent.children.entry(name.clone()) {
            Entry::Occupied(_) => Err(TreeError::DuplicatePath(relative.to_path_buf())),
            Entry::Vacant(slot) => {
                slot.insert(VirtualFileNode::File(FileNode { name, key }));
                Ok(())
            }
        }
    }

    /// Look up the file node at `relative`.
    pub fn get_file(&self, relative: &Path) -> Option<&FileNode> {
        let parts = split_relative(relative).ok()?;
        let (name, dirs) = parts.split_last()?;
        let mut current = &self.root;
        for part in dirs {
            match current.children.get(part)? {
                VirtualFileNode::Directory(dir) => current = dir,
                VirtualFileNode::File(_) => return None,
            }
        }
        match current.children.get(name)? {
            VirtualFileNode::File(file) => Some(file),
            VirtualFileNode::Directory(_) => None,
        }
    }

    /// Depth-first conversion into the persisted document shape. Does not mutate.
    pub fn serialize(&self) -> MetadataDocument {
        MetadataDocument::directory(
            self.root
                .children
                .iter()
                .map(|(name, child)| (name.clone(), child.serialize()))
                .collect(),
        )
    }

    /// Depth-first walk, one entry per directory (root first, empty ones included).
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![(PathBuf::new(), &self.root)],
        }
    }

    /// Every `(relative path, pending reference)` pair, in walk order.
    pub fn pending_files(&self) -> Vec<(PathBuf, &crate::tree::node::LazyOpener)> {
        let mut out = Vec::new();
        for entry in self.walk() {
            for filename in &entry.filenames {
                let relative = entry.path.join(filename);
                if let Some(opener) = self.get_file(&relative).and_then(|f| f.key.as_pending()) {
                    out.push((relative, opener));
                }
            }
        }
        out
    }

    /// Drop every node, leaving an empty root directory.
    pub fn reset(&mut self) {
        self.root = DirectoryNode::default();
    }

    fn directory_mut(
        &mut self,
        relative: &Path,
        parts: &[String],
    ) -> Result<&mut DirectoryNode, TreeError> {
        let mut current = &mut self.root;
        for part in parts {
            let child = current
                .children
                .entry(part.clone())
                .or_insert_with(|| VirtualFileNode::Directory(DirectoryNode::new(part.clone())));
            current = match child {
                VirtualFileNode::Directory(dir) => dir,
                VirtualFileNode::File(_) => {
                    return Err(TreeError::NotADirectory {
                        path: relative.to_path_buf(),
                        component: part.clone(),
                    })
                }
            };
        }
        Ok(current)
    }
}

/// One directory visited by [`VirtualRepositoryTree::walk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the tree root; empty for the root itself.
    pub path: PathBuf,
    pub dirnames: Vec<String>,
    pub filenames: Vec<String>,
}

/// Lazy depth-first iterator over the directories of a tree.
pub struct Walk<'a> {
    stack: Vec<(PathBuf, &'a DirectoryNode)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let (path, dir) = self.stack.pop()?;
        let mut dirnames = Vec::new();
        let mut filenames = Vec::new();
        let mut subdirs = Vec::new();

        for (name, child) in &dir.children {
            match child {
                VirtualFileNode::Directory(sub) => {
                    dirnames.push(name.clone());
                    subdirs.push((path.join(name), sub));
                }
                VirtualFileNode::File(_) => filenames.push(name.clone()),
            }
        }

        // Reverse so the alphabetically first subdirectory is visited next.
        self.stack.extend(subdirs.into_iter().rev());

        Some(WalkEntry {
            path,
            dirnames,
            filenames,
        })
    }
}

fn split_relative(relative: &Path) -> Result<Vec<String>, TreeError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                let name = name
                    .to_str()
                    .ok_or_else(|| TreeError::NonUtf8Name(relative.to_path_buf()))?;
                parts.push(name.to_string());
            }
            Component::CurDir => {}
            _ => return Err(TreeError::InvalidPath(relative.to_path_buf())),
        }
    }
    if parts.is_empty() {
        return Err(TreeError::InvalidPath(relative.to_path_buf()));
    }
    Ok(parts)
}
