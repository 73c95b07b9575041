//! Virtual file node types

use crate::metadata::MetadataDocument;
use crate::pack::StreamOpener;
use crate::types::StoreKey;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Deferred content reference: opens the original file only when asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyOpener {
    path: PathBuf,
}

impl LazyOpener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StreamOpener for LazyOpener {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(&self.path)?))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Content key of a file node, depending on pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKey {
    /// Discovered but not yet packed.
    Pending(LazyOpener),
    /// Packed; key assigned by the store.
    Resolved(StoreKey),
}

impl ContentKey {
    pub fn pending(path: impl Into<PathBuf>) -> Self {
        ContentKey::Pending(LazyOpener::new(path))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ContentKey::Resolved(_))
    }

    pub fn as_pending(&self) -> Option<&LazyOpener> {
        match self {
            ContentKey::Pending(opener) => Some(opener),
            ContentKey::Resolved(_) => None,
        }
    }

    pub fn as_resolved(&self) -> Option<&StoreKey> {
        match self {
            ContentKey::Resolved(key) => Some(key),
            ContentKey::Pending(_) => None,
        }
    }
}

/// File node representation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub key: ContentKey,
}

/// Directory node representation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryNode {
    pub name: String,
    pub children: BTreeMap<String, VirtualFileNode>, // sorted by name
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Virtual file node: a directory with children, or a file with a content key.
///
/// The shape is fixed by the variant: directories never carry a key and files
/// never carry children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualFileNode {
    Directory(DirectoryNode),
    File(FileNode),
}

impl VirtualFileNode {
    pub fn name(&self) -> &str {
        match self {
            VirtualFileNode::Directory(dir) => &dir.name,
            VirtualFileNode::File(file) => &file.name,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, VirtualFileNode::Directory(_))
    }

    /// Depth-first conversion into the persisted document shape.
    pub fn serialize(&self) -> MetadataDocument {
        match self {
            VirtualFileNode::File(file) => MetadataDocument::file(file.key.clone()),
            VirtualFileNode::Directory(dir) => MetadataDocument::directory(
                dir.children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.serialize()))
                    .collect(),
            ),
        }
    }
}
