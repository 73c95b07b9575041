//! Virtual file hierarchy
//!
//! Mirrors a node's on-disk folder as an in-memory tree whose file leaves carry
//! content keys: pending references before packing, store keys after.

pub mod node;
pub mod repository;

pub use node::{ContentKey, DirectoryNode, FileNode, LazyOpener, VirtualFileNode};
pub use repository::{VirtualRepositoryTree, Walk, WalkEntry};
