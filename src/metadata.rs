//! Serialized repository metadata
//!
//! Persisted per node in a compact JSON shape: a directory with entries is
//! `{"o": {name: document}}`, an empty directory is `{}` and a file is
//! `{"k": key}`. While a migration is in flight, file documents hold pending
//! content references. Those are resolved in place once the bulk pack returns,
//! and a document that still holds one cannot be serialized.

use crate::tree::node::ContentKey;
use crate::types::StoreKey;
use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata document for one node of the virtual hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(rename = "o", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub objects: BTreeMap<String, MetadataDocument>,

    #[serde(rename = "k", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<ContentKey>,
}

impl Serialize for ContentKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ContentKey::Resolved(key) => key.serialize(serializer),
            ContentKey::Pending(opener) => Err(S::Error::custom(format!(
                "content of {} has not been packed yet",
                opener.path().display()
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ContentKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        StoreKey::deserialize(deserializer).map(ContentKey::Resolved)
    }
}

/// Failure to locate a path inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    /// The components walked so far, including the offending one.
    pub path: String,
}

impl MetadataDocument {
    pub fn file(key: ContentKey) -> Self {
        Self {
            objects: BTreeMap::new(),
            key: Some(key),
        }
    }

    pub fn directory(objects: BTreeMap<String, MetadataDocument>) -> Self {
        Self { objects, key: None }
    }

    pub fn is_file(&self) -> bool {
        self.key.is_some()
    }

    /// Number of file entries below this document.
    pub fn count_files(&self) -> usize {
        if self.is_file() {
            return 1;
        }
        self.objects.values().map(MetadataDocument::count_files).sum()
    }

    /// True once every file entry carries a store key.
    pub fn is_resolved(&self) -> bool {
        match &self.key {
            Some(key) => key.is_resolved(),
            None => self.objects.values().all(MetadataDocument::is_resolved),
        }
    }

    /// Collect `(path parts, key)` for every file, depth-first in name order.
    pub fn files(&self) -> Vec<(Vec<String>, &ContentKey)> {
        let mut out = Vec::new();
        let mut stack: Vec<(Vec<String>, &MetadataDocument)> = vec![(Vec::new(), self)];
        while let Some((parts, doc)) = stack.pop() {
            if let Some(key) = &doc.key {
                out.push((parts, key));
                continue;
            }
            for (name, child) in doc.objects.iter().rev() {
                let mut child_parts = parts.clone();
                child_parts.push(name.clone());
                stack.push((child_parts, child));
            }
        }
        out
    }

    pub fn get(&self, parts: &[String]) -> Option<&MetadataDocument> {
        parts
            .iter()
            .try_fold(self, |doc, part| doc.objects.get(part))
    }

    /// Walk to the directory document at `parts`, creating intermediate
    /// directories that are missing. Fails if a component is a file.
    pub fn directory_mut(&mut self, parts: &[String]) -> Result<&mut MetadataDocument, PathConflict> {
        let mut current = self;
        let mut walked: Vec<&str> = Vec::with_capacity(parts.len());
        for part in parts {
            walked.push(part);
            if current.is_file() {
                return Err(PathConflict {
                    path: walked.join("/"),
                });
            }
            current = current.objects.entry(part.clone()).or_default();
        }
        if current.is_file() {
            return Err(PathConflict {
                path: walked.join("/"),
            });
        }
        Ok(current)
    }

    /// Set the key of the file at `parts`, replacing whatever key it held.
    pub fn set_key(&mut self, parts: &[String], key: ContentKey) -> Result<(), PathConflict> {
        let (filename, dirs) = parts.split_last().ok_or_else(|| PathConflict {
            path: String::new(),
        })?;
        let directory = self.directory_mut(dirs)?;
        let entry = directory.objects.entry(filename.clone()).or_default();
        if !entry.objects.is_empty() {
            return Err(PathConflict {
                path: parts.join("/"),
            });
        }
        entry.key = Some(key);
        Ok(())
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parts(path: &str) -> Vec<String> {
        path.split('/').map(str::to_string).collect()
    }

    fn resolved(key: &str) -> ContentKey {
        ContentKey::Resolved(StoreKey::new(key))
    }

    #[test]
    fn test_empty_directory_serializes_to_empty_object() {
        let doc = MetadataDocument::default();
        assert_eq!(doc.to_json().unwrap(), json!({}));
        assert_eq!(doc.count_files(), 0);
        assert!(doc.is_resolved());
    }

    #[test]
    fn test_set_key_creates_intermediate_directories() {
        let mut doc = MetadataDocument::default();
        doc.set_key(&parts("a/b/c.txt"), resolved("k1")).unwrap();
        doc.set_key(&parts("a/d.txt"), resolved("k2")).unwrap();

        assert_eq!(
            doc.to_json().unwrap(),
            json!({"o": {"a": {"o": {"b": {"o": {"c.txt": {"k": "k1"}}}, "d.txt": {"k": "k2"}}}}})
        );
        assert_eq!(doc.count_files(), 2);
    }

    #[test]
    fn test_set_key_through_file_is_conflict() {
        let mut doc = MetadataDocument::default();
        doc.set_key(&parts("a"), resolved("k1")).unwrap();
        let err = doc.set_key(&parts("a/b"), resolved("k2")).unwrap_err();
        assert_eq!(err.path, "a");
    }

    #[test]
    fn test_pending_key_refuses_to_serialize() {
        let mut doc = MetadataDocument::default();
        doc.set_key(&parts("x.bin"), ContentKey::pending("/tmp/x.bin"))
            .unwrap();
        assert!(!doc.is_resolved());
        assert!(doc.to_json().is_err());

        doc.set_key(&parts("x.bin"), resolved("abc")).unwrap();
        assert!(doc.is_resolved());
        assert_eq!(doc.to_json().unwrap(), json!({"o": {"x.bin": {"k": "abc"}}}));
    }

    #[test]
    fn test_deserialize_reads_resolved_keys() {
        let value = json!({"o": {"sub": {"o": {"f": {"k": "abc"}}}, "e": {}}});
        let doc: MetadataDocument = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(
            doc.get(&parts("sub/f")).and_then(|d| d.key.clone()),
            Some(resolved("abc"))
        );
        assert_eq!(doc.to_json().unwrap(), value);
    }

    #[test]
    fn test_files_are_listed_depth_first_in_name_order() {
        let mut doc = MetadataDocument::default();
        doc.set_key(&parts("b.txt"), resolved("2")).unwrap();
        doc.set_key(&parts("a/z.txt"), resolved("1")).unwrap();
        doc.set_key(&parts("c/d/e.txt"), resolved("3")).unwrap();

        let listed: Vec<String> = doc.files().into_iter().map(|(p, _)| p.join("/")).collect();
        assert_eq!(listed, vec!["a/z.txt", "b.txt", "c/d/e.txt"]);
    }
}
