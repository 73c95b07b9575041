//! Disk pack container
//!
//! Layout under the container root:
//!
//! - `config.json`: container id, format version, hash type, pack size target
//! - `packs/<n>`: append-only pack files holding object bytes back to back
//! - `index/`: sled database mapping hex key -> bincode [`PackEntry`]
//!
//! Objects are hashed (blake3, uncompressed bytes) while they are copied into
//! the tail of the current pack, optionally through zlib. When the key turns
//! out to be known already, the pack is truncated back, so each stream is read
//! exactly once and never held in memory. Index entries for a batch are applied
//! together after the pack is synced: if a batch fails part way, the pack keeps
//! some unreferenced bytes and the index is unchanged.

use crate::error::StoreError;
use crate::pack::{copy_hashing, PackStore, StreamOpener};
use crate::types::StoreKey;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_FILE: &str = "config.json";
const PACKS_DIR: &str = "packs";
const INDEX_DIR: &str = "index";
const CONTAINER_VERSION: u32 = 1;
const DEFAULT_PACK_SIZE_TARGET: u64 = 4 * 1024 * 1024 * 1024;

/// Persistent container settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub container_id: String,
    pub container_version: u32,
    pub hash_type: String,
    pub pack_size_target: u64,
}

/// Location of one object inside the packs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackEntry {
    pub pack_id: u64,
    pub offset: u64,
    /// Bytes occupied in the pack (compressed length when compressed).
    pub length: u64,
    /// Uncompressed size.
    pub size: u64,
    pub compressed: bool,
}

pub struct DiskPackContainer {
    root: PathBuf,
    pack_size_target: u64,
    index: Option<sled::Db>,
}

impl DiskPackContainer {
    /// Open the container at `root`. The directory need not exist yet; an
    /// uninitialised container only supports `is_initialised` and `init`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut container = Self {
            root: root.into(),
            pack_size_target: DEFAULT_PACK_SIZE_TARGET,
            index: None,
        };
        if container.is_initialised() {
            let config = container.config()?;
            container.pack_size_target = config.pack_size_target;
            container.index = Some(sled::open(container.root.join(INDEX_DIR))?);
        }
        Ok(container)
    }

    /// Pack size target used by `init`; ignored once the container exists.
    pub fn with_pack_size_target(mut self, bytes: u64) -> Self {
        if self.index.is_none() {
            self.pack_size_target = bytes.max(1);
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> Result<ContainerConfig, StoreError> {
        let content = std::fs::read(self.root.join(CONFIG_FILE))?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn index(&self) -> Result<&sled::Db, StoreError> {
        self.index
            .as_ref()
            .ok_or_else(|| StoreError::NotInitialised(self.root.clone()))
    }

    fn pack_path(&self, pack_id: u64) -> PathBuf {
        self.root.join(PACKS_DIR).join(pack_id.to_string())
    }

    fn open_pack(&self, pack_id: u64) -> Result<(File, u64), StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.pack_path(pack_id))?;
        let len = file.metadata()?.len();
        Ok((file, len))
    }

    /// Highest-numbered pack, which is the one still being appended to.
    fn current_pack_id(&self) -> Result<u64, StoreError> {
        let mut current = 0;
        for entry in std::fs::read_dir(self.root.join(PACKS_DIR))? {
            let entry = entry?;
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u64>().ok())
            {
                current = current.max(id);
            }
        }
        Ok(current)
    }

    fn entry(&self, key: &StoreKey) -> Result<PackEntry, StoreError> {
        let raw = self
            .index()?
            .get(key.as_str())?
            .ok_or_else(|| StoreError::UnknownKey(key.to_string()))?;
        Ok(bincode::deserialize(&raw)?)
    }
}

impl PackStore for DiskPackContainer {
    fn is_initialised(&self) -> bool {
        self.root.join(CONFIG_FILE).is_file()
    }

    fn init(&mut self) -> Result<(), StoreError> {
        if self.is_initialised() {
            return Err(StoreError::AlreadyInitialised(self.root.clone()));
        }
        std::fs::create_dir_all(self.root.join(PACKS_DIR))?;

        let seed = format!(
            "{}:{}",
            self.root.display(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let config = ContainerConfig {
            container_id: blake3::hash(seed.as_bytes()).to_hex().as_str()[..32].to_string(),
            container_version: CONTAINER_VERSION,
            hash_type: "blake3".to_string(),
            pack_size_target: self.pack_size_target,
        };
        self.index = Some(sled::open(self.root.join(INDEX_DIR))?);
        std::fs::write(
            self.root.join(CONFIG_FILE),
            serde_json::to_vec_pretty(&config)?,
        )?;

        info!(root = %self.root.display(), id = %config.container_id, "initialised pack container");
        Ok(())
    }

    fn count_objects(&self) -> Result<u64, StoreError> {
        Ok(self.index()?.len() as u64)
    }

    fn add_streamed_objects<O: StreamOpener>(
        &mut self,
        streams: &[O],
        compress: bool,
    ) -> Result<Vec<StoreKey>, StoreError> {
        let index = self.index()?.clone();
        let mut pack_id = self.current_pack_id()?;
        let (mut pack, mut pack_len) = self.open_pack(pack_id)?;

        let mut batch = sled::Batch::default();
        let mut added: HashSet<StoreKey> = HashSet::new();
        let mut keys = Vec::with_capacity(streams.len());

        for stream in streams {
            if pack_len >= self.pack_size_target {
                pack.sync_all()?;
                pack_id += 1;
                (pack, pack_len) = self.open_pack(pack_id)?;
                debug!(pack_id, "rolled over to new pack");
            }

            let stream_error = |source| StoreError::Stream {
                description: stream.describe(),
                source,
            };
            let mut reader = stream.open().map_err(stream_error)?;

            let mut sink = CountingWriter::new(BufWriter::new(&mut pack));
            let (hash, size) = if compress {
                let mut encoder = ZlibEncoder::new(&mut sink, Compression::default());
                let copied = copy_hashing(&mut reader, &mut encoder).map_err(stream_error)?;
                encoder.finish()?;
                copied
            } else {
                copy_hashing(&mut reader, &mut sink).map_err(stream_error)?
            };
            sink.flush()?;
            let written = sink.written;
            drop(sink);

            let key = StoreKey::for_hash(&hash);
            if added.contains(&key) || index.contains_key(key.as_str())? {
                pack.set_len(pack_len)?;
            } else {
                let entry = PackEntry {
                    pack_id,
                    offset: pack_len,
                    length: written,
                    size,
                    compressed: compress,
                };
                batch.insert(key.as_str(), bincode::serialize(&entry)?);
                added.insert(key.clone());
                pack_len += written;
            }
            keys.push(key);
        }

        pack.sync_all()?;
        index.apply_batch(batch)?;
        index.flush()?;

        debug!(
            streams = streams.len(),
            new_objects = added.len(),
            "added streamed objects"
        );
        Ok(keys)
    }

    fn has_object(&self, key: &StoreKey) -> Result<bool, StoreError> {
        Ok(self.index()?.contains_key(key.as_str())?)
    }

    fn get_object_content(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        let entry = self.entry(key)?;
        let mut pack = File::open(self.pack_path(entry.pack_id))?;
        pack.seek(SeekFrom::Start(entry.offset))?;
        let mut stored = pack.take(entry.length);

        let mut content = Vec::with_capacity(entry.size as usize);
        if entry.compressed {
            ZlibDecoder::new(stored).read_to_end(&mut content)?;
        } else {
            stored.read_to_end(&mut content)?;
        }
        Ok(content)
    }
}

/// Write adapter counting the bytes that reach the inner writer.
struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
