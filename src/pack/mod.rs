//! Content-addressed packing
//!
//! Streams are hashed, deduplicated and appended to an append-only pack store.
//! The whole batch goes to the store in one call, and the keys come back in
//! input order.

pub mod container;
pub mod memory;

pub use container::DiskPackContainer;
pub use memory::MemoryPackStore;

use crate::error::StoreError;
use crate::types::StoreKey;
use std::io::Read;
use tracing::{debug, info};

/// Something that can open a byte stream on demand.
pub trait StreamOpener {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>>;

    /// Human-readable origin, used in error messages.
    fn describe(&self) -> String;
}

impl StreamOpener for Vec<u8> {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.as_slice()))
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.len())
    }
}

impl<T: StreamOpener + ?Sized> StreamOpener for &T {
    fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
        (**self).open()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Append-only content-addressed object store.
///
/// Identical content always maps to the same key, and adding content that is
/// already present is a no-op that returns the existing key.
pub trait PackStore {
    fn is_initialised(&self) -> bool;

    fn init(&mut self) -> Result<(), StoreError>;

    fn count_objects(&self) -> Result<u64, StoreError>;

    /// Store every stream and return one key per stream, in order.
    ///
    /// Streams are opened one at a time, right before they are read. If any
    /// stream fails, the whole call fails. Content already written may stay in
    /// the store, but none of the returned positions can be trusted.
    fn add_streamed_objects<O: StreamOpener>(
        &mut self,
        streams: &[O],
        compress: bool,
    ) -> Result<Vec<StoreKey>, StoreError>;

    fn has_object(&self, key: &StoreKey) -> Result<bool, StoreError>;

    fn get_object_content(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError>;
}

/// Copy a stream into `sink` while hashing it. Returns the digest and the raw length.
pub(crate) fn copy_hashing<R: Read + ?Sized, W: std::io::Write + ?Sized>(
    reader: &mut R,
    sink: &mut W,
) -> std::io::Result<(blake3::Hash, u64)> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
        sink.write_all(&buffer[..read])?;
        total += read as u64;
    }
    Ok((hasher.finalize(), total))
}

/// Batch front end over a [`PackStore`].
pub struct ContentAddressedPacker<'s, S: PackStore> {
    store: &'s mut S,
}

impl<'s, S: PackStore> ContentAddressedPacker<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    /// Pack every stream with a single store call and return keys in input order.
    ///
    /// An empty batch returns immediately without touching the store.
    pub fn pack<O: StreamOpener>(
        &mut self,
        streams: &[O],
        compress: bool,
    ) -> Result<Vec<StoreKey>, StoreError> {
        if streams.is_empty() {
            debug!("no streams to pack");
            return Ok(Vec::new());
        }

        info!(streams = streams.len(), compress, "packing streams");
        let keys = self.store.add_streamed_objects(streams, compress)?;
        if keys.len() != streams.len() {
            return Err(StoreError::KeyCountMismatch {
                expected: streams.len(),
                actual: keys.len(),
            });
        }
        Ok(keys)
    }
}
