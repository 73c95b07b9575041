//! In-memory pack store
//!
//! Same key function as the disk container, no persistence. Used for dry runs
//! and tests; it counts batch calls so callers can check batching behaviour.

use crate::error::StoreError;
use crate::pack::{copy_hashing, PackStore, StreamOpener};
use crate::types::StoreKey;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryPackStore {
    initialised: bool,
    objects: HashMap<StoreKey, Vec<u8>>,
    batch_calls: usize,
}

impl MemoryPackStore {
    /// A store that is already initialised and empty.
    pub fn new() -> Self {
        Self {
            initialised: true,
            ..Self::default()
        }
    }

    /// A store that still needs `init()`.
    pub fn uninitialised() -> Self {
        Self::default()
    }

    /// Number of `add_streamed_objects` calls received so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls
    }
}

impl PackStore for MemoryPackStore {
    fn is_initialised(&self) -> bool {
        self.initialised
    }

    fn init(&mut self) -> Result<(), StoreError> {
        if self.initialised {
            return Err(StoreError::AlreadyInitialised("<memory>".into()));
        }
        self.initialised = true;
        Ok(())
    }

    fn count_objects(&self) -> Result<u64, StoreError> {
        Ok(self.objects.len() as u64)
    }

    fn add_streamed_objects<O: StreamOpener>(
        &mut self,
        streams: &[O],
        _compress: bool,
    ) -> Result<Vec<StoreKey>, StoreError> {
        if !self.initialised {
            return Err(StoreError::NotInitialised("<memory>".into()));
        }
        self.batch_calls += 1;

        let mut keys = Vec::with_capacity(streams.len());
        for stream in streams {
            let stream_error = |source| StoreError::Stream {
                description: stream.describe(),
                source,
            };
            let mut reader = stream.open().map_err(stream_error)?;
            let mut content = Vec::new();
            let (hash, _) = copy_hashing(&mut reader, &mut content).map_err(stream_error)?;
            let key = StoreKey::for_hash(&hash);
            self.objects.entry(key.clone()).or_insert(content);
            keys.push(key);
        }
        Ok(keys)
    }

    fn has_object(&self, key: &StoreKey) -> Result<bool, StoreError> {
        Ok(self.objects.contains_key(key))
    }

    fn get_object_content(&self, key: &StoreKey) -> Result<Vec<u8>, StoreError> {
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownKey(key.to_string()))
    }
}
