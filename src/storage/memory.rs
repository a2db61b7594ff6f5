// Memory record store implementation
// Author: Gabriel Demetrios Lafis

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::data::{Record, RecordSet};
use super::{RecordFilter, RecordStore, StorageError};

/// Memory store for record collections
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    collections: Arc<RwLock<HashMap<String, RecordSet>>>,
}

impl MemoryRecordStore {
    /// Create a new memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store seeded with collections
    pub fn with_collections<I>(collections: I) -> Self
    where
        I: IntoIterator<Item = (String, RecordSet)>,
    {
        MemoryRecordStore {
            collections: Arc::new(RwLock::new(collections.into_iter().collect())),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, RecordSet>>, StorageError> {
        self.collections
            .read()
            .map_err(|_| StorageError::Other("Failed to acquire read lock".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, RecordSet>>, StorageError> {
        self.collections
            .write()
            .map_err(|_| StorageError::Other("Failed to acquire write lock".to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn has_collection(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.read()?.contains_key(name))
    }

    fn create_collection(&self, name: &str) -> Result<(), StorageError> {
        self.write()?.entry(name.to_string()).or_default();
        Ok(())
    }

    fn find(&self, name: &str, filter: &RecordFilter) -> Result<RecordSet, StorageError> {
        let collections = self.read()?;
        let records = collections
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        Ok(records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    fn create_many(&self, name: &str, records: &[Record]) -> Result<usize, StorageError> {
        self.write()?
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }

    fn clear(&self, name: &str) -> Result<(), StorageError> {
        if let Some(records) = self.write()?.get_mut(name) {
            records.clear();
        }
        Ok(())
    }

    fn delete_where(&self, name: &str, filter: &RecordFilter) -> Result<usize, StorageError> {
        let mut collections = self.write()?;
        let Some(records) = collections.get_mut(name) else {
            return Ok(0);
        };

        let before = records.len();
        records.retain(|r| !filter.matches(r));
        Ok(before - records.len())
    }

    fn drop_collection(&self, name: &str) -> Result<(), StorageError> {
        self.write()?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    fn list_collections(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
