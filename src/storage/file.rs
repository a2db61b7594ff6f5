// File record store implementation
// Author: Gabriel Demetrios Lafis

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::data::{DataSink, DataSource, JsonSink, JsonSource, Record, RecordSet};
use super::{RecordFilter, RecordStore, StorageError};

const EXTENSION: &str = "json";

/// File store: one pretty-printed JSON array per collection in `base_dir`
pub struct FileRecordStore {
    base_dir: PathBuf,
    // Serializes read-modify-write cycles on collection files
    lock: Mutex<()>,
}

impl FileRecordStore {
    /// Create a new file store, creating the directory if needed
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)?;
        }

        Ok(FileRecordStore {
            base_dir,
            lock: Mutex::new(()),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Get the path for a collection
    fn collection_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');

        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }

        Ok(self.base_dir.join(format!("{}.{}", name, EXTENSION)))
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, StorageError> {
        self.lock
            .lock()
            .map_err(|_| StorageError::Other("Failed to acquire file store lock".to_string()))
    }

    fn load(&self, name: &str) -> Result<Option<RecordSet>, StorageError> {
        let path = self.collection_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(JsonSource::new(&path).read()?))
    }

    fn store(&self, name: &str, records: &[Record]) -> Result<(), StorageError> {
        let path = self.collection_path(name)?;
        JsonSink::new(&path, true).write(records)?;
        Ok(())
    }
}

impl RecordStore for FileRecordStore {
    fn has_collection(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.collection_path(name)?.exists())
    }

    fn create_collection(&self, name: &str) -> Result<(), StorageError> {
        let _guard = self.guard()?;
        if !self.collection_path(name)?.exists() {
            self.store(name, &[])?;
        }
        Ok(())
    }

    fn find(&self, name: &str, filter: &RecordFilter) -> Result<RecordSet, StorageError> {
        let _guard = self.guard()?;
        let records = self
            .load(name)?
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;

        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    fn create_many(&self, name: &str, records: &[Record]) -> Result<usize, StorageError> {
        let _guard = self.guard()?;
        let mut existing = self.load(name)?.unwrap_or_default();
        existing.extend_from_slice(records);
        self.store(name, &existing)?;
        Ok(records.len())
    }

    fn clear(&self, name: &str) -> Result<(), StorageError> {
        let _guard = self.guard()?;
        if self.collection_path(name)?.exists() {
            self.store(name, &[])?;
        }
        Ok(())
    }

    fn delete_where(&self, name: &str, filter: &RecordFilter) -> Result<usize, StorageError> {
        let _guard = self.guard()?;
        let Some(mut records) = self.load(name)? else {
            return Ok(0);
        };

        let before = records.len();
        records.retain(|r| !filter.matches(r));
        let removed = before - records.len();

        if removed > 0 {
            self.store(name, &records)?;
        }
        Ok(removed)
    }

    fn drop_collection(&self, name: &str) -> Result<(), StorageError> {
        let _guard = self.guard()?;
        let path = self.collection_path(name)?;

        if !path.exists() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        fs::remove_file(path)?;
        Ok(())
    }

    fn list_collections(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();

            if path.is_file() && path.extension().map_or(false, |ext| ext == EXTENSION) {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
