// Storage module: the record store collaborator and its implementations
// Author: Gabriel Demetrios Lafis

mod file;
mod filter;
mod memory;
mod repository;

pub use file::*;
pub use filter::*;
pub use memory::*;
pub use repository::*;

use thiserror::Error;

use crate::data::{DataError, Record, RecordSet};

/// Represents a store of named record collections
pub trait RecordStore: Send + Sync {
    /// Check if a collection exists
    fn has_collection(&self, name: &str) -> Result<bool, StorageError>;

    /// Create an empty collection; creating an existing one is a no-op
    fn create_collection(&self, name: &str) -> Result<(), StorageError>;

    /// Read the records of a collection matching `filter`
    fn find(&self, name: &str, filter: &RecordFilter) -> Result<RecordSet, StorageError>;

    /// Append records, creating the collection if needed. Returns the number
    /// of records written.
    fn create_many(&self, name: &str, records: &[Record]) -> Result<usize, StorageError>;

    /// Remove every record of a collection, keeping the collection
    fn clear(&self, name: &str) -> Result<(), StorageError>;

    /// Remove the records matching `filter`, returning how many were removed
    fn delete_where(&self, name: &str, filter: &RecordFilter) -> Result<usize, StorageError>;

    /// Delete a collection
    fn drop_collection(&self, name: &str) -> Result<(), StorageError>;

    /// List all collections
    fn list_collections(&self) -> Result<Vec<String>, StorageError>;

    /// Read all records of a collection, optionally filtered
    fn find_all(&self, name: &str, filter: Option<&RecordFilter>) -> Result<RecordSet, StorageError> {
        match filter {
            Some(filter) => self.find(name, filter),
            None => self.find(name, &RecordFilter::All),
        }
    }
}

/// Represents an error in the storage module
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Collection '{0}' not found")]
    NotFound(String),
    #[error("Invalid collection name: '{0}'")]
    InvalidName(String),
    #[error("Error: {0}")]
    Other(String),
}
