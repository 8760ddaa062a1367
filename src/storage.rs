//! # Object Store Module
//!
//! Raw crawl output is kept in an object store: a flat namespace of keys inside
//! a single bucket, with put/get/list/delete semantics. Crawled pages are
//! written here by the crawler and read back by the processor.
//!
//! ## Key Components
//!
//! - `ObjectStore`: the storage seam the crawler and processor are written against
//! - `FsObjectStore`: a bucket laid out as a directory tree, the way MinIO stores
//!   objects on disk
//! - `StorageError`: failures that abort the current batch

mod error;
mod fs;

pub use error::StorageError;
pub use fs::FsObjectStore;

use std::future::Future;

/// Put/get/list/delete over the keys of one bucket
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any previous object under the same key
    fn put(&self, key: &str, body: Vec<u8>) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Read an object, `None` when the key does not exist
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StorageError>> + Send;

    /// List keys starting with `prefix`, sorted
    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// Delete an object, returning whether it existed
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// Reject keys that would escape the bucket
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
