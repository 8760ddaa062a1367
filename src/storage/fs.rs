//! Filesystem-backed bucket

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, instrument};

use super::{ObjectStore, StorageError, validate_key};
use crate::config::ObjectStoreConfig;

/// Suffix of in-flight writes, never visible through `list`
const PARTIAL_SUFFIX: &str = ".partial";

/// A bucket stored as `{root}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    /// Create a store for `bucket` under `root`
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Self {
        Self {
            bucket_dir: root.as_ref().join(bucket),
        }
    }

    /// Create a store from process settings
    pub fn from_config(config: &ObjectStoreConfig) -> Self {
        Self::new(&config.root, &config.bucket)
    }

    /// Directory holding the bucket's objects
    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        if key.ends_with(PARTIAL_SUFFIX) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.bucket_dir.join(key))
    }
}

impl ObjectStore for FsObjectStore {
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never observe a half-written object
        let mut partial = path.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        fs::write(&partial, body).await?;
        fs::rename(&partial, &path).await?;

        debug!("Stored object {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut pending = vec![self.bucket_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // A bucket that was never written to is empty
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.bucket_dir) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if key.ends_with(PARTIAL_SUFFIX) || !key.starts_with(prefix) {
                    continue;
                }
                keys.push(key);
            }
        }

        keys.sort();
        debug!("Listed {} objects under {:?}", keys.len(), prefix);
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "test_bucket");

        store.put("test.json", br#"{"key":"value"}"#.to_vec()).await.unwrap();

        let body = store.get("test.json").await.unwrap().unwrap();
        assert_eq!(body, br#"{"key":"value"}"#);
        assert!(dir.path().join("test_bucket/test.json").exists());
    }

    #[tokio::test]
    async fn test_put_overwrites_existing_object() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        store.put("pages/a.json", b"first".to_vec()).await.unwrap();
        store.put("pages/a.json", b"second".to_vec()).await.unwrap();

        assert_eq!(store.get("pages/a.json").await.unwrap().unwrap(), b"second");
        assert_eq!(store.list("").await.unwrap(), vec!["pages/a.json"]);
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");
        assert!(store.get("missing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix_and_sorts() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        for key in ["pages/acme/b.json", "pages/acme/a.json", "pages/other/c.json", "root.json"] {
            store.put(key, b"{}".to_vec()).await.unwrap();
        }

        assert_eq!(
            store.list("pages/acme/").await.unwrap(),
            vec!["pages/acme/a.json", "pages/acme/b.json"]
        );
        assert_eq!(store.list("").await.unwrap().len(), 4);
        assert!(store.list("nothing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_on_empty_bucket() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "never-written");
        assert!(store.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        store.put("a.json", b"{}".to_vec()).await.unwrap();
        assert!(store.delete("a.json").await.unwrap());
        assert!(!store.delete("a.json").await.unwrap());
        assert!(store.get("a.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "bucket");

        let result = store.put("../outside.json", b"{}".to_vec()).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        let result = store.get("a.json.partial").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }
}
