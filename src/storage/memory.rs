use super::BlobStore;
use crate::error::StorageError;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::sync::RwLock;

/// Thread-safe in-process blob store.
///
/// Containers must be created with [`BlobStore::ensure_container`] before
/// objects can be written into them, mirroring a real S3 endpoint.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    containers: BTreeSet<String>,
    objects: BTreeMap<(String, String), StoredObject>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object, creating its container.
    pub fn insert(&self, container: &str, key: &str, data: impl Into<Vec<u8>>) {
        let mut inner = self.write();
        inner.containers.insert(container.to_string());
        inner.objects.insert(
            (container.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub fn object(&self, container: &str, key: &str) -> Option<Vec<u8>> {
        self.read()
            .objects
            .get(&(container.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    pub fn content_type(&self, container: &str, key: &str) -> Option<String> {
        self.read()
            .objects
            .get(&(container.to_string(), key.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// All keys in `container`, sorted.
    pub fn keys(&self, container: &str) -> Vec<String> {
        self.read()
            .objects
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.read().containers.contains(container)
    }

    // Every write leaves the maps consistent, so a poisoned guard is usable.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        self.write().containers.insert(container.to_string());
        Ok(())
    }

    fn put_object(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut inner = self.write();
        if !inner.containers.contains(container) {
            return Err(StorageError::Status {
                operation: "put_object",
                status: 404,
                body: format!("NoSuchBucket: {container}"),
            });
        }
        inner.objects.insert(
            (container.to_string(), key.to_string()),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn get_object(&self, container: &str, key: &str) -> Result<Box<dyn Read>, StorageError> {
        self.object(container, key)
            .map(|data| Box::new(Cursor::new(data)) as Box<dyn Read>)
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }

    fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        self.write()
            .objects
            .remove(&(container.to_string(), key.to_string()));
        Ok(())
    }
}
