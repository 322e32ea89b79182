//! Blob storage contract and implementations.
//!
//! [`BlobStore`] is the seam between the pipeline and durable storage. The
//! pipeline only ever needs four operations: make sure a container exists,
//! write an object, stream an object back, and delete one it wrote itself.
//!
//! * [`S3BlobStore`]: any S3-compatible endpoint (MinIO, AWS S3).
//! * [`MemoryBlobStore`]: in-process, for tests and local runs.

mod memory;
mod s3;

pub use memory::MemoryBlobStore;
pub use s3::S3BlobStore;

use crate::error::StorageError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Read;

/// Operations the pipeline requires from durable storage.
///
/// Implementations are shared across requests, so they must be thread-safe
/// and hold no per-request state.
pub trait BlobStore: Send + Sync {
    /// Create `container` if it does not exist. Idempotent.
    fn ensure_container(&self, container: &str) -> Result<(), StorageError>;

    fn put_object(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Open the object for streaming.
    fn get_object(&self, container: &str, key: &str) -> Result<Box<dyn Read>, StorageError>;

    fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError>;
}

/// A `container/key` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobLocation {
    pub container: String,
    pub key: String,
}

impl BlobLocation {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Parse `container/key`: exactly two non-empty components.
    pub fn parse(reference: &str) -> Option<Self> {
        let mut parts = reference.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(container), Some(key), None) if !container.is_empty() && !key.is_empty() => {
                Some(Self::new(container, key))
            }
            _ => None,
        }
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

impl Serialize for BlobLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
