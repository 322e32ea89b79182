//! S3-compatible blob store on the `rust-s3` blocking client.
//!
//! Buckets are addressed path-style (`{endpoint}/{bucket}/{key}`), which is
//! what MinIO expects and what AWS still accepts.

use super::BlobStore;
use crate::config::StorageConfig;
use crate::error::StorageError;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::BucketConfiguration;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::debug;

/// Blob store backed by an S3-compatible HTTP endpoint.
pub struct S3BlobStore {
    region: Region,
    credentials: Credentials,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("endpoint", &self.region.endpoint())
            .field("region", &self.region.to_string())
            .finish_non_exhaustive()
    }
}

impl S3BlobStore {
    /// Build a client for `config`.
    pub fn new(config: &StorageConfig, timeout_secs: Option<u64>) -> Result<Self, StorageError> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(StorageError::Config(
                "MinIO credentials not found in environment variables".to_string(),
            ));
        }

        let endpoint = config.base_url();
        let parsed = reqwest::Url::parse(&endpoint)
            .map_err(|e| StorageError::Config(format!("invalid endpoint '{}': {e}", config.endpoint)))?;
        if parsed.host_str().is_none() {
            return Err(StorageError::Config(format!(
                "endpoint '{}' has no host",
                config.endpoint
            )));
        }

        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(format!("invalid credentials: {e}")))?;

        Ok(Self {
            region: Region::Custom {
                region: config.region.clone(),
                endpoint,
            },
            credentials,
            timeout: timeout_secs.map(Duration::from_secs),
        })
    }

    fn bucket(&self, operation: &'static str, container: &str) -> Result<Box<Bucket>, StorageError> {
        let mut bucket = Bucket::new(container, self.region.clone(), self.credentials.clone())
            .map_err(|e| transport(operation, e))?
            .with_path_style();
        bucket.set_request_timeout(self.timeout);
        Ok(bucket)
    }
}

impl BlobStore for S3BlobStore {
    fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        let bucket = self.bucket("head_bucket", container)?;
        if bucket.exists().map_err(|e| transport("head_bucket", e))? {
            return Ok(());
        }

        debug!(container, "Creating bucket");
        let created = Bucket::create_with_path_style(
            container,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        );
        // 409 BucketAlreadyOwnedByYou: another request created it first.
        match created {
            Ok(resp) if resp.success() || resp.response_code == 409 => Ok(()),
            Ok(resp) => Err(StorageError::Status {
                operation: "create_bucket",
                status: resp.response_code,
                body: truncate(&resp.response_text),
            }),
            Err(S3Error::HttpFailWithBody(409, _)) => Ok(()),
            Err(e) => Err(transport("create_bucket", e)),
        }
    }

    fn put_object(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let bucket = self.bucket("put_object", container)?;
        debug!(container, key, bytes = data.len(), "S3 put");
        let resp = bucket
            .put_object_with_content_type(key, data, content_type)
            .map_err(|e| transport("put_object", e))?;
        check("put_object", resp.status_code(), resp.as_slice())
    }

    fn get_object(&self, container: &str, key: &str) -> Result<Box<dyn Read>, StorageError> {
        let bucket = self.bucket("get_object", container)?;
        let not_found = || StorageError::NotFound {
            container: container.to_string(),
            key: key.to_string(),
        };
        match bucket.get_object(key) {
            Ok(resp) if resp.status_code() == 404 => Err(not_found()),
            Ok(resp) => {
                check("get_object", resp.status_code(), resp.as_slice())?;
                Ok(Box::new(Cursor::new(resp.bytes().to_vec())))
            }
            Err(S3Error::HttpFailWithBody(404, _)) => Err(not_found()),
            Err(e) => Err(transport("get_object", e)),
        }
    }

    fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        let bucket = self.bucket("delete_object", container)?;
        match bucket.delete_object(key) {
            Ok(resp) if resp.status_code() == 404 => Ok(()),
            Ok(resp) => check("delete_object", resp.status_code(), resp.as_slice()),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(transport("delete_object", e)),
        }
    }
}

fn check(operation: &'static str, status: u16, body: &[u8]) -> Result<(), StorageError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(StorageError::Status {
            operation,
            status,
            body: truncate(&String::from_utf8_lossy(body)),
        })
    }
}

fn transport(operation: &'static str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(status, body) => StorageError::Status {
            operation,
            status,
            body: truncate(&body),
        },
        other => StorageError::Transport {
            operation,
            detail: other.to_string(),
        },
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(512).collect()
}
