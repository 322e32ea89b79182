//! Delivery routing: inline payloads or objects in blob storage.
//!
//! Storage keys are deterministic and namespaced by process identifier:
//!
//! ```text
//! {process_id}/result.pdf
//! {process_id}/result_page_{n}.png     n = 1, 2, …
//! {process_id}/result.md
//! ```
//!
//! A failed upload of a multi-page artifact deletes the pages it already
//! wrote, so durable storage never holds half of a failed format.

use super::encode;
use crate::error::DeliveryError;
use crate::output::{DeliveredPayload, FormatOutcome};
use crate::request::OutputFormat;
use crate::storage::{BlobLocation, BlobStore};
use tracing::{debug, warn};

/// Bytes of one produced artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Binary(Vec<u8>),
    Text(String),
}

impl Payload {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Binary(b) => b,
            Self::Text(t) => t.as_bytes(),
        }
    }

    fn into_inline(self) -> String {
        match self {
            Self::Binary(b) => encode::to_base64(&b),
            Self::Text(t) => t,
        }
    }
}

/// Where artifacts go.
pub enum DeliveryTarget<'a> {
    Response,
    Store {
        store: &'a dyn BlobStore,
        container: &'a str,
    },
}

pub fn object_key(process_id: &str, format: OutputFormat) -> String {
    format!("{process_id}/result.{}", format.extension())
}

/// `page` is 1-based.
pub fn page_key(process_id: &str, page: usize) -> String {
    format!("{process_id}/result_page_{page}.{}", OutputFormat::Img.extension())
}

/// Routes each artifact of one request.
pub struct DeliveryRouter<'a> {
    target: DeliveryTarget<'a>,
    process_id: &'a str,
}

impl<'a> DeliveryRouter<'a> {
    pub fn new(target: DeliveryTarget<'a>, process_id: &'a str) -> Self {
        Self { target, process_id }
    }

    /// Deliver a single-object artifact (`pdf`, `md`).
    pub fn deliver(&self, format: OutputFormat, payload: Payload) -> Result<FormatOutcome, DeliveryError> {
        match &self.target {
            DeliveryTarget::Response => Ok(FormatOutcome::Single(DeliveredPayload::Inline(
                payload.into_inline(),
            ))),
            DeliveryTarget::Store { store, container } => {
                ensure(*store, container)?;
                let key = object_key(self.process_id, format);
                put(*store, container, &key, payload.bytes(), format.content_type())?;
                Ok(FormatOutcome::Single(DeliveredPayload::Stored(BlobLocation::new(
                    *container, key,
                ))))
            }
        }
    }

    /// Deliver per-page PNGs, keeping page order.
    pub fn deliver_pages(&self, pages: Vec<Vec<u8>>) -> Result<FormatOutcome, DeliveryError> {
        match &self.target {
            DeliveryTarget::Response => Ok(FormatOutcome::Pages(
                pages
                    .iter()
                    .map(|p| DeliveredPayload::Inline(encode::to_base64(p)))
                    .collect(),
            )),
            DeliveryTarget::Store { store, container } => {
                ensure(*store, container)?;
                let content_type = OutputFormat::Img.content_type();
                let mut written: Vec<BlobLocation> = Vec::with_capacity(pages.len());

                for (i, png) in pages.iter().enumerate() {
                    let key = page_key(self.process_id, i + 1);
                    if let Err(e) = put(*store, container, &key, png, content_type) {
                        rollback(*store, &written);
                        return Err(e);
                    }
                    written.push(BlobLocation::new(*container, key));
                }

                Ok(FormatOutcome::Pages(
                    written.into_iter().map(DeliveredPayload::Stored).collect(),
                ))
            }
        }
    }
}

fn ensure(store: &dyn BlobStore, container: &str) -> Result<(), DeliveryError> {
    store
        .ensure_container(container)
        .map_err(|source| DeliveryError::ContainerCreateFailed {
            container: container.to_string(),
            source,
        })
}

fn put(
    store: &dyn BlobStore,
    container: &str,
    key: &str,
    data: &[u8],
    content_type: &str,
) -> Result<(), DeliveryError> {
    store
        .put_object(container, key, data, content_type)
        .map_err(|source| DeliveryError::WriteFailed {
            container: container.to_string(),
            key: key.to_string(),
            source,
        })?;
    debug!(container, key, bytes = data.len(), "Artifact stored");
    Ok(())
}

fn rollback(store: &dyn BlobStore, written: &[BlobLocation]) {
    for loc in written.iter().rev() {
        if let Err(e) = store.delete_object(&loc.container, &loc.key) {
            warn!(location = %loc, error = %e, "Failed to remove partial upload");
        }
    }
}
