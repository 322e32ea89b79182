//! Error types for the pdf-anonymizer library.
//!
//! The taxonomy follows the lifecycle of a request:
//!
//! * [`ValidationError`]: the request itself is malformed. Raised before any
//!   resource is acquired.
//! * [`AcquisitionError`]: the input document cannot be loaded (bad encoding,
//!   network failure, non-success status, storage failure, malformed
//!   reference, unopenable document).
//! * [`EngineError`]: the document engine failed while opening or processing
//!   the document.
//! * [`DeliveryError`]: **non-fatal**: persisting one format's artifact
//!   failed. Stored inside [`crate::output::AnonymizationResponse`] as an error
//!   marker for that format while every other format stays intact.
//!
//! [`AnonymizeError`] wraps the fatal classes and is what the top-level
//! `anonymize*` functions return. [`AnonymizeError::http_status`] maps each
//! class onto the status code the HTTP surface answers with.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by [`crate::anonymize()`].
///
/// Delivery failures use [`DeliveryError`] and are reported per format
/// instead of being propagated here.
#[derive(Debug, Error)]
pub enum AnonymizeError {
    /// The request was rejected before any work started.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The input document could not be loaded.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// The document engine failed while processing the document.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// BlobStore delivery was requested but no blob store is configured.
    #[error("result_deliver 'url' requires blob storage, which is not configured on this server")]
    StorageNotConfigured,

    /// Anything else: temp-file staging, task panics, encoder failures.
    #[error("Internal error: {0}")]
    Unexpected(String),
}

impl AnonymizeError {
    /// HTTP status the request surface answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Acquisition(e) => e.http_status(),
            Self::Engine(EngineError::Binding(_)) => 500,
            Self::Engine(_) => 400,
            Self::StorageNotConfigured | Self::Unexpected(_) => 500,
        }
    }

    pub(crate) fn unexpected(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Unexpected(format!("{context}: {err}"))
    }
}

/// A malformed or missing request field.
///
/// The message is shown to the caller verbatim as `{"error": message}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The input document could not be acquired.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// `pdf_content` is not valid base64.
    #[error("pdf_content is not valid base64: {detail}")]
    InvalidEncoding { detail: String },

    /// The remote server answered with a non-success status.
    #[error("Failed to download PDF from URL: {status}")]
    HttpStatus { url: String, status: u16 },

    /// The remote fetch failed before a status was received.
    #[error("Failed to download PDF from '{url}': {source}")]
    Network {
        url: String,
        #[source]
        source: FetchError,
    },

    /// `pdf_file` is neither a URL nor `container/key`.
    #[error("Invalid pdf_file reference '{reference}': expected an HTTP(S) URL or 'container/key'")]
    InvalidReference { reference: String },

    /// Reading the referenced object from blob storage failed.
    #[error("Failed to read '{location}' from blob storage: {source}")]
    Storage {
        location: String,
        #[source]
        source: StorageError,
    },

    /// The staged bytes could not be opened by the document engine.
    #[error("Failed to open PDF document: {0}")]
    EngineOpenFailed(#[source] EngineError),
}

impl AcquisitionError {
    /// 502 when an upstream dependency failed, 400 when the input is at fault.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::HttpStatus { .. } | Self::Network { .. } | Self::Storage { .. } => 502,
            Self::InvalidEncoding { .. }
            | Self::InvalidReference { .. }
            | Self::EngineOpenFailed(_) => 400,
        }
    }
}

/// Errors raised by a [`crate::engine::DocumentEngine`] or its documents.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The native engine library could not be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium or install pdfium system-wide."
    )]
    Binding(String),

    /// The file does not start with the `%PDF` signature.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    /// The engine rejected the document.
    #[error("Document '{path}' could not be opened: {detail}")]
    Open { path: PathBuf, detail: String },

    /// A page index beyond the document's page count was requested.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Text search failed on a page.
    #[error("Text search failed on page {page}: {detail}")]
    Search { page: usize, detail: String },

    /// Text extraction failed on a page.
    #[error("Text extraction failed on page {page}: {detail}")]
    Text { page: usize, detail: String },

    /// Marking or committing redactions failed on a page.
    #[error("Applying redactions failed on page {page}: {detail}")]
    Redaction { page: usize, detail: String },

    /// Rasterisation failed on a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    /// Serialising the document failed.
    #[error("Failed to serialise document to '{path}': {detail}")]
    Save { path: PathBuf, detail: String },
}

/// Errors raised by a [`crate::storage::BlobStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object '{container}/{key}' not found")]
    NotFound { container: String, key: String },

    /// The store answered with an unexpected status.
    #[error("storage returned HTTP {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The store could not be reached.
    #[error("storage request failed for {operation}: {detail}")]
    Transport {
        operation: &'static str,
        detail: String,
    },

    /// The store configuration is unusable.
    #[error("invalid storage configuration: {0}")]
    Config(String),

    /// No blob store is configured for this process.
    #[error("blob storage is not configured")]
    NotConfigured,

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`crate::fetch::HttpFetch`] client.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("{0}")]
    Transport(String),
}

/// A non-fatal failure delivering one format's artifact.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The target container could not be created or checked.
    #[error("Failed to prepare container '{container}': {source}")]
    ContainerCreateFailed {
        container: String,
        #[source]
        source: StorageError,
    },

    /// Writing the artifact failed.
    #[error("Failed to upload '{container}/{key}': {source}")]
    WriteFailed {
        container: String,
        key: String,
        #[source]
        source: StorageError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let e = AnonymizeError::from(ValidationError::new(
            "Either pdf_content or pdf_file must be provided",
        ));
        assert_eq!(e.http_status(), 400);
        assert_eq!(
            e.to_string(),
            "Either pdf_content or pdf_file must be provided"
        );
    }

    #[test]
    fn acquisition_status_by_cause() {
        let bad_ref = AcquisitionError::InvalidReference {
            reference: "a/b/c".into(),
        };
        assert_eq!(bad_ref.http_status(), 400);

        let upstream = AcquisitionError::HttpStatus {
            url: "https://example.org/x.pdf".into(),
            status: 404,
        };
        assert_eq!(upstream.http_status(), 502);
        assert_eq!(upstream.to_string(), "Failed to download PDF from URL: 404");

        let storage = AcquisitionError::Storage {
            location: "inbox/doc.pdf".into(),
            source: StorageError::NotFound {
                container: "inbox".into(),
                key: "doc.pdf".into(),
            },
        };
        assert_eq!(AnonymizeError::from(storage).http_status(), 502);
    }

    #[test]
    fn engine_errors_pass_message_through() {
        let e = AnonymizeError::from(EngineError::Render {
            page: 3,
            detail: "bitmap allocation failed".into(),
        });
        assert_eq!(e.http_status(), 400);
        assert!(e.to_string().contains("page 3"));
        assert!(e.to_string().contains("bitmap allocation failed"));
    }

    #[test]
    fn binding_failure_is_a_server_fault() {
        let e = AnonymizeError::from(EngineError::Binding("dlopen failed".into()));
        assert_eq!(e.http_status(), 500);
    }

    #[test]
    fn delivery_error_display_names_the_key() {
        let e = DeliveryError::WriteFailed {
            container: "anonymized".into(),
            key: "p-1/result.pdf".into(),
            source: StorageError::Transport {
                operation: "put_object",
                detail: "connection refused".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("anonymized/p-1/result.pdf"), "got: {msg}");
    }
}
