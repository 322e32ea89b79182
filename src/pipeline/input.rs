//! Input resolution: turn the request's source into an open document.
//!
//! Every source is staged into the process workspace first, because engines
//! open files, not byte buffers. The staged file is owned by the returned
//! [`ResolvedInput`] and outlives the document handle: pdfium reads pages
//! lazily from the file it opened.

use crate::engine::{Document, DocumentEngine};
use crate::error::{AcquisitionError, AnonymizeError, StorageError};
use crate::fetch::HttpFetch;
use crate::request::InputSource;
use crate::resources::{ProcessContext, StagedFile};
use crate::storage::{BlobLocation, BlobStore};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};

const STAGED_INPUT: &str = "-input.pdf";

/// An open document together with the file it was opened from.
///
/// Field order is drop order: the document closes before its file goes.
pub struct ResolvedInput<'e> {
    pub document: Box<dyn Document + 'e>,
    staged: StagedFile,
}

impl ResolvedInput<'_> {
    pub fn staged_path(&self) -> &std::path::Path {
        self.staged.path()
    }
}

/// Collaborators the resolver may need, depending on the source.
pub struct Sources<'a> {
    pub store: Option<&'a dyn BlobStore>,
    pub fetcher: &'a dyn HttpFetch,
}

/// Acquire an open document for `source`.
///
/// Fails with [`AcquisitionError`] for anything the caller supplied wrongly
/// or an upstream failed on; staging I/O problems are unexpected.
pub fn resolve_input<'e>(
    source: &InputSource,
    ctx: &ProcessContext,
    engine: &'e dyn DocumentEngine,
    sources: &Sources<'_>,
) -> Result<ResolvedInput<'e>, AnonymizeError> {
    let staged = match source {
        InputSource::InlinePayload(encoded) => {
            let bytes = decode_inline(encoded)?;
            debug!(bytes = bytes.len(), "Decoded inline payload");
            stage(ctx, &bytes)?
        }
        InputSource::RemoteUrl(url) => {
            info!(process_id = ctx.process_id(), "Downloading PDF");
            let fetched = sources
                .fetcher
                .get(url)
                .map_err(|source| AcquisitionError::Network {
                    url: url.clone(),
                    source,
                })?;
            if !fetched.is_success() {
                return Err(AcquisitionError::HttpStatus {
                    url: url.clone(),
                    status: fetched.status,
                }
                .into());
            }
            stage(ctx, &fetched.body)?
        }
        InputSource::BlobRef(reference) => {
            let location = BlobLocation::parse(reference).ok_or_else(|| {
                AcquisitionError::InvalidReference {
                    reference: reference.clone(),
                }
            })?;
            let store = sources.store.ok_or(AnonymizeError::StorageNotConfigured)?;
            let storage_err = |source: StorageError| AcquisitionError::Storage {
                location: location.to_string(),
                source,
            };

            info!(process_id = ctx.process_id(), location = %location, "Reading PDF from blob storage");
            let mut reader = store
                .get_object(&location.container, &location.key)
                .map_err(storage_err)?;
            ctx.stage_reader(STAGED_INPUT, &mut reader)
                .map_err(|e| storage_err(e.into()))?
        }
    };

    let document = engine
        .open(staged.path())
        .map_err(AcquisitionError::EngineOpenFailed)?;
    debug!(
        process_id = ctx.process_id(),
        pages = document.page_count(),
        "Document opened"
    );

    Ok(ResolvedInput { document, staged })
}

/// Decode `pdf_content`: optional `data:...;base64,` prefix, ASCII
/// whitespace ignored, standard alphabet with padding.
pub fn decode_inline(encoded: &str) -> Result<Vec<u8>, AcquisitionError> {
    let body = match encoded.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| AcquisitionError::InvalidEncoding {
                detail: "data URI without ';base64,'".to_string(),
            })?,
        None => encoded,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| AcquisitionError::InvalidEncoding {
            detail: e.to_string(),
        })
}

fn stage(ctx: &ProcessContext, bytes: &[u8]) -> Result<StagedFile, AnonymizeError> {
    ctx.stage_bytes(STAGED_INPUT, bytes)
        .map_err(|e| AnonymizeError::unexpected("Failed to stage input", e))
}
