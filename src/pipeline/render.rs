//! PDF and page-image producers over the redacted document.

use super::encode;
use crate::engine::Document;
use crate::error::AnonymizeError;
use crate::resources::ProcessContext;
use tracing::{debug, info};

/// Serialise the whole document.
///
/// The engine writes into a file staged in the process workspace; the file is
/// released as soon as its bytes are read back.
pub fn produce_pdf(doc: &dyn Document, ctx: &ProcessContext) -> Result<Vec<u8>, AnonymizeError> {
    let out = ctx
        .stage_empty("-result.pdf")
        .map_err(|e| AnonymizeError::unexpected("Failed to stage output file", e))?;
    doc.save(out.path())?;
    let bytes = out
        .read()
        .map_err(|e| AnonymizeError::unexpected("Failed to read serialised document", e))?;
    out.close()
        .map_err(|e| AnonymizeError::unexpected("Failed to release output file", e))?;

    info!(process_id = ctx.process_id(), bytes = bytes.len(), "PDF produced");
    Ok(bytes)
}

/// Rasterise every page, in page order, to PNG.
///
/// Each raster is dropped once encoded, so at most one decoded page is held
/// at a time.
pub fn produce_page_images(doc: &dyn Document, dpi: u32) -> Result<Vec<Vec<u8>>, AnonymizeError> {
    let total = doc.page_count();
    let mut pages = Vec::with_capacity(total);

    for page in 0..total {
        let raster = doc.render_page(page, dpi)?;
        let png = encode::encode_png(&raster).map_err(|e| {
            AnonymizeError::unexpected(&format!("Failed to encode page {}", page + 1), e)
        })?;
        debug!(page = page + 1, bytes = png.len(), "Page image produced");
        pages.push(png);
    }

    Ok(pages)
}
