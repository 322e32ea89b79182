//! Document engine contract.
//!
//! The pipeline never touches a document format directly; it drives a
//! [`Document`] opened by a [`DocumentEngine`]:
//!
//! ```text
//! open ──▶ search_text ──▶ mark_redaction ──▶ commit_redactions   (per page)
//!      ──▶ extract_text / render_page / save                      (outputs)
//!      ──▶ drop                                                   (close)
//! ```
//!
//! Two engines ship with the crate:
//!
//! * [`PdfiumEngine`]: real PDFs through `pdfium-render`.
//! * [`PlainTextEngine`]: form-feed separated text files with the same
//!   semantics, so the whole pipeline runs without the native library.
//!
//! Coordinates are page units with the origin at the bottom-left corner.

mod pdfium;
mod text;

pub use self::pdfium::PdfiumEngine;
pub use self::text::PlainTextEngine;

use crate::error::EngineError;
use image::DynamicImage;
use std::path::Path;

/// Axis-aligned rectangle in page units (origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl BoundingBox {
    pub fn new(left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Grow by `margin` on every side.
    pub fn padded(&self, margin: f32) -> Self {
        Self::new(
            self.left - margin,
            self.bottom - margin,
            self.right + margin,
            self.top + margin,
        )
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.top - self.bottom).max(0.0)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }
}

/// Opaque RGB fill painted over redacted regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FillColor {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
}

/// Opens documents.
pub trait DocumentEngine {
    /// Open the file at `path`. The file must stay in place until the
    /// returned document is dropped.
    fn open<'e>(&'e self, path: &Path) -> Result<Box<dyn Document + 'e>, EngineError>;
}

/// An open document, exclusively owned by one request. Dropping it closes it.
///
/// Pages are 0-based here; human-facing numbering is added by callers.
pub trait Document {
    fn page_count(&self) -> usize;

    /// Every region where `pattern` occurs on `page`. Matching folds ASCII
    /// case only.
    fn search_text(&self, page: usize, pattern: &str) -> Result<Vec<BoundingBox>, EngineError>;

    /// Queue `region` for redaction. Nothing changes until
    /// [`Document::commit_redactions`].
    fn mark_redaction(
        &mut self,
        page: usize,
        region: BoundingBox,
        fill: FillColor,
    ) -> Result<(), EngineError>;

    /// Apply every queued region on `page`, removing the covered content.
    /// Returns how many regions were applied; zero leaves the page untouched.
    fn commit_redactions(&mut self, page: usize) -> Result<usize, EngineError>;

    fn extract_text(&self, page: usize) -> Result<String, EngineError>;

    fn render_page(&self, page: usize, dpi: u32) -> Result<DynamicImage, EngineError>;

    /// Serialise the whole document to `path`.
    fn save(&self, path: &Path) -> Result<(), EngineError>;
}

pub(crate) fn check_page(page: usize, total: usize) -> Result<(), EngineError> {
    if page < total {
        Ok(())
    } else {
        Err(EngineError::PageOutOfRange { page, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_grows_every_side() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 28.0).padded(2.0);
        assert_eq!(b, BoundingBox::new(8.0, 18.0, 32.0, 30.0));
        assert_eq!(b.width(), 24.0);
        assert_eq!(b.height(), 12.0);
    }

    #[test]
    fn contains_is_inclusive() {
        let b = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains(0.0, 10.0));
        assert!(!b.contains(10.5, 5.0));
    }

    #[test]
    fn page_bounds() {
        assert!(check_page(0, 1).is_ok());
        assert!(matches!(
            check_page(3, 3),
            Err(EngineError::PageOutOfRange { page: 3, total: 3 })
        ));
    }
}
