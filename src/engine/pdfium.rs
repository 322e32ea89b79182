//! PDF engine backed by `pdfium-render`.
//!
//! pdfium can find text and draw over it, but it cannot remove the glyphs
//! underneath a rectangle. A page with committed redactions is therefore
//! rasterised at `redaction_dpi`, the marked regions are painted onto the
//! raster, and the page is replaced by a single image of itself. Nothing of
//! the original text layer survives on that page. Pages without marks are
//! never touched.
//!
//! All calls are blocking; run them on a blocking thread.

use super::{check_page, BoundingBox, Document, DocumentEngine, FillColor};
use crate::error::EngineError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use pdfium_render::prelude::*;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const JPEG_QUALITY: u8 = 90;

/// [`DocumentEngine`] over a bound pdfium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
    redaction_dpi: u32,
}

impl std::fmt::Debug for PdfiumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumEngine")
            .field("redaction_dpi", &self.redaction_dpi)
            .finish_non_exhaustive()
    }
}

impl PdfiumEngine {
    /// Bind the pdfium shared library.
    ///
    /// Search order: `library_path`, `PDFIUM_LIB_PATH`, the executable's
    /// directory, the working directory, then the system library path. Each
    /// candidate may be a directory or the library file itself.
    pub fn bind(library_path: Option<&Path>, redaction_dpi: u32) -> Result<Self, EngineError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(p) = library_path {
            candidates.push(p.to_path_buf());
        }
        if let Ok(p) = std::env::var("PDFIUM_LIB_PATH") {
            if !p.is_empty() {
                candidates.push(PathBuf::from(p));
            }
        }
        if let Some(dir) = std::env::current_exe().ok().and_then(|e| e.parent().map(Path::to_path_buf)) {
            candidates.push(dir);
        }
        candidates.push(PathBuf::from("./"));

        let mut failures = Vec::new();
        for candidate in &candidates {
            let lib = if candidate.is_file() {
                candidate.clone()
            } else {
                Pdfium::pdfium_platform_library_name_at_path(candidate)
            };
            match Pdfium::bind_to_library(&lib) {
                Ok(bindings) => {
                    info!(library = %lib.display(), "Bound pdfium");
                    return Ok(Self {
                        pdfium: Pdfium::new(bindings),
                        redaction_dpi,
                    });
                }
                Err(e) => failures.push(format!("{}: {e:?}", lib.display())),
            }
        }

        match Pdfium::bind_to_system_library() {
            Ok(bindings) => {
                info!("Bound system pdfium");
                Ok(Self {
                    pdfium: Pdfium::new(bindings),
                    redaction_dpi,
                })
            }
            Err(e) => {
                failures.push(format!("system library: {e:?}"));
                Err(EngineError::Binding(failures.join("; ")))
            }
        }
    }
}

impl DocumentEngine for PdfiumEngine {
    fn open<'e>(&'e self, path: &Path) -> Result<Box<dyn Document + 'e>, EngineError> {
        let open_err = |detail: String| EngineError::Open {
            path: path.to_path_buf(),
            detail,
        };

        let mut magic = [0u8; 4];
        let read = std::fs::File::open(path)
            .and_then(|mut f| f.read(&mut magic))
            .map_err(|e| open_err(e.to_string()))?;
        if &magic[..read] != b"%PDF" {
            return Err(EngineError::NotAPdf {
                path: path.to_path_buf(),
                magic: magic[..read].to_vec(),
            });
        }

        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| open_err(format!("{e:?}")))?;
        debug!(pages = document.pages().len(), "PDF loaded");

        Ok(Box::new(PdfiumDocument {
            document,
            scratch: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(std::env::temp_dir),
            redaction_dpi: self.redaction_dpi,
            pending: BTreeMap::new(),
        }))
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    /// Intermediate rasters are written next to the opened file.
    scratch: PathBuf,
    redaction_dpi: u32,
    pending: BTreeMap<usize, Vec<(BoundingBox, FillColor)>>,
}

impl<'a> PdfiumDocument<'a> {
    fn index(&self, page: usize) -> Result<u16, EngineError> {
        check_page(page, self.page_count())?;
        u16::try_from(page).map_err(|_| EngineError::PageOutOfRange {
            page,
            total: self.page_count(),
        })
    }

    fn page(&self, page: usize) -> Result<PdfPage<'a>, EngineError> {
        let idx = self.index(page)?;
        self.document
            .pages()
            .get(idx)
            .map_err(|e| EngineError::Open {
                path: self.scratch.clone(),
                detail: format!("page {}: {e:?}", page + 1),
            })
    }

    /// Page raster at `dpi` with every region painted in its fill colour.
    fn burn(
        page: &PdfPage,
        dpi: u32,
        regions: &[(BoundingBox, FillColor)],
    ) -> Result<image::RgbImage, String> {
        let scale = dpi as f32 / 72.0;
        let page_h = page.height().value;
        let width = ((page.width().value * scale).round() as i32).max(1);
        let height = ((page_h * scale).round() as i32).max(1);

        let config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| format!("{e:?}"))?;
        let mut raster = bitmap.as_image().to_rgb8();
        let (img_w, img_h) = (raster.width() as i32, raster.height() as i32);

        for (region, fill) in regions {
            let x0 = ((region.left * scale).floor() as i32).clamp(0, img_w);
            let y0 = (((page_h - region.top) * scale).floor() as i32).clamp(0, img_h);
            let x1 = ((region.right * scale).ceil() as i32).clamp(0, img_w);
            let y1 = (((page_h - region.bottom) * scale).ceil() as i32).clamp(0, img_h);
            if x1 > x0 && y1 > y0 {
                draw_filled_rect_mut(
                    &mut raster,
                    Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32),
                    Rgb([fill.r, fill.g, fill.b]),
                );
            }
        }
        Ok(raster)
    }
}

impl Document for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn search_text(&self, page: usize, pattern: &str) -> Result<Vec<BoundingBox>, EngineError> {
        let search_err = |detail: String| EngineError::Search { page, detail };
        let pdf_page = self.page(page)?;
        let text = pdf_page.text().map_err(|e| search_err(format!("{e:?}")))?;
        let search = text
            .search(pattern, &PdfSearchOptions::new())
            .map_err(|e| search_err(format!("{e:?}")))?;

        let mut boxes = Vec::new();
        for segments in search.iter(PdfSearchDirection::SearchForward) {
            for segment in segments.iter() {
                let b = segment.bounds();
                boxes.push(BoundingBox::new(
                    b.left().value,
                    b.bottom().value,
                    b.right().value,
                    b.top().value,
                ));
            }
        }
        Ok(boxes)
    }

    fn mark_redaction(
        &mut self,
        page: usize,
        region: BoundingBox,
        fill: FillColor,
    ) -> Result<(), EngineError> {
        self.index(page)?;
        self.pending.entry(page).or_default().push((region, fill));
        Ok(())
    }

    fn commit_redactions(&mut self, page: usize) -> Result<usize, EngineError> {
        let idx = self.index(page)?;
        let Some(regions) = self.pending.remove(&page) else {
            return Ok(0);
        };
        let redact_err = |detail: String| EngineError::Redaction { page, detail };

        let original = self.page(page)?;
        let (width, height) = (original.width(), original.height());
        let raster = Self::burn(&original, self.redaction_dpi, &regions).map_err(redact_err)?;

        let mut jpeg = tempfile::Builder::new()
            .prefix("redacted-page-")
            .suffix(".jpg")
            .tempfile_in(&self.scratch)
            .map_err(|e| redact_err(e.to_string()))?;
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode_image(&raster)
            .map_err(|e| redact_err(e.to_string()))?;
        jpeg.flush().map_err(|e| redact_err(e.to_string()))?;
        let jpeg = jpeg.into_temp_path();

        let mut image = PdfPageImageObject::new_from_jpeg_file(&self.document, &jpeg)
            .map_err(|e| redact_err(format!("{e:?}")))?;
        image
            .scale(width.value, height.value)
            .map_err(|e| redact_err(format!("{e:?}")))?;

        original.delete().map_err(|e| redact_err(format!("{e:?}")))?;
        let mut replacement = self
            .document
            .pages_mut()
            .create_page_at_index(PdfPagePaperSize::Custom(width, height), idx)
            .map_err(|e| redact_err(format!("{e:?}")))?;
        replacement
            .objects_mut()
            .add_image_object(image)
            .map_err(|e| redact_err(format!("{e:?}")))?;

        jpeg.close().map_err(|e| redact_err(e.to_string()))?;
        debug!(page = page + 1, regions = regions.len(), "Burned redactions into page");
        Ok(regions.len())
    }

    fn extract_text(&self, page: usize) -> Result<String, EngineError> {
        let pdf_page = self.page(page)?;
        let text = pdf_page.text().map_err(|e| EngineError::Text {
            page,
            detail: format!("{e:?}"),
        })?;
        Ok(text.all())
    }

    fn render_page(&self, page: usize, dpi: u32) -> Result<DynamicImage, EngineError> {
        let pdf_page = self.page(page)?;
        let scale = dpi as f32 / 72.0;
        let config = PdfRenderConfig::new()
            .set_target_width(((pdf_page.width().value * scale).round() as i32).max(1))
            .set_target_height(((pdf_page.height().value * scale).round() as i32).max(1));

        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|e| EngineError::Render {
                page,
                detail: format!("{e:?}"),
            })?;
        let image = bitmap.as_image();
        debug!(
            page = page + 1,
            width = image.width(),
            height = image.height(),
            "Rendered page"
        );
        Ok(image)
    }

    fn save(&self, path: &Path) -> Result<(), EngineError> {
        self.document
            .save_to_file(path)
            .map_err(|e| EngineError::Save {
                path: path.to_path_buf(),
                detail: format!("{e:?}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Binding needs the native library; these run only where it is installed.
    fn engine() -> Option<PdfiumEngine> {
        PdfiumEngine::bind(None, 150).ok()
    }

    #[test]
    fn rejects_non_pdf_before_touching_pdfium() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"GIF89a").unwrap();
        match engine.open(&path) {
            Err(EngineError::NotAPdf { magic, .. }) => assert_eq!(magic, b"GIF8"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("opened a non-PDF"),
        };
    }

    /// One page per entry, each with a single line of Helvetica text.
    fn write_fixture(engine: &PdfiumEngine, path: &Path, pages: &[&str]) {
        let mut document = engine.pdfium.create_new_pdf().unwrap();
        let font = document.fonts_mut().helvetica();
        for text in pages {
            let mut page = document
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::a4())
                .unwrap();
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(720.0),
                    *text,
                    font,
                    PdfPoints::new(14.0),
                )
                .unwrap();
        }
        document.save_to_file(path).unwrap();
    }

    #[test]
    fn commit_burns_only_the_marked_page() {
        let Some(engine) = engine() else { return };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three.pdf");
        write_fixture(&engine, &path, &["alpha page", "secret page", "gamma page"]);

        let mut doc = engine.open(&path).unwrap();
        assert_eq!(doc.page_count(), 3);
        let hits = doc.search_text(1, "secret").unwrap();
        assert_eq!(hits.len(), 1);
        doc.mark_redaction(1, hits[0].padded(2.0), FillColor::BLACK).unwrap();

        assert_eq!(doc.commit_redactions(0).unwrap(), 0);
        assert_eq!(doc.commit_redactions(1).unwrap(), 1);

        assert_eq!(doc.page_count(), 3);
        assert!(doc.extract_text(0).unwrap().contains("alpha page"));
        assert!(doc.search_text(1, "secret").unwrap().is_empty());
        assert!(!doc.extract_text(1).unwrap().contains("secret"));
        assert!(doc.extract_text(2).unwrap().contains("gamma page"));

        let out = dir.path().join("out.pdf");
        doc.save(&out).unwrap();
        drop(doc);
        let reopened = engine.open(&out).unwrap();
        assert_eq!(reopened.page_count(), 3);
        assert!(reopened.extract_text(2).unwrap().contains("gamma page"));
        assert!(reopened.search_text(1, "secret").unwrap().is_empty());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("redacted-page-"))
            .collect();
        assert!(leftovers.is_empty(), "intermediate raster left behind");
    }

    #[test]
    fn missing_library_reports_binding_error() {
        if engine().is_some() {
            return;
        }
        let err = PdfiumEngine::bind(Some(Path::new("/nonexistent/pdfium")), 150).unwrap_err();
        assert!(matches!(err, EngineError::Binding(_)));
        assert!(err.to_string().contains("PDFIUM_LIB_PATH"));
    }
}
