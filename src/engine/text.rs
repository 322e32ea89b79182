//! Plain-text document engine.
//!
//! A document is a UTF-8 file whose pages are separated by form feeds
//! (`\u{c}`). Every glyph occupies a 10 × 10 unit cell: column `c` of line
//! `l` spans `x ∈ [10c, 10c + 10]`, and line 0 sits at the top of the page.
//! Committed redactions overwrite every glyph whose cell centre lies inside a
//! marked region with [`REDACTED_GLYPH`], so the original characters are gone
//! from both extracted text and saved output.

use super::{check_page, BoundingBox, Document, DocumentEngine, FillColor};
use crate::error::EngineError;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Replaces every redacted glyph.
pub const REDACTED_GLYPH: char = '\u{2588}';

const PAGE_BREAK: char = '\u{c}';
const CELL: f32 = 10.0;

/// Engine for form-feed separated text documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextEngine;

impl PlainTextEngine {
    pub fn new() -> Self {
        Self
    }

    /// Join pages into the on-disk representation.
    pub fn encode_pages<S: AsRef<str>>(pages: &[S]) -> String {
        pages
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(&PAGE_BREAK.to_string())
    }
}

impl DocumentEngine for PlainTextEngine {
    fn open<'e>(&'e self, path: &Path) -> Result<Box<dyn Document + 'e>, EngineError> {
        let bytes = fs::read(path).map_err(|e| EngineError::Open {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let text = String::from_utf8(bytes).map_err(|e| EngineError::Open {
            path: path.to_path_buf(),
            detail: format!("not UTF-8 text: {e}"),
        })?;
        Ok(Box::new(TextDocument::parse(&text)))
    }
}

type Line = Vec<char>;

struct TextDocument {
    pages: Vec<Vec<Line>>,
    pending: BTreeMap<usize, Vec<BoundingBox>>,
}

impl TextDocument {
    fn parse(text: &str) -> Self {
        let text = text.replace("\r\n", "\n");
        let pages = text
            .split(PAGE_BREAK)
            .map(|page| page.split('\n').map(|l| l.chars().collect()).collect())
            .collect();
        Self {
            pages,
            pending: BTreeMap::new(),
        }
    }

    fn page(&self, page: usize) -> Result<&[Line], EngineError> {
        check_page(page, self.pages.len())?;
        Ok(&self.pages[page])
    }

    fn page_height(lines: &[Line]) -> f32 {
        lines.len().max(1) as f32 * CELL
    }

    fn page_width(lines: &[Line]) -> f32 {
        lines.iter().map(Vec::len).max().unwrap_or(0).max(1) as f32 * CELL
    }

    fn cell(height: f32, line: usize, col: usize) -> BoundingBox {
        let top = height - line as f32 * CELL;
        BoundingBox::new(col as f32 * CELL, top - CELL, (col + 1) as f32 * CELL, top)
    }
}

/// Non-overlapping matches of `needle` in `line`, folding ASCII case only.
fn find_all(line: &[char], needle: &[char]) -> Vec<(usize, usize)> {
    let mut hits = Vec::new();
    if needle.is_empty() || needle.len() > line.len() {
        return hits;
    }
    let mut start = 0;
    while start + needle.len() <= line.len() {
        let window = &line[start..start + needle.len()];
        if window
            .iter()
            .zip(needle)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
        {
            hits.push((start, start + needle.len()));
            start += needle.len();
        } else {
            start += 1;
        }
    }
    hits
}

impl Document for TextDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn search_text(&self, page: usize, pattern: &str) -> Result<Vec<BoundingBox>, EngineError> {
        let lines = self.page(page)?;
        let height = Self::page_height(lines);
        let needle: Vec<char> = pattern.chars().collect();

        let mut boxes = Vec::new();
        for (l, line) in lines.iter().enumerate() {
            for (start, end) in find_all(line, &needle) {
                let first = Self::cell(height, l, start);
                let last = Self::cell(height, l, end - 1);
                boxes.push(BoundingBox::new(first.left, first.bottom, last.right, first.top));
            }
        }
        Ok(boxes)
    }

    fn mark_redaction(
        &mut self,
        page: usize,
        region: BoundingBox,
        _fill: FillColor,
    ) -> Result<(), EngineError> {
        check_page(page, self.pages.len())?;
        self.pending.entry(page).or_default().push(region);
        Ok(())
    }

    fn commit_redactions(&mut self, page: usize) -> Result<usize, EngineError> {
        check_page(page, self.pages.len())?;
        let Some(regions) = self.pending.remove(&page) else {
            return Ok(0);
        };

        let lines = &mut self.pages[page];
        let height = Self::page_height(lines);
        for (l, line) in lines.iter_mut().enumerate() {
            for (c, glyph) in line.iter_mut().enumerate() {
                let cell = Self::cell(height, l, c);
                let (cx, cy) = (cell.left + CELL / 2.0, cell.bottom + CELL / 2.0);
                if regions.iter().any(|r| r.contains(cx, cy)) {
                    *glyph = REDACTED_GLYPH;
                }
            }
        }
        Ok(regions.len())
    }

    fn extract_text(&self, page: usize) -> Result<String, EngineError> {
        let lines = self.page(page)?;
        Ok(lines
            .iter()
            .map(|l| l.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn render_page(&self, page: usize, dpi: u32) -> Result<DynamicImage, EngineError> {
        let lines = self.page(page)?;
        let scale = dpi as f32 / 72.0;
        let width = (Self::page_width(lines) * scale).ceil() as u32;
        let height = (Self::page_height(lines) * scale).ceil() as u32;
        let cell_px = ((CELL * scale).round() as u32).max(1);

        let mut img = RgbImage::from_pixel(width.max(1), height.max(1), Rgb([255, 255, 255]));
        for (l, line) in lines.iter().enumerate() {
            for (c, glyph) in line.iter().enumerate() {
                let x = (c as f32 * CELL * scale) as i32;
                let y = (l as f32 * CELL * scale) as i32;
                if *glyph == REDACTED_GLYPH {
                    draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(cell_px, cell_px), Rgb([0, 0, 0]));
                } else if !glyph.is_whitespace() {
                    let inset = (cell_px / 5) as i32;
                    let size = cell_px.saturating_sub(2 * inset as u32).max(1);
                    draw_filled_rect_mut(
                        &mut img,
                        Rect::at(x + inset, y + inset).of_size(size, size),
                        Rgb([96, 96, 96]),
                    );
                }
            }
        }
        Ok(DynamicImage::ImageRgb8(img))
    }

    fn save(&self, path: &Path) -> Result<(), EngineError> {
        let pages: Vec<String> = (0..self.pages.len())
            .map(|p| self.extract_text(p))
            .collect::<Result<_, _>>()?;
        fs::write(path, PlainTextEngine::encode_pages(&pages)).map_err(|e| EngineError::Save {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }
}
