//! Visual redaction: mark every match of every pattern and commit page by page.

use crate::engine::{Document, FillColor};
use crate::error::EngineError;
use std::collections::BTreeSet;
use tracing::debug;

/// Margin added around every match, in page units, so glyph overhang and
/// sub-pixel metrics stay covered.
pub const REDACTION_MARGIN: f32 = 2.0;

/// What redaction did to one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRedaction {
    /// 0-based page index.
    pub index: usize,
    /// Regions committed on this page.
    pub regions: usize,
    /// Page text as it was immediately before the commit.
    pub text: String,
}

/// Per-page outcome of [`apply_redactions`], in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionSummary {
    pub pages: Vec<PageRedaction>,
}

impl RedactionSummary {
    pub fn total_regions(&self) -> usize {
        self.pages.iter().map(|p| p.regions).sum()
    }

    pub fn page_texts(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().map(|p| p.text.as_str())
    }
}

/// Redact every occurrence of every pattern in `doc`.
///
/// Pages are processed in order, and each page's marks are committed before
/// the next page is searched. Running it again on the result finds nothing
/// and changes nothing.
pub fn apply_redactions(
    doc: &mut dyn Document,
    patterns: &BTreeSet<String>,
    fill: FillColor,
) -> Result<RedactionSummary, EngineError> {
    let mut summary = RedactionSummary::default();

    for page in 0..doc.page_count() {
        let text = doc.extract_text(page)?;

        let mut marked = 0;
        for pattern in patterns {
            for region in doc.search_text(page, pattern)? {
                doc.mark_redaction(page, region.padded(REDACTION_MARGIN), fill)?;
                marked += 1;
            }
        }

        let regions = doc.commit_redactions(page)?;
        if marked > 0 {
            debug!(page = page + 1, regions, "Page redacted");
        }
        summary.pages.push(PageRedaction {
            index: page,
            regions,
            text,
        });
    }

    Ok(summary)
}
