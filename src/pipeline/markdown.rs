//! Markdown producer: page text with every original sensitive term masked.
//!
//! This pass is independent of the visual one. It works on the original terms
//! (not their case variants) and matches them case-insensitively with Unicode
//! case folding, so it also catches casings the expansion never generated.
//!
//! Page text is normalised first:
//!
//! 1. CRLF / CR → LF
//! 2. invisible code points removed (zero-width space and joiners, BOM, soft
//!    hyphen, word joiner) so they cannot split a term and dodge the mask

use crate::engine::Document;
use crate::error::{AnonymizeError, ValidationError};
use crate::pipeline::redact::RedactionSummary;
use regex::{Regex, RegexBuilder};

/// Replaces every masked term.
pub const REDACTION_MARKER: &str = "[REDACTED]";

const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

/// Case-insensitive matcher for a fixed set of literal terms.
#[derive(Debug, Clone)]
pub struct TermMasker {
    pattern: Option<Regex>,
}

impl TermMasker {
    /// Build one alternation, longest term first so a term that contains
    /// another is masked whole.
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Result<Self, ValidationError> {
        let mut terms: Vec<&str> = terms
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Ok(Self { pattern: None });
        }
        terms.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        terms.dedup();

        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .map_err(|e| ValidationError::new(format!("sensitive_content cannot be matched: {e}")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn mask(&self, text: &str) -> String {
        match &self.pattern {
            Some(re) => re.replace_all(text, REDACTION_MARKER).into_owned(),
            None => text.to_string(),
        }
    }
}

/// Normalise one page's extracted text.
pub fn normalise_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    remove_invisible_chars(&s)
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(INVISIBLE, "")
}

/// Assemble the document: one `## Page {n}` section per page, 1-based.
pub fn assemble<'a>(pages: impl IntoIterator<Item = &'a str>, masker: &TermMasker) -> String {
    let mut out = String::new();
    for (i, text) in pages.into_iter().enumerate() {
        let masked = masker.mask(&normalise_page_text(text));
        out.push_str(&format!("## Page {}\n\n{}\n\n", i + 1, masked));
    }
    out
}

/// Produce the Markdown artifact.
///
/// Pages the visual pass changed are read from the text captured right before
/// their commit; every other page is extracted from the redacted document.
pub fn produce_markdown(
    doc: &dyn Document,
    summary: &RedactionSummary,
    masker: &TermMasker,
) -> Result<String, AnonymizeError> {
    let mut texts = Vec::with_capacity(doc.page_count());
    for page in 0..doc.page_count() {
        let captured = summary
            .pages
            .get(page)
            .filter(|p| p.index == page && p.regions > 0);
        match captured {
            Some(p) => texts.push(p.text.clone()),
            None => texts.push(doc.extract_text(page)?),
        }
    }
    Ok(assemble(texts.iter().map(String::as_str), masker))
}
