//! Pipeline stages for document anonymization.
//!
//! Each submodule implements exactly one step, and all of them are
//! synchronous: the only async boundary is around the whole request.
//!
//! ## Data Flow
//!
//! ```text
//! expand ──▶ input ──▶ redact ──▶ render / markdown ──▶ deliver
//! (terms)   (stage+open) (per page)  (pdf, img, md)      (inline/store)
//! ```
//!
//! 1. [`expand`]  : case variants of every sensitive term
//! 2. [`input`]   : inline payload, URL or blob reference → open document
//! 3. [`redact`]  : mark and commit every match, page by page
//! 4. [`render`]  : serialised PDF and per-page PNGs
//! 5. [`markdown`]: text-level masking of the original terms
//! 6. [`encode`]  : PNG and base64 encoding
//! 7. [`deliver`] : inline payloads or deterministic storage keys

pub mod deliver;
pub mod encode;
pub mod expand;
pub mod input;
pub mod markdown;
pub mod redact;
pub mod render;
