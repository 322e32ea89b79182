//! # pdf-anonymizer
//!
//! Redact sensitive terms from PDF documents and hand back the result as a
//! PDF, per-page PNG images and/or Markdown.
//!
//! Every occurrence of every sensitive term (and every case variant of its
//! non-ASCII letters) is covered by an opaque box and the glyphs underneath are
//! destroyed, not just hidden. The Markdown output is masked separately at the
//! text level with `[REDACTED]`.
//!
//! ## Pipeline Overview
//!
//! ```text
//! JSON request
//!  │
//!  ├─ 1. Validate  fields, formats, delivery mode, process identifier
//!  ├─ 2. Expand    case variants of every sensitive term
//!  ├─ 3. Input     base64 payload, HTTP(S) URL or container/key → open document
//!  ├─ 4. Redact    search, mark and commit every match, page by page
//!  ├─ 5. Produce   pdf / img (one PNG per page) / md
//!  └─ 6. Deliver   inline base64/text, or objects in S3-compatible storage
//! ```
//!
//! Each request owns a private workspace that is removed when the request
//! ends, on success and failure alike.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_anonymizer::{anonymize_json, AnonymizerConfig, Services};
//! use serde_json::json;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnonymizerConfig::default();
//!     // Binds libpdfium from PDFIUM_LIB_PATH, the executable dir or the system.
//!     let services = Services::from_config(&config)?;
//!     let body = json!({
//!         "sensitive_content": ["Alice Martin"],
//!         "pdf_file": "https://example.com/contract.pdf",
//!         "output_format": ["pdf", "md"]
//!     });
//!     let response = anonymize_json(&body, &services, &config)?;
//!     println!("{}", response.to_json());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | via cli | HTTP surface on axum (`POST /api/pdf/anonymize`, `GET /health`) |
//! | `cli`    | on      | Enables the `pdf-anonymizer` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-anonymizer = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod anonymize;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod request;
pub mod resources;
#[cfg(feature = "server")]
pub mod server;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use anonymize::{anonymize, anonymize_async, anonymize_json, default_factory, ServiceFactory, Services};
pub use config::{AnonymizerConfig, AnonymizerConfigBuilder, StorageConfig};
pub use error::{
    AcquisitionError, AnonymizeError, DeliveryError, EngineError, FetchError, StorageError,
    ValidationError,
};
pub use output::{AnonymizationResponse, DeliveredPayload, FormatOutcome};
pub use request::{AnonymizationRequest, DeliveryMode, InputSource, OutputFormat};
