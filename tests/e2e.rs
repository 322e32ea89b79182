//! End-to-end tests against the real pdfium engine.
//!
//! These need a pdfium shared library and a PDF fixture, so they are gated
//! behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! Fixture and term default to `test_cases/sample.pdf` and `the`; override
//! with `E2E_PDF` and `E2E_TERM`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pdf_anonymizer::{anonymize_json, AnonymizerConfig, FormatOutcome, OutputFormat, Services};
use serde_json::json;
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fixture() -> PathBuf {
    std::env::var("E2E_PDF")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/sample.pdf"))
}

fn term() -> String {
    std::env::var("E2E_TERM").unwrap_or_else(|_| "the".to_string())
}

/// Skip this test if E2E_ENABLED is not set *or* the fixture is missing.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p = fixture();
        if !p.exists() {
            println!("SKIP: fixture not found: {}", p.display());
            return;
        }
        p
    }};
}

fn decode(outcome: Option<&FormatOutcome>) -> Vec<u8> {
    match outcome {
        Some(FormatOutcome::Single(p)) => STANDARD.decode(p.as_inline().unwrap()).unwrap(),
        other => panic!("expected a single inline payload, got {other:?}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn test_redacted_pdf_has_no_searchable_term() {
    let path = e2e_skip_unless_ready!();
    let scratch = tempfile::tempdir().unwrap();
    let config = AnonymizerConfig::builder()
        .scratch_dir(scratch.path())
        .build()
        .unwrap();
    let services = Services::from_config(&config).expect("pdfium must be available");

    let original = std::fs::read(&path).unwrap();
    let term = term();
    let body = json!({
        "sensitive_content": [term],
        "pdf_content": STANDARD.encode(&original),
        "output_format": ["pdf", "img", "md"],
    });
    let resp = anonymize_json(&body, &services, &config).unwrap();

    let pdf = decode(resp.get(OutputFormat::Pdf));
    assert!(pdf.starts_with(b"%PDF"), "output is not a PDF");

    let out = scratch.path().join("redacted.pdf");
    std::fs::write(&out, &pdf).unwrap();
    {
        let doc = services.engine.open(&out).unwrap();
        for page in 0..doc.page_count() {
            let hits = doc.search_text(page, &term).unwrap();
            assert!(hits.is_empty(), "page {} still contains {term:?}", page + 1);
        }

        let Some(FormatOutcome::Pages(images)) = resp.get(OutputFormat::Img) else {
            panic!("img missing");
        };
        assert_eq!(images.len(), doc.page_count());
    }
    std::fs::remove_file(&out).unwrap();

    let md = String::from_utf8(decode_text(resp.get(OutputFormat::Md))).unwrap();
    assert!(md.starts_with("## Page 1\n\n"));
    assert!(!md.to_lowercase().contains(&format!(" {} ", term.to_lowercase())));

    let left: Vec<_> = std::fs::read_dir(scratch.path()).unwrap().collect();
    assert!(left.is_empty(), "workspace left behind: {left:?}");
}

#[test]
fn test_non_pdf_payload_is_rejected() {
    let _ = e2e_skip_unless_ready!();
    let config = AnonymizerConfig::default();
    let services = Services::from_config(&config).expect("pdfium must be available");

    let body = json!({
        "sensitive_content": ["x"],
        "pdf_content": STANDARD.encode(b"GIF89a not a pdf"),
    });
    let err = anonymize_json(&body, &services, &config).unwrap_err();
    assert_eq!(err.http_status(), 400);
}

fn decode_text(outcome: Option<&FormatOutcome>) -> Vec<u8> {
    match outcome {
        Some(FormatOutcome::Single(p)) => p.as_inline().unwrap().as_bytes().to_vec(),
        other => panic!("expected inline markdown, got {other:?}"),
    }
}
