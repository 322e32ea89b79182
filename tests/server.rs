//! Request-handler tests for the HTTP surface.

#![cfg(feature = "server")]

use axum::http::StatusCode;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pdf_anonymizer::engine::PlainTextEngine;
use pdf_anonymizer::fetch::{FetchedBody, HttpFetch};
use pdf_anonymizer::server::{handle_request, health, AppState};
use pdf_anonymizer::storage::MemoryBlobStore;
use pdf_anonymizer::{AnonymizeError, AnonymizerConfig, FetchError, ServiceFactory, Services};
use serde_json::json;
use std::sync::Arc;

struct Unreachable;

impl HttpFetch for Unreachable {
    fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        Err(FetchError::Transport(format!("connection refused: {url}")))
    }
}

fn state(store: Option<Arc<MemoryBlobStore>>) -> AppState {
    let factory: ServiceFactory = Arc::new(move |_config: &AnonymizerConfig| {
        let services = Services::new(Box::new(PlainTextEngine::new()), Box::new(Unreachable));
        Ok::<_, AnonymizeError>(match &store {
            Some(s) => services.with_store(s.clone()),
            None => services,
        })
    });
    AppState::new(AnonymizerConfig::default(), factory)
}

fn body(v: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&v).unwrap()
}

#[tokio::test]
async fn test_successful_request_returns_200_with_process_id() {
    let payload = STANDARD.encode(PlainTextEngine::encode_pages(&["Dear Mr Smith"]));
    let (status, resp) = handle_request(
        &state(None),
        &body(json!({
            "sensitive_content": ["smith"],
            "pdf_content": payload,
            "output_format": ["md"],
            "process_id": "req-1",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["process_id"], "req-1");
    assert_eq!(resp["md"], "## Page 1\n\nDear Mr [REDACTED]\n\n");
}

#[tokio::test]
async fn test_non_json_body_is_400() {
    let (status, resp) = handle_request(&state(None), b"sensitive_content=a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp, json!({ "error": "No JSON data provided" }));
}

#[tokio::test]
async fn test_empty_object_is_400() {
    let (status, resp) = handle_request(&state(None), b"{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "No JSON data provided");
}

#[tokio::test]
async fn test_both_sources_rejected() {
    let (status, resp) = handle_request(
        &state(None),
        &body(json!({
            "sensitive_content": ["a"],
            "pdf_content": "YQ==",
            "pdf_file": "https://example.com/a.pdf",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error"], "Only one of pdf_content or pdf_file may be provided");
}

#[tokio::test]
async fn test_unreachable_url_is_502() {
    let (status, resp) = handle_request(
        &state(None),
        &body(json!({ "sensitive_content": ["a"], "pdf_file": "https://example.com/a.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(resp["error"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_url_delivery_without_storage_is_500() {
    let (status, resp) = handle_request(
        &state(None),
        &body(json!({ "sensitive_content": ["a"], "pdf_content": "YQ==", "result_deliver": "url" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp["error"].is_string());
}

#[tokio::test]
async fn test_url_delivery_returns_references() {
    let store = Arc::new(MemoryBlobStore::new());
    let payload = STANDARD.encode(PlainTextEngine::encode_pages(&["Ω one", "Ω two"]));
    let (status, resp) = handle_request(
        &state(Some(store.clone())),
        &body(json!({
            "sensitive_content": ["Ω"],
            "pdf_content": payload,
            "output_format": ["img", "pdf"],
            "result_deliver": "url",
            "process_id": "srv",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["pdf"], "anonymized/srv/result.pdf");
    assert_eq!(
        resp["img"],
        json!(["anonymized/srv/result_page_1.png", "anonymized/srv/result_page_2.png"])
    );
    assert_eq!(store.keys("anonymized").len(), 3);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let state = state(None);
    let mut handles = Vec::new();
    for i in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let text = format!("client {i} secret");
            let req = body(json!({
                "sensitive_content": ["secret"],
                "pdf_content": STANDARD.encode(PlainTextEngine::encode_pages(&[text])),
                "output_format": ["md"],
                "process_id": format!("c-{i}"),
            }));
            handle_request(&state, &req).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let (status, resp) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["process_id"], format!("c-{i}"));
        assert_eq!(resp["md"], format!("## Page 1\n\nclient {i} [REDACTED]\n\n"));
    }
}

#[test]
fn test_health_body() {
    assert_eq!(
        health(),
        json!({ "status": "ok", "service": "pdf-anonymizer", "version": env!("CARGO_PKG_VERSION") })
    );
}
