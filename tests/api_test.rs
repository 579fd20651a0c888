//! HTTP-level tests for health, error bodies and request ids.

mod common;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::TestHarness;

#[tokio::test]
async fn health_reports_ok() {
    let h = TestHarness::start().await;

    let resp = h.get(&h.url("/health")).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    h.shutdown().await;
}

#[tokio::test]
async fn traversal_ids_are_rejected_with_json_error() {
    let h = TestHarness::start().await;

    let id = URL_SAFE_NO_PAD.encode("../../etc/passwd");
    let resp = h.get(&h.url(&format!("/api/stream/{id}/manifest.mpd"))).await;
    assert_eq!(resp.status(), 400);

    let header_id = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .expect("response carries a request id");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "validation_error");
    assert_eq!(body["request_id"], header_id.as_str());
    assert!(body["error"].as_str().unwrap().contains("media root"));

    h.shutdown().await;
}

#[tokio::test]
async fn client_request_id_is_echoed() {
    let h = TestHarness::start().await;

    let resp = h
        .client
        .get(h.url("/api/stream/not-base64!/manifest.mpd"))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(resp.headers()["x-request-id"], "abc-123");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["request_id"], "abc-123");

    h.shutdown().await;
}

#[tokio::test]
async fn missing_file_is_unprocessable() {
    let h = TestHarness::start().await;

    let resp = h.get(&h.stream_url("tv/missing.mkv", "manifest.mpd")).await;
    assert_eq!(resp.status(), 422);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "probe_error");

    h.shutdown().await;
}
