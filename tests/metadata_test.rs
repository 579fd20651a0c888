//! Episode file registration and garbage collection over HTTP.

mod common;

use std::sync::Arc;

use common::{HarnessOptions, SingleShowAgent, TestHarness, SAMPLE_FILE};
use serde_json::json;

async fn matched_harness() -> TestHarness {
    TestHarness::with_options(HarnessOptions {
        agent: Arc::new(SingleShowAgent),
        ..HarnessOptions::default()
    })
    .await
}

#[tokio::test]
async fn registered_file_builds_series_tree() {
    let h = matched_harness().await;

    let resp = h
        .client
        .post(h.url("/api/metadata/episode-files"))
        .json(&json!({ "path": SAMPLE_FILE }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let matched: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(matched["file"]["file_name"], "Show.Name.S01E02.mkv");
    assert_eq!(matched["episode"]["episode_number"], 2);
    assert_eq!(matched["file"]["episode_id"], matched["episode"]["id"]);

    let tree: Vec<serde_json::Value> = h.get(&h.url("/api/metadata/series")).await.json().await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["name"], "Show Name");
    assert_eq!(tree[0]["seasons"][0]["season_number"], 1);
    assert_eq!(tree[0]["seasons"][0]["episodes"][0]["name"], "Episode 2");

    h.shutdown().await;
}

#[tokio::test]
async fn removing_last_file_collects_the_series() {
    let h = matched_harness().await;

    let matched: serde_json::Value = h
        .client
        .post(h.url("/api/metadata/episode-files"))
        .json(&json!({ "path": SAMPLE_FILE }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let file_id = matched["file"]["id"].as_str().unwrap().to_string();

    let resp = h
        .client
        .delete(h.url(&format!("/api/metadata/episode-files/{file_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(report["episode"], matched["episode"]["id"]);
    assert!(report["season"].is_string());
    assert!(report["series"].is_string());

    let tree: Vec<serde_json::Value> = h.get(&h.url("/api/metadata/series")).await.json().await.unwrap();
    assert!(tree.is_empty());

    h.shutdown().await;
}

#[tokio::test]
async fn unmatched_file_is_not_kept() {
    // No TMDB key: searches come back empty.
    let h = TestHarness::start().await;

    let resp = h
        .client
        .post(h.url("/api/metadata/episode-files"))
        .json(&json!({ "path": SAMPLE_FILE }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    assert!(h.ctx.metadata.store().find_episode_file_by_path(
        &h.ctx.media_root().join(SAMPLE_FILE)
    )
    .is_none());

    h.shutdown().await;
}

#[tokio::test]
async fn bad_ids_and_paths_are_rejected() {
    let h = matched_harness().await;

    let resp = h
        .client
        .delete(h.url("/api/metadata/episode-files/not-a-uuid"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = h
        .client
        .post(h.url("/api/metadata/episode-files"))
        .json(&json!({ "path": "../outside.mkv" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    h.shutdown().await;
}
