//! API integration tests
//!
//! Tests for HTTP endpoints using axum's test utilities.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{Options, TestHarness};
use http_body_util::BodyExt;
use streamforge::server::create_router;
use tower::ServiceExt;

fn app(h: &TestHarness) -> Router {
    create_router(h.ctx.clone())
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Helper to get response body as string
async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let h = TestHarness::new();
    let response = get(app(&h), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response.into_body()).await, "OK");
}

#[tokio::test]
async fn test_sources_lists_catalogued_files() {
    let h = TestHarness::new();
    let response = get(app(&h), "/api/sources").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_string(response.into_body()).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let sources = json.as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["hash"], h.hash.as_str());
    assert!(sources[0]["path"].as_str().unwrap().ends_with("movie.mkv"));
}

#[tokio::test]
async fn test_streams_empty_initially() {
    let h = TestHarness::new();
    let response = get(app(&h), "/api/streams").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response.into_body()).await, "[]");
}

#[tokio::test]
async fn test_hls_manifest() {
    let h = TestHarness::with_options(Options {
        duration: 7.0,
        ..Options::default()
    });
    let uri = format!("/api/stream/{}/hls", h.hash);
    let response = get(app(&h), &uri).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.apple.mpegurl"
    );
    assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-cache");

    let body = body_to_string(response.into_body()).await;
    assert!(body.starts_with("#EXTM3U"));
    assert!(body.contains(&format!("{}/0.ts\n", uri)));
    assert!(body.contains(&format!("{}/3.ts\n", uri)));
    assert!(!body.contains("/4.ts"));
    assert!(body.contains("#EXTINF:1.000000,"));
    assert!(body.trim_end().ends_with("#EXT-X-ENDLIST"));

    // Manifests never start a transcode.
    assert!(h.launches().is_empty());
    assert_eq!(h.streams().stream_count(), 0);
}

#[tokio::test]
async fn test_hls_manifest_carries_resolution() {
    let h = TestHarness::new();
    let uri = format!("/api/stream/{}/hls?resolution=standard_hd", h.hash);
    let response = get(app(&h), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_to_string(response.into_body()).await;
    assert!(body.contains("/0.ts?resolution=STANDARD_HD\n"));
}

#[tokio::test]
async fn test_dash_manifest() {
    let h = TestHarness::with_options(Options {
        audio: true,
        ..Options::default()
    });
    let response = get(app(&h), &format!("/api/stream/{}/dash", h.hash)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/dash+xml"
    );

    let body = body_to_string(response.into_body()).await;
    assert!(body.contains("<MPD"));
    assert!(body.contains("init_v.webm"));
    assert!(body.contains("init_a.webm"));
    assert!(body.contains("$Number$_v.webm"));
}

#[tokio::test]
async fn test_unknown_stream_type() {
    let h = TestHarness::new();
    let response = get(app(&h), &format!("/api/stream/{}/flv", h.hash)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_resolution() {
    let h = TestHarness::new();
    let response = get(app(&h), &format!("/api/stream/{}/hls?resolution=8K", h.hash)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_to_string(response.into_body()).await;
    assert!(body.contains("8K"));
}

#[tokio::test]
async fn test_unknown_hash() {
    let h = TestHarness::new();
    let response = get(app(&h), "/api/stream/0123456789abcdef/hls").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app(&h), "/api/stream/0123456789abcdef/hls/0.ts").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_segment_past_end() {
    let h = TestHarness::with_options(Options {
        duration: 10.0,
        ..Options::default()
    });
    let response = get(app(&h), &format!("/api/stream/{}/hls/5.ts", h.hash)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.launches().is_empty());
}

#[tokio::test]
async fn test_malformed_segment() {
    let h = TestHarness::new();
    for token in ["x.ts", "-1.ts", "init.ts", "1.mp4"] {
        let response = get(app(&h), &format!("/api/stream/{}/hls/{}", h.hash, token)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "token {}", token);
    }
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial_test::serial]
async fn test_segment_served_from_transcode() {
    let h = TestHarness::started(Options::default());
    let response = get(app(&h), &format!("/api/stream/{}/hls/0.ts", h.hash)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "video/mp2t");
    assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "9");
    assert_eq!(body_to_string(response.into_body()).await, "segment 0");

    let response = get(app(&h), "/api/streams").await;
    let body = body_to_string(response.into_body()).await;
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json[0]["hash"], h.hash.as_str());
    assert_eq!(json[0]["stream_type"], "hls");

    h.streams().shutdown().await;
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial_test::serial]
async fn test_cancelled_segment_is_unavailable() {
    let h = TestHarness::started(Options::default());
    h.streams().shutdown().await;

    let response = get(app(&h), &format!("/api/stream/{}/hls/0.ts", h.hash)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_to_string(response.into_body()).await.is_empty());
}
