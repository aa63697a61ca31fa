//! # HTTP Route Tests
//!
//! Drives the router in-process with stub classifiers and checks the status
//! code and body of every documented outcome.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use keyword_protocol::{
    HealthResponse, KeywordResponse, RefreshResponse, MISSING_AUDIO_MESSAGE,
    PREDICTION_FAILED_MESSAGE, UNDECODABLE_AUDIO_MESSAGE,
};
use keyword_spotter::categories::UNKNOWN_INDEX;
use keyword_spotter::server::router;
use keyword_spotter::test_utils::*;
use keyword_spotter::{KeywordSpotter, OversizePolicy, SpotterConfig};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "keyword-test-boundary";

fn app_for(path: &Path, config: SpotterConfig) -> Router {
    let config = SpotterConfig {
        model_path: path.to_path_buf(),
        ..config
    };
    router(Arc::new(KeywordSpotter::new(
        &config,
        Box::new(IndexFileLoader::new()),
    )))
}

fn multipart_body(field: &str, content: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"clip.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(field: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/keyword")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, content)))
        .unwrap()
}

fn empty_post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send<T: DeserializeOwned>(app: &Router, request: Request<Body>) -> (StatusCode, T) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn one_second_clip() -> Vec<u8> {
    wav_bytes(&to_pcm16(&generate_tone(300.0, 16000, 0.4)), 16000)
}

#[tokio::test]
async fn command_is_returned_as_keyword() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.tflite");
    write_index_artifact(&path, 3).unwrap();
    let app = app_for(&path, SpotterConfig::default());

    let (status, body): (_, KeywordResponse) = send(&app, upload("audio", &one_second_clip())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, KeywordResponse::recognised("down"));
}

#[tokio::test]
async fn unknown_word_is_a_message() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.tflite");
    write_index_artifact(&path, UNKNOWN_INDEX).unwrap();
    let app = app_for(&path, SpotterConfig::default());

    let (status, body): (_, KeywordResponse) = send(&app, upload("audio", &one_second_clip())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_unknown());
}

#[tokio::test]
async fn missing_audio_field_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.tflite");
    write_index_artifact(&path, 0).unwrap();
    let app = app_for(&path, SpotterConfig::default());

    let (status, body): (_, KeywordResponse) = send(&app, upload("file", &one_second_clip())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.message_text(), Some(MISSING_AUDIO_MESSAGE));
}

#[tokio::test]
async fn undecodable_upload_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.tflite");
    write_index_artifact(&path, 0).unwrap();
    let app = app_for(&path, SpotterConfig::default());

    let (status, body): (_, KeywordResponse) = send(&app, upload("audio", b"plain text")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.message_text(), Some(UNDECODABLE_AUDIO_MESSAGE));
}

#[tokio::test]
async fn missing_classifier_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app_for(&dir.path().join("classifier.tflite"), SpotterConfig::default());

    let (status, body): (_, KeywordResponse) = send(&app, upload("audio", &one_second_clip())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.message_text(), Some(PREDICTION_FAILED_MESSAGE));
}

#[tokio::test]
async fn rejected_long_clip_is_a_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.tflite");
    write_index_artifact(&path, 0).unwrap();
    let config = SpotterConfig {
        oversize_policy: OversizePolicy::Reject,
        ..Default::default()
    };
    let app = app_for(&path, config);

    let long_clip = wav_bytes(&to_pcm16(&generate_noise(24000, 5)), 16000);
    let (status, body): (_, KeywordResponse) = send(&app, upload("audio", &long_clip)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.keyword().is_none());
}

#[tokio::test]
async fn refresh_then_predict_recovers_from_missing_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.tflite");
    let app = app_for(&path, SpotterConfig::default());

    let (status, _): (_, KeywordResponse) = send(&app, upload("audio", &one_second_clip())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, refresh): (_, RefreshResponse) = send(&app, empty_post("/refresh")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!refresh.loaded);
    assert_eq!(refresh.outcome, "cleared");

    write_index_artifact(&path, 6).unwrap();
    let (_, refresh): (_, RefreshResponse) = send(&app, empty_post("/refresh")).await;
    assert!(refresh.loaded);
    assert_eq!(refresh.outcome, "loaded");

    let (status, body): (_, KeywordResponse) = send(&app, upload("audio", &one_second_clip())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.keyword(), Some("on"));
}

#[tokio::test]
async fn health_reports_model_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("classifier.tflite");
    write_index_artifact(&path, 0).unwrap();
    let app = app_for(&path, SpotterConfig::default());

    let health_request = || Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, health): (_, HealthResponse) = send(&app, health_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "ok");
    assert!(!health.model_loaded);
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));

    let _: (_, KeywordResponse) = send(&app, upload("audio", &one_second_clip())).await;
    let (_, health): (_, HealthResponse) = send(&app, health_request()).await;
    assert!(health.model_loaded);
}
