//! HTTP resource over a shared [`KeywordSpotter`]
//!
//! Routes are thin adapters: the handler pulls the upload out of the
//! multipart body, runs the spotter on the blocking pool and maps the outcome
//! onto the bodies defined in `keyword_protocol`.

use crate::audio_source::AudioSource;
use crate::categories::is_known_command;
use crate::error::SpotterError;
use crate::spotter::KeywordSpotter;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use keyword_protocol::{
    HealthResponse, KeywordResponse, RefreshResponse, AUDIO_FIELD, HEALTH_PATH, KEYWORD_PATH,
    MISSING_AUDIO_MESSAGE, PREDICTION_FAILED_MESSAGE, REFRESH_PATH, UNDECODABLE_AUDIO_MESSAGE,
};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Server state shared across handlers
pub struct AppState {
    pub spotter: Arc<KeywordSpotter>,
}

pub fn router(spotter: Arc<KeywordSpotter>) -> Router {
    let state = Arc::new(AppState { spotter });

    Router::new()
        .route(KEYWORD_PATH, post(predict_keyword))
        .route(REFRESH_PATH, post(refresh_model))
        .route(HEALTH_PATH, get(health_check))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C
pub async fn serve(addr: &str, spotter: Arc<KeywordSpotter>) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("🌐 Keyword server listening on {}", listener.local_addr()?);

    axum::serve(listener, router(spotter))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("🛑 Shutting down keyword server");
        })
        .await
}

async fn predict_keyword(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> (StatusCode, Json<KeywordResponse>) {
    let audio = match read_audio_field(multipart).await {
        Some(audio) => audio,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(KeywordResponse::message(MISSING_AUDIO_MESSAGE)),
            )
        }
    };

    log::debug!("Received {} bytes of audio", audio.len());

    let spotter = Arc::clone(&state.spotter);
    let result =
        tokio::task::spawn_blocking(move || spotter.predict(&AudioSource::Bytes(audio))).await;

    let (status, body) = match result {
        Ok(Ok(label)) => keyword_response(label),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            log::error!("Prediction task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                KeywordResponse::message(PREDICTION_FAILED_MESSAGE),
            )
        }
    };
    (status, Json(body))
}

async fn refresh_model(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    let spotter = Arc::clone(&state.spotter);
    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = spotter.refresh();
        (spotter.is_loaded(), outcome)
    })
    .await;

    match outcome {
        Ok((loaded, outcome)) => Json(RefreshResponse {
            loaded,
            outcome: outcome.to_string(),
        }),
        Err(e) => {
            log::error!("Refresh task failed: {}", e);
            Json(RefreshResponse {
                loaded: state.spotter.is_loaded(),
                outcome: "failed".to_string(),
            })
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_loaded: state.spotter.is_loaded(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Bytes of the first `audio` field; `None` when absent or unreadable
async fn read_audio_field(mut multipart: Multipart) -> Option<Vec<u8>> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some(AUDIO_FIELD) => {
                return match field.bytes().await {
                    Ok(bytes) => Some(bytes.to_vec()),
                    Err(e) => {
                        log::warn!("Failed to read audio field: {}", e);
                        None
                    }
                };
            }
            Ok(Some(_)) => continue,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Malformed multipart body: {}", e);
                return None;
            }
        }
    }
}

fn keyword_response(label: &str) -> (StatusCode, KeywordResponse) {
    if is_known_command(label) {
        (StatusCode::OK, KeywordResponse::recognised(label))
    } else {
        (StatusCode::OK, KeywordResponse::unknown())
    }
}

fn error_response(error: &SpotterError) -> (StatusCode, KeywordResponse) {
    match error {
        SpotterError::Decode(e) => {
            log::debug!("Rejecting undecodable upload: {}", e);
            (
                StatusCode::BAD_REQUEST,
                KeywordResponse::message(UNDECODABLE_AUDIO_MESSAGE),
            )
        }
        _ if error.is_client_error() => {
            (StatusCode::BAD_REQUEST, KeywordResponse::message(error.to_string()))
        }
        _ => {
            log::error!("Prediction failed: {}", error);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                KeywordResponse::message(PREDICTION_FAILED_MESSAGE),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyword_protocol::UNKNOWN_KEYWORD_MESSAGE;

    #[test]
    fn commands_and_unknown_map_to_distinct_bodies() {
        let (status, body) = keyword_response("left");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.keyword(), Some("left"));

        let (status, body) = keyword_response("unknown");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.message_text(), Some(UNKNOWN_KEYWORD_MESSAGE));
    }

    #[test]
    fn unavailable_classifier_is_a_server_error() {
        let (status, body) = error_response(&SpotterError::ClassifierUnavailable);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message_text(), Some(PREDICTION_FAILED_MESSAGE));
    }

    #[test]
    fn oversized_clip_is_a_client_error() {
        let (status, body) = error_response(&SpotterError::ClipTooLong {
            samples: 20000,
            max: 16000,
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.message_text().unwrap().contains("20000"));
    }

    #[test]
    fn client_errors_map_to_bad_request_and_others_to_server_error() {
        let decode = SpotterError::Decode(hound::Error::FormatError("no RIFF tag found"));
        assert!(decode.is_client_error());
        let (status, body) = error_response(&decode);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message_text(), Some(UNDECODABLE_AUDIO_MESSAGE));

        for error in [
            SpotterError::Inference("invoke failed".to_string()),
            SpotterError::InvalidInput("47 time frames".to_string()),
        ] {
            assert!(!error.is_client_error());
            assert_eq!(error_response(&error).0, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
