use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Route accepting a multipart upload and answering with a [`KeywordResponse`]
pub const KEYWORD_PATH: &str = "/keyword";
/// Route reloading the classifier artifact, answers with a [`RefreshResponse`]
pub const REFRESH_PATH: &str = "/refresh";
/// Route answering with a [`HealthResponse`]
pub const HEALTH_PATH: &str = "/health";

/// Multipart field carrying the audio file
pub const AUDIO_FIELD: &str = "audio";

pub const UNKNOWN_KEYWORD_MESSAGE: &str = "The keyword is unknown.";
pub const PREDICTION_FAILED_MESSAGE: &str =
    "An error occurred while trying to predict the keyword in the file.";
pub const UNDECODABLE_AUDIO_MESSAGE: &str = "The file could not be decoded as audio.";
pub const MISSING_AUDIO_MESSAGE: &str = "No audio file was provided.";

/// Body of a `POST /keyword` response
///
/// A recognised command comes back as `{"keyword": "..."}`. Everything else,
/// including the unknown category and all errors, is `{"message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum KeywordResponse {
    Keyword { keyword: String },
    Message { message: String },
}

impl KeywordResponse {
    pub fn recognised(label: impl Into<String>) -> Self {
        KeywordResponse::Keyword {
            keyword: label.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        KeywordResponse::Message {
            message: message.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::message(UNKNOWN_KEYWORD_MESSAGE)
    }

    /// The predicted command, if the server recognised one
    pub fn keyword(&self) -> Option<&str> {
        match self {
            KeywordResponse::Keyword { keyword } => Some(keyword),
            KeywordResponse::Message { .. } => None,
        }
    }

    pub fn message_text(&self) -> Option<&str> {
        match self {
            KeywordResponse::Keyword { .. } => None,
            KeywordResponse::Message { message } => Some(message),
        }
    }

    /// True when the server heard a word outside the command set
    pub fn is_unknown(&self) -> bool {
        self.message_text() == Some(UNKNOWN_KEYWORD_MESSAGE)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Body of a `POST /refresh` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResponse {
    /// Whether a classifier is usable after the refresh
    pub loaded: bool,
    /// What the refresh did: `loaded`, `retained` or `cleared`
    pub outcome: String,
}

/// Body of a `GET /health` response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_body_has_only_keyword_field() {
        let json = KeywordResponse::recognised("stop").to_json().unwrap();
        assert_eq!(json, r#"{"keyword":"stop"}"#);
    }

    #[test]
    fn unknown_body_is_a_message() {
        let response = KeywordResponse::from_json(br#"{"message":"The keyword is unknown."}"#)
            .unwrap();
        assert!(response.is_unknown());
        assert_eq!(response.keyword(), None);
    }

    #[test]
    fn error_message_is_not_unknown() {
        let response = KeywordResponse::message(PREDICTION_FAILED_MESSAGE);
        assert!(!response.is_unknown());
        assert_eq!(response.message_text(), Some(PREDICTION_FAILED_MESSAGE));
    }

    #[test]
    fn garbage_body_is_a_json_error() {
        let err = KeywordResponse::from_json(b"<html>").unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }
}
