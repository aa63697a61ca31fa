//! # Keyword Protocol
//!
//! Wire types shared by the keyword spotting server and its clients.
//!
//! This crate provides:
//! - Route paths and the multipart field name used for uploads
//! - The JSON bodies returned by each route
//!
//! ## Example Usage
//!
//! ```rust
//! use keyword_protocol::KeywordResponse;
//!
//! let body = r#"{"keyword": "left"}"#;
//! let response = KeywordResponse::from_json(body.as_bytes()).unwrap();
//! assert_eq!(response.keyword(), Some("left"));
//! ```

pub mod protocol;

// Re-export commonly used types
pub use protocol::{
    HealthResponse, KeywordResponse, ProtocolError, RefreshResponse, AUDIO_FIELD, HEALTH_PATH,
    KEYWORD_PATH, PREDICTION_FAILED_MESSAGE, REFRESH_PATH, UNDECODABLE_AUDIO_MESSAGE,
    UNKNOWN_KEYWORD_MESSAGE, MISSING_AUDIO_MESSAGE,
};
