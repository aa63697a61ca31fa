pub mod audio_source;
pub mod categories;
pub mod config;
pub mod error;
pub mod features;
pub mod models;
pub mod server;
pub mod spotter;
pub mod test_utils;

pub use audio_source::{AudioSource, Waveform};
pub use config::{ConfigError, SpotterConfig};
pub use error::{Result, SpotterError};
pub use features::{FeatureConfig, FeatureTensor, OversizePolicy};
pub use spotter::{KeywordSpotter, Prediction, RefreshMode, RefreshOutcome};
