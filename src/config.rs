use crate::features::OversizePolicy;
use crate::spotter::RefreshMode;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const MODEL_PATH_VAR: &str = "KWS_MODEL_PATH";
pub const REFRESH_MODE_VAR: &str = "KWS_REFRESH_MODE";
pub const OVERSIZE_POLICY_VAR: &str = "KWS_OVERSIZE_POLICY";
pub const THREADS_VAR: &str = "KWS_THREADS";

/// Artifact loaded when nothing else is configured
pub const DEFAULT_MODEL_PATH: &str = "classifier.tflite";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidValue {
        var: String,
        value: String,
        reason: String,
    },
    #[error("Environment error: {0}")]
    EnvError(#[from] env::VarError),
}

/// Settings for a [`crate::KeywordSpotter`]
#[derive(Debug, Clone, PartialEq)]
pub struct SpotterConfig {
    /// Persisted classifier artifact
    pub model_path: PathBuf,
    /// What a failed refresh does to a working classifier
    pub refresh_mode: RefreshMode,
    /// How clips longer than one second are handled
    pub oversize_policy: OversizePolicy,
    /// Interpreter threads per loaded model
    pub thread_count: usize,
}

impl Default for SpotterConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            refresh_mode: RefreshMode::default(),
            oversize_policy: OversizePolicy::default(),
            thread_count: 1,
        }
    }
}

impl SpotterConfig {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(path) = read_var(MODEL_PATH_VAR)? {
            config.model_path = PathBuf::from(path);
        }
        if let Some(mode) = read_var(REFRESH_MODE_VAR)? {
            config.refresh_mode = parse_var(REFRESH_MODE_VAR, &mode)?;
        }
        if let Some(policy) = read_var(OVERSIZE_POLICY_VAR)? {
            config.oversize_policy = parse_var(OVERSIZE_POLICY_VAR, &policy)?;
        }
        if let Some(threads) = read_var(THREADS_VAR)? {
            let thread_count: usize = parse_var(THREADS_VAR, &threads)?;
            if thread_count == 0 {
                return Err(ConfigError::InvalidValue {
                    var: THREADS_VAR.to_string(),
                    value: threads,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.thread_count = thread_count;
        }

        log::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }
}

/// Read a variable, treating unset and blank the same
fn read_var(name: &str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var: name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
