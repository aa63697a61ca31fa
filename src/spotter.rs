//! Keyword spotter: lazily loaded classifier handle
//!
//! One spotter is built per server process and shared behind an `Arc`. The
//! classifier is either absent or present. `predict` loads it on first use
//! and keeps it; `refresh` swaps in whatever artifact is currently on disk.
//!
//! ```text
//!   Absent --predict/refresh ok--> Present
//!   Present --refresh ok--> Present (new model)
//!   Present --refresh fails--> Present (RetainOnFailure) | Absent (HardReset)
//! ```
//!
//! Load and refresh transitions are serialised. Inference runs on a captured
//! `Arc` to the model with no state lock held.

use crate::audio_source::AudioSource;
use crate::categories::{category_for_index, NUM_CATEGORIES};
use crate::config::SpotterConfig;
use crate::error::{Result, SpotterError};
use crate::features::{self, mfcc::N_MELS, FeatureConfig, FeatureTensor};
use crate::models::{KeywordModel, ModelLoader};
use ndarray::Axis;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use strum::{AsRefStr, Display, EnumString};

/// What a failed refresh does to a classifier that was already working
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RefreshMode {
    /// Keep serving the last model that loaded
    #[default]
    #[strum(serialize = "retain")]
    RetainOnFailure,
    /// Drop the current model whatever the outcome of the reload
    HardReset,
}

/// Result of [`KeywordSpotter::refresh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RefreshOutcome {
    /// The artifact loaded and replaced the previous state
    Loaded,
    /// The reload failed and the previous model is still in use
    Retained,
    /// The reload failed and no model is loaded
    Cleared,
}

/// Full result of one classification
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: &'static str,
    pub index: usize,
    pub scores: Vec<f32>,
}

struct LoadedModel {
    model: Box<dyn KeywordModel>,
    n_mfcc: usize,
    time_frames: usize,
}

enum ModelState {
    Absent,
    Present(Arc<LoadedModel>),
}

pub struct KeywordSpotter {
    model_path: PathBuf,
    loader: Box<dyn ModelLoader>,
    refresh_mode: RefreshMode,
    features: FeatureConfig,
    state: RwLock<ModelState>,
    transition: Mutex<()>,
}

impl KeywordSpotter {
    /// Create a spotter with no model loaded yet
    pub fn new(config: &SpotterConfig, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            model_path: config.model_path.clone(),
            loader,
            refresh_mode: config.refresh_mode,
            features: FeatureConfig {
                oversize: config.oversize_policy,
                ..FeatureConfig::default()
            },
            state: RwLock::new(ModelState::Absent),
            transition: Mutex::new(()),
        }
    }

    /// Create a spotter loading TensorFlow Lite artifacts
    #[cfg(feature = "tflite")]
    pub fn from_config(config: &SpotterConfig) -> Self {
        let threads = i32::try_from(config.thread_count).unwrap_or(i32::MAX);
        Self::new(
            config,
            Box::new(crate::models::TfliteModelLoader::new(threads)),
        )
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Coefficient count of the loaded model
    pub fn n_mfcc(&self) -> Option<usize> {
        self.current().map(|loaded| loaded.n_mfcc)
    }

    /// Load the classifier now instead of on the first prediction
    pub fn warm_up(&self) -> bool {
        self.ensure_loaded().is_ok()
    }

    /// Predict the category label of the word spoken in `source`
    ///
    /// Fails with [`SpotterError::ClassifierUnavailable`] when no model can be
    /// loaded, and with [`SpotterError::Decode`] when the source is not audio.
    pub fn predict(&self, source: &AudioSource) -> Result<&'static str> {
        self.predict_detailed(source).map(|prediction| prediction.label)
    }

    pub fn predict_detailed(&self, source: &AudioSource) -> Result<Prediction> {
        let loaded = self.ensure_loaded()?;
        let features = features::extract_features(source, &self.feature_config(&loaded))?;
        self.classify(&loaded, features)
    }

    /// Predict from an already decoded mono waveform
    pub fn predict_samples(&self, samples: &[f32]) -> Result<Prediction> {
        let loaded = self.ensure_loaded()?;
        let features = features::compute_features(samples, &self.feature_config(&loaded))?;
        self.classify(&loaded, features)
    }

    /// Reload the artifact from the configured path
    ///
    /// Never fails; check the outcome or [`Self::is_loaded`] afterwards.
    pub fn refresh(&self) -> RefreshOutcome {
        let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        match self.try_load() {
            Ok(loaded) => {
                log::info!(
                    "Refreshed classifier from {} (n_mfcc: {})",
                    self.model_path.display(),
                    loaded.n_mfcc
                );
                *self.write_state() = ModelState::Present(Arc::new(loaded));
                RefreshOutcome::Loaded
            }
            Err(e) => {
                log::warn!(
                    "Failed to refresh classifier from {}: {}",
                    self.model_path.display(),
                    e
                );
                match self.refresh_mode {
                    RefreshMode::RetainOnFailure if self.is_loaded() => {
                        log::warn!("Keeping the previously loaded classifier");
                        RefreshOutcome::Retained
                    }
                    RefreshMode::RetainOnFailure => RefreshOutcome::Cleared,
                    RefreshMode::HardReset => {
                        *self.write_state() = ModelState::Absent;
                        RefreshOutcome::Cleared
                    }
                }
            }
        }
    }

    fn current(&self) -> Option<Arc<LoadedModel>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            ModelState::Present(loaded) => Some(Arc::clone(loaded)),
            ModelState::Absent => None,
        }
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ModelState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_loaded(&self) -> Result<Arc<LoadedModel>> {
        if let Some(loaded) = self.current() {
            return Ok(loaded);
        }

        let _transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished loading while we waited.
        if let Some(loaded) = self.current() {
            return Ok(loaded);
        }

        match self.try_load() {
            Ok(loaded) => {
                log::info!(
                    "Loaded classifier from {} (n_mfcc: {}, time frames: {})",
                    self.model_path.display(),
                    loaded.n_mfcc,
                    loaded.time_frames
                );
                let loaded = Arc::new(loaded);
                *self.write_state() = ModelState::Present(Arc::clone(&loaded));
                Ok(loaded)
            }
            Err(e) => {
                log::warn!(
                    "No classifier could be loaded from {}: {}",
                    self.model_path.display(),
                    e
                );
                Err(SpotterError::ClassifierUnavailable)
            }
        }
    }

    fn try_load(&self) -> Result<LoadedModel> {
        let model = self.loader.load(&self.model_path)?;
        let shape = model.input_shape();

        if shape.len() != 4 {
            return Err(SpotterError::ModelLoadError(format!(
                "Expected a rank-4 input shape, got {:?}",
                shape
            )));
        }
        let (time_frames, n_mfcc) = (shape[1], shape[2]);
        if n_mfcc == 0 || n_mfcc > N_MELS {
            return Err(SpotterError::ModelLoadError(format!(
                "Model expects {} coefficients, supported range is 1..={}",
                n_mfcc, N_MELS
            )));
        }

        Ok(LoadedModel {
            model,
            n_mfcc,
            time_frames,
        })
    }

    fn feature_config(&self, loaded: &LoadedModel) -> FeatureConfig {
        FeatureConfig {
            n_mfcc: loaded.n_mfcc,
            ..self.features.clone()
        }
    }

    fn classify(&self, loaded: &LoadedModel, features: FeatureTensor) -> Result<Prediction> {
        let frames = features.dim().0;
        if frames != loaded.time_frames {
            return Err(SpotterError::InvalidInput(format!(
                "Clip yields {} time frames, the loaded model expects {}",
                frames, loaded.time_frames
            )));
        }
        log::debug!("Features {:?}", features.dim());

        let batch = features.insert_axis(Axis(0));
        let scores = loaded.model.forward(&batch)?;

        if scores.len() != NUM_CATEGORIES {
            return Err(SpotterError::Inference(format!(
                "Model returned {} scores, expected {}",
                scores.len(),
                NUM_CATEGORIES
            )));
        }

        let index = arg_max(&scores)
            .ok_or_else(|| SpotterError::Inference("Model returned no valid scores".to_string()))?;
        let label = category_for_index(index).ok_or_else(|| {
            SpotterError::Inference(format!("No category for index {}", index))
        })?;

        log::debug!("Predicted '{}' (index {})", label, index);

        Ok(Prediction {
            label,
            index,
            scores,
        })
    }
}

/// Index of the highest score; the lowest index wins ties and NaN never wins
pub fn arg_max(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}
