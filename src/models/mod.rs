//! Classifier model seam
//!
//! The spotter only needs two things from a trained artifact: its declared
//! input shape and a forward pass producing one score per category.

#[cfg(feature = "tflite")]
pub mod tflite;

use crate::error::Result;
use ndarray::Array4;
use std::path::Path;

#[cfg(feature = "tflite")]
pub use tflite::{TfliteKeywordModel, TfliteModelLoader};

/// A loaded classifier
pub trait KeywordModel: Send + Sync {
    /// Declared input shape, `[batch, time_frames, n_mfcc, channels]`
    fn input_shape(&self) -> &[usize];

    /// Run one `(1, time_frames, n_mfcc, 1)` batch and return one score per category
    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>>;
}

/// Reads a persisted artifact into a [`KeywordModel`]
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn KeywordModel>>;
}
