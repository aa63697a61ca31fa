//! Keyword classifier backed by TensorFlow Lite
//!
//! The artifact is a converted Keras model with input `[1, time_frames, n_mfcc, 1]`
//! and one output score per category.

use crate::categories::NUM_CATEGORIES;
use crate::error::{Result, SpotterError};
use crate::models::{KeywordModel, ModelLoader};
use ndarray::Array4;
use std::path::Path;
use std::sync::Mutex;
use tflitec::interpreter::{Interpreter, Options};
use tflitec::model::Model;

/// Loads `.tflite` artifacts
#[derive(Debug, Clone)]
pub struct TfliteModelLoader {
    thread_count: i32,
}

impl Default for TfliteModelLoader {
    fn default() -> Self {
        Self { thread_count: 1 }
    }
}

impl TfliteModelLoader {
    pub fn new(thread_count: i32) -> Self {
        Self {
            thread_count: thread_count.max(1),
        }
    }
}

impl ModelLoader for TfliteModelLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn KeywordModel>> {
        Ok(Box::new(TfliteKeywordModel::new(path, self.thread_count)?))
    }
}

pub struct TfliteKeywordModel {
    interpreter: Mutex<Interpreter<'static>>,
    input_shape: Vec<usize>,
    input_size: usize,
}

impl TfliteKeywordModel {
    pub fn new(model_path: &Path, thread_count: i32) -> Result<Self> {
        if !model_path.exists() {
            return Err(SpotterError::ModelLoadError(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }
        let path_str = model_path.to_str().ok_or_else(|| {
            SpotterError::ModelLoadError(format!(
                "Model path is not valid UTF-8: {}",
                model_path.display()
            ))
        })?;

        log::info!("Loading keyword model from: {}", path_str);

        // The interpreter borrows the flatbuffer, so each loaded model lives for the
        // rest of the process. Loads only happen at startup and on refresh.
        let model = Box::leak(Box::new(Model::new(path_str).map_err(|e| {
            SpotterError::ModelLoadError(format!("Failed to load keyword model: {}", e))
        })?));

        let mut options = Options::default();
        options.thread_count = thread_count;

        let interpreter = Interpreter::new(model, Some(options)).map_err(|e| {
            SpotterError::ModelLoadError(format!("Failed to create keyword interpreter: {}", e))
        })?;

        interpreter.allocate_tensors().map_err(|e| {
            SpotterError::ModelLoadError(format!("Failed to allocate keyword tensors: {}", e))
        })?;

        let input_shape = {
            let input_tensor = interpreter.input(0).map_err(|e| {
                SpotterError::ModelLoadError(format!("Failed to get keyword input tensor: {}", e))
            })?;
            input_tensor.shape().dimensions().to_vec()
        };

        if input_shape.len() != 4 || input_shape[2] == 0 {
            return Err(SpotterError::ModelLoadError(format!(
                "Expected input shape [batch, time_frames, n_mfcc, channels], got {:?}",
                input_shape
            )));
        }

        let output_size = {
            let output_tensor = interpreter.output(0).map_err(|e| {
                SpotterError::ModelLoadError(format!("Failed to get keyword output tensor: {}", e))
            })?;
            output_tensor.shape().dimensions().iter().product::<usize>()
        };

        if output_size != NUM_CATEGORIES {
            return Err(SpotterError::ModelLoadError(format!(
                "Model scores {} categories, expected {}",
                output_size, NUM_CATEGORIES
            )));
        }

        let input_size = input_shape.iter().product::<usize>();
        log::info!(
            "Keyword model input shape: {:?} (size: {}), {} output scores",
            input_shape,
            input_size,
            output_size
        );

        Ok(Self {
            interpreter: Mutex::new(interpreter),
            input_shape,
            input_size,
        })
    }
}

impl KeywordModel for TfliteKeywordModel {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>> {
        let batch = batch.as_standard_layout();
        let features = batch
            .as_slice()
            .ok_or_else(|| SpotterError::Inference("Features are not contiguous".to_string()))?;

        if features.len() != self.input_size {
            return Err(SpotterError::InvalidInput(format!(
                "Expected {} features ({:?}), got {} ({:?})",
                self.input_size,
                self.input_shape,
                features.len(),
                batch.shape()
            )));
        }

        let interpreter = self.interpreter.lock().map_err(|e| {
            SpotterError::Inference(format!("Failed to lock interpreter: {}", e))
        })?;

        interpreter
            .copy(features, 0)
            .map_err(|e| SpotterError::Inference(format!("Failed to set input: {}", e)))?;

        interpreter
            .invoke()
            .map_err(|e| SpotterError::Inference(format!("Inference failed: {}", e)))?;

        let output_tensor = interpreter
            .output(0)
            .map_err(|e| SpotterError::Inference(format!("Failed to get output: {}", e)))?;

        Ok(output_tensor.data::<f32>().to_vec())
    }
}
