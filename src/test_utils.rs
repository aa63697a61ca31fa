//! Test utilities for keyword spotter tests
//!
//! Synthetic clips, in-memory WAV encoding and stub classifiers that stand in
//! for a trained artifact.

use crate::categories::NUM_CATEGORIES;
use crate::error::{Result, SpotterError};
use crate::features::DEFAULT_N_MFCC;
use crate::models::{KeywordModel, ModelLoader};
use ndarray::Array4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Time frames of a nominal one-second clip at default hop and frame size
pub const NOMINAL_TIME_FRAMES: usize = 32;

/// Sine wave at `frequency` Hz, sampled at 16 kHz
pub fn generate_tone(frequency: f32, samples: usize, amplitude: f32) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            let t = i as f32 / 16000.0;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Silent clip
pub fn generate_silence(samples: usize) -> Vec<f32> {
    vec![0.0; samples]
}

/// Reproducible white noise in `[-0.5, 0.5)`
pub fn generate_noise(samples: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..samples).map(|_| rng.gen_range(-0.5..0.5)).collect()
}

/// Encode 16-bit mono PCM as a WAV file in memory
pub fn wav_bytes(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    wav_bytes_with_spec(samples, spec)
}

/// Encode interleaved 16-bit PCM with an arbitrary spec
pub fn wav_bytes_with_spec(samples: &[i16], spec: hound::WavSpec) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("valid WAV spec");
        for &sample in samples {
            writer.write_sample(sample).expect("in-memory write");
        }
        writer.finalize().expect("in-memory finalize");
    }
    cursor.into_inner()
}

/// Encode 32-bit float mono samples as a WAV file in memory
pub fn wav_bytes_f32(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("valid WAV spec");
        for &sample in samples {
            writer.write_sample(sample).expect("in-memory write");
        }
        writer.finalize().expect("in-memory finalize");
    }
    cursor.into_inner()
}

/// Quantise float samples to 16-bit PCM
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

fn one_hot(index: usize) -> Vec<f32> {
    let mut scores = vec![0.0; NUM_CATEGORIES];
    if let Some(score) = scores.get_mut(index) {
        *score = 1.0;
    }
    scores
}

/// Model that always scores `index` highest
pub struct FixedIndexModel {
    input_shape: Vec<usize>,
    index: usize,
}

impl FixedIndexModel {
    pub fn new(index: usize) -> Self {
        Self::with_n_mfcc(index, DEFAULT_N_MFCC)
    }

    pub fn with_n_mfcc(index: usize, n_mfcc: usize) -> Self {
        Self {
            input_shape: vec![1, NOMINAL_TIME_FRAMES, n_mfcc, 1],
            index,
        }
    }
}

impl KeywordModel for FixedIndexModel {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>> {
        let expected = (1, self.input_shape[1], self.input_shape[2], 1);
        if batch.dim() != expected {
            return Err(SpotterError::Inference(format!(
                "Expected input {:?}, got {:?}",
                expected,
                batch.dim()
            )));
        }
        Ok(one_hot(self.index))
    }
}

/// Model that separates loud clips from silent ones on the first cepstral coefficient
///
/// Silence sits at -100 dB in every mel band, which puts the mean first
/// coefficient near -1131; any audible clip lands far above `-1000`.
pub struct LoudnessModel {
    input_shape: Vec<usize>,
    pub loud_index: usize,
    pub quiet_index: usize,
}

impl LoudnessModel {
    pub fn new(loud_index: usize, quiet_index: usize) -> Self {
        Self {
            input_shape: vec![1, NOMINAL_TIME_FRAMES, DEFAULT_N_MFCC, 1],
            loud_index,
            quiet_index,
        }
    }
}

impl KeywordModel for LoudnessModel {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn forward(&self, batch: &Array4<f32>) -> Result<Vec<f32>> {
        let frames = batch.dim().1.max(1);
        let mean_c0 = (0..batch.dim().1)
            .map(|t| batch[[0, t, 0, 0]])
            .sum::<f32>()
            / frames as f32;

        if mean_c0 > -1000.0 {
            Ok(one_hot(self.loud_index))
        } else {
            Ok(one_hot(self.quiet_index))
        }
    }
}

/// Model with caller-chosen scores, for arg-max edge cases
pub struct ScoresModel {
    input_shape: Vec<usize>,
    scores: Vec<f32>,
}

impl ScoresModel {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            input_shape: vec![1, NOMINAL_TIME_FRAMES, DEFAULT_N_MFCC, 1],
            scores,
        }
    }
}

impl KeywordModel for ScoresModel {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn forward(&self, _batch: &Array4<f32>) -> Result<Vec<f32>> {
        Ok(self.scores.clone())
    }
}

/// Loader reading a stub artifact: a text file holding the winning category index
///
/// A missing file fails like a missing model, unparsable content like a corrupt one.
#[derive(Clone, Default)]
pub struct IndexFileLoader {
    loads: Arc<AtomicUsize>,
}

impl IndexFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of load attempts, successful or not
    pub fn load_attempts(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for IndexFileLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn KeywordModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let content = std::fs::read_to_string(path)?;
        let index = content.trim().parse::<usize>().map_err(|e| {
            SpotterError::ModelLoadError(format!("Corrupt stub artifact {}: {}", path.display(), e))
        })?;
        Ok(Box::new(FixedIndexModel::new(index)))
    }
}

/// Write a stub artifact understood by [`IndexFileLoader`]
pub fn write_index_artifact(path: &Path, index: usize) -> std::io::Result<()> {
    std::fs::write(path, index.to_string())
}

/// Loader handing out a [`LoudnessModel`] without touching the filesystem
pub struct LoudnessLoader {
    pub loud_index: usize,
    pub quiet_index: usize,
}

impl ModelLoader for LoudnessLoader {
    fn load(&self, _path: &Path) -> Result<Box<dyn KeywordModel>> {
        Ok(Box::new(LoudnessModel::new(self.loud_index, self.quiet_index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_noise_is_reproducible_and_bounded() {
        let first = generate_noise(4000, 42);
        assert_eq!(first, generate_noise(4000, 42));
        assert_ne!(first, generate_noise(4000, 43));
        assert!(first.iter().all(|&s| (-0.5..0.5).contains(&s)));
        assert!(first.iter().any(|&s| s < 0.0) && first.iter().any(|&s| s > 0.0));
    }
}
