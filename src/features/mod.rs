//! Feature extraction: waveform to `(time_frames, n_mfcc, 1)` MFCC tensor
//!
//! Every clip is brought to [`NUM_SAMPLES`] before analysis, and that same
//! count is used as the sample rate for the mel scale regardless of the rate
//! the clip was recorded at. The trained artifact expects exactly this.

pub mod mfcc;

use crate::audio_source::AudioSource;
use crate::error::{Result, SpotterError};
use ndarray::{Array3, Axis};
use strum::{AsRefStr, Display, EnumString};

/// Nominal clip length in samples (one second at 16 kHz)
pub const NUM_SAMPLES: usize = 16000;

pub const DEFAULT_N_MFCC: usize = 13;
pub const DEFAULT_HOP_LENGTH: usize = 512;
pub const DEFAULT_FRAME_SIZE: usize = 2048;

/// Rank-3 feature tensor `(time_frames, n_mfcc, 1)`
pub type FeatureTensor = Array3<f32>;

/// What to do with clips longer than [`NUM_SAMPLES`]
///
/// Shorter clips are always zero-padded at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum OversizePolicy {
    /// Keep the first `NUM_SAMPLES` samples
    #[default]
    Truncate,
    /// Analyse the whole clip; the tensor gets more time frames
    PassThrough,
    /// Fail with [`SpotterError::ClipTooLong`]
    Reject,
}

/// Parameters for MFCC extraction
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    /// Cepstral coefficients per frame
    pub n_mfcc: usize,
    /// Stride between analysis windows in samples
    pub hop_length: usize,
    /// Analysis window length in samples
    pub frame_size: usize,
    /// Length every clip is padded to, also used as the mel-scale sample rate
    pub num_samples: usize,
    pub oversize: OversizePolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mfcc: DEFAULT_N_MFCC,
            hop_length: DEFAULT_HOP_LENGTH,
            frame_size: DEFAULT_FRAME_SIZE,
            num_samples: NUM_SAMPLES,
            oversize: OversizePolicy::default(),
        }
    }
}

impl FeatureConfig {
    pub fn with_n_mfcc(n_mfcc: usize) -> Self {
        Self {
            n_mfcc,
            ..Default::default()
        }
    }

    /// Time frames produced for a signal of `len` samples after padding/trimming
    pub fn time_frames(&self, len: usize) -> usize {
        let len = match self.oversize {
            OversizePolicy::PassThrough => len.max(self.num_samples),
            OversizePolicy::Truncate | OversizePolicy::Reject => self.num_samples,
        };
        mfcc::frame_count(len, self.frame_size, self.hop_length)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_mfcc == 0 || self.n_mfcc > mfcc::N_MELS {
            return Err(SpotterError::InvalidInput(format!(
                "n_mfcc must be between 1 and {}, got {}",
                mfcc::N_MELS,
                self.n_mfcc
            )));
        }
        if self.hop_length == 0 {
            return Err(SpotterError::InvalidInput(
                "hop_length must be positive".to_string(),
            ));
        }
        if self.frame_size < 2 {
            return Err(SpotterError::InvalidInput(format!(
                "frame_size must be at least 2, got {}",
                self.frame_size
            )));
        }
        if self.num_samples == 0 {
            return Err(SpotterError::InvalidInput(
                "num_samples must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decode `source` and compute its feature tensor
pub fn extract_features(source: &AudioSource, config: &FeatureConfig) -> Result<FeatureTensor> {
    config.validate()?;
    let waveform = source.decode()?;
    if waveform.sample_rate as usize != config.num_samples {
        log::debug!(
            "Clip {} is {}Hz, analysed as {}Hz",
            source.describe(),
            waveform.sample_rate,
            config.num_samples
        );
    }
    compute_features(&waveform.samples, config)
}

/// Compute the feature tensor of an already decoded mono waveform
pub fn compute_features(samples: &[f32], config: &FeatureConfig) -> Result<FeatureTensor> {
    config.validate()?;
    let signal = fit_to_length(samples, config)?;

    let coefficients = mfcc::mfcc(
        &signal,
        config.num_samples as u32,
        config.n_mfcc,
        config.hop_length,
        config.frame_size,
    );

    Ok(coefficients.insert_axis(Axis(2)))
}

/// Right-pad with zeros to `num_samples`; longer clips follow the oversize policy
pub fn fit_to_length(samples: &[f32], config: &FeatureConfig) -> Result<Vec<f32>> {
    let target = config.num_samples;
    if samples.len() <= target {
        let mut padded = samples.to_vec();
        padded.resize(target, 0.0);
        return Ok(padded);
    }

    match config.oversize {
        OversizePolicy::Truncate => {
            log::debug!("Trimming clip from {} to {} samples", samples.len(), target);
            Ok(samples[..target].to_vec())
        }
        OversizePolicy::PassThrough => Ok(samples.to_vec()),
        OversizePolicy::Reject => Err(SpotterError::ClipTooLong {
            samples: samples.len(),
            max: target,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{generate_noise, generate_tone, wav_bytes_f32};

    #[test]
    fn tensor_shape_follows_config() {
        let config = FeatureConfig::default();
        let features = compute_features(&generate_tone(440.0, 8000, 0.5), &config).unwrap();
        assert_eq!(features.dim(), (32, 13, 1));

        let config = FeatureConfig::with_n_mfcc(40);
        let features = compute_features(&generate_tone(440.0, 8000, 0.5), &config).unwrap();
        assert_eq!(features.dim(), (32, 40, 1));
    }

    #[test]
    fn time_frames_depend_only_on_length_hop_and_frame() {
        let config = FeatureConfig {
            hop_length: 256,
            frame_size: 1024,
            ..Default::default()
        };
        let features = compute_features(&generate_noise(3000, 7), &config).unwrap();
        assert_eq!(features.dim().0, config.time_frames(3000));
        assert_eq!(features.dim().0, 1 + NUM_SAMPLES / 256);
    }

    #[test]
    fn extraction_is_deterministic() {
        let bytes = wav_bytes_f32(&generate_noise(NUM_SAMPLES, 42), 16000);
        let source = AudioSource::Bytes(bytes);
        let config = FeatureConfig::default();

        let first = extract_features(&source, &config).unwrap();
        let second = extract_features(&source, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn padded_short_clip_matches_full_clip_away_from_the_padding() {
        let config = FeatureConfig::default();
        let full = generate_noise(NUM_SAMPLES, 3);
        let short = &full[..12000];

        let full_features = compute_features(&full, &config).unwrap();
        let short_features = compute_features(short, &config).unwrap();
        assert_eq!(full_features.dim(), short_features.dim());

        // Frames whose window ends before sample 12000 never see the padding.
        let last_clean = (12000 - config.frame_size / 2) / config.hop_length;
        for t in 0..=last_clean {
            for c in 0..config.n_mfcc {
                let a = full_features[[t, c, 0]];
                let b = short_features[[t, c, 0]];
                assert!((a - b).abs() < 1e-2, "frame {t} coefficient {c}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn short_clip_is_zero_padded() {
        let config = FeatureConfig::default();
        let padded = fit_to_length(&[0.5; 100], &config).unwrap();
        assert_eq!(padded.len(), NUM_SAMPLES);
        assert!(padded[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn oversize_policies() {
        let long = generate_noise(NUM_SAMPLES + 4096, 9);

        let truncate = FeatureConfig::default();
        assert_eq!(compute_features(&long, &truncate).unwrap().dim().0, 32);

        let pass_through = FeatureConfig {
            oversize: OversizePolicy::PassThrough,
            ..Default::default()
        };
        let features = compute_features(&long, &pass_through).unwrap();
        assert_eq!(features.dim().0, 1 + (NUM_SAMPLES + 4096) / 512);
        assert_eq!(features.dim().0, pass_through.time_frames(long.len()));

        let reject = FeatureConfig {
            oversize: OversizePolicy::Reject,
            ..Default::default()
        };
        let err = compute_features(&long, &reject).unwrap_err();
        assert!(matches!(
            err,
            SpotterError::ClipTooLong { samples, max: NUM_SAMPLES } if samples == long.len()
        ));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        for config in [
            FeatureConfig::with_n_mfcc(0),
            FeatureConfig::with_n_mfcc(mfcc::N_MELS + 1),
            FeatureConfig {
                hop_length: 0,
                ..Default::default()
            },
        ] {
            let err = compute_features(&[0.0; 10], &config).unwrap_err();
            assert!(matches!(err, SpotterError::InvalidInput(_)), "{config:?}");
        }
    }

    #[test]
    fn oversize_policy_parses_from_kebab_case() {
        assert_eq!("pass-through".parse::<OversizePolicy>().unwrap(), OversizePolicy::PassThrough);
        assert_eq!(OversizePolicy::Reject.to_string(), "reject");
    }
}
