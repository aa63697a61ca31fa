//! Mel-frequency cepstral coefficients
//!
//! Centered STFT with reflect padding and a periodic Hann window, power
//! spectrum, Slaney mel filterbank with area normalisation, decibel scaling
//! clamped to 80 dB below the peak, orthonormal DCT-II.

use ndarray::Array2;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// Mel bands computed before the DCT
pub const N_MELS: usize = 128;

const TOP_DB: f32 = 80.0;
const AMIN: f32 = 1e-10;

// Slaney mel scale: linear below 1 kHz, logarithmic above.
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Number of STFT frames for a signal of `len` samples
pub fn frame_count(len: usize, frame_size: usize, hop_length: usize) -> usize {
    let padded = len + 2 * (frame_size / 2);
    1 + padded.saturating_sub(frame_size) / hop_length
}

/// Compute MFCCs, returned as `(frames, n_mfcc)` in standard layout
pub fn mfcc(
    signal: &[f32],
    sample_rate: u32,
    n_mfcc: usize,
    hop_length: usize,
    frame_size: usize,
) -> Array2<f32> {
    let power = power_spectrogram(signal, frame_size, hop_length);
    let filterbank = mel_filterbank(sample_rate, frame_size, N_MELS);
    let mel = filterbank.dot(&power);
    let log_mel = power_to_db(mel);
    let coefficients = dct_matrix(n_mfcc, N_MELS).dot(&log_mel);

    coefficients.t().as_standard_layout().into_owned()
}

/// `(frame_size / 2 + 1, frames)` power spectrogram of the centered STFT
fn power_spectrogram(signal: &[f32], frame_size: usize, hop_length: usize) -> Array2<f32> {
    let pad = frame_size / 2;
    let padded = reflect_pad(signal, pad);
    let n_frames = frame_count(signal.len(), frame_size, hop_length);
    let n_freqs = frame_size / 2 + 1;

    let window: Vec<f32> = (0..frame_size)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / frame_size as f64).cos()) as f32)
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame_size);

    let mut spectrogram = Array2::<f32>::zeros((n_freqs, n_frames));
    let mut buffer = vec![Complex::new(0.0f32, 0.0); frame_size];

    for frame in 0..n_frames {
        let start = frame * hop_length;
        for (slot, (&sample, &w)) in buffer
            .iter_mut()
            .zip(padded[start..start + frame_size].iter().zip(window.iter()))
        {
            *slot = Complex::new(sample * w, 0.0);
        }

        fft.process(&mut buffer);

        for (bin, value) in buffer.iter().take(n_freqs).enumerate() {
            spectrogram[[bin, frame]] = value.norm_sqr();
        }
    }

    spectrogram
}

/// Reflect-pad both ends without repeating the edge sample
fn reflect_pad(signal: &[f32], pad: usize) -> Vec<f32> {
    let n = signal.len();
    if n == 0 {
        return vec![0.0; 2 * pad];
    }

    (0..n + 2 * pad)
        .map(|i| signal[reflect_index(i as isize - pad as isize, n)])
        .collect()
}

fn reflect_index(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = index.rem_euclid(period);
    if folded >= len as isize {
        (period - folded) as usize
    } else {
        folded as usize
    }
}

/// `(n_mels, frame_size / 2 + 1)` triangular filters spanning `0..sample_rate / 2`
pub fn mel_filterbank(sample_rate: u32, frame_size: usize, n_mels: usize) -> Array2<f32> {
    let n_freqs = frame_size / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;

    let fft_freqs: Vec<f64> = (0..n_freqs)
        .map(|i| i as f64 * sample_rate as f64 / frame_size as f64)
        .collect();

    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(nyquist);
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut weights = Array2::<f32>::zeros((n_mels, n_freqs));
    for m in 0..n_mels {
        let (lower_hz, center_hz, upper_hz) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
        let enorm = 2.0 / (upper_hz - lower_hz);

        for (bin, &freq) in fft_freqs.iter().enumerate() {
            let rising = (freq - lower_hz) / (center_hz - lower_hz);
            let falling = (upper_hz - freq) / (upper_hz - center_hz);
            let weight = rising.min(falling).max(0.0);
            weights[[m, bin]] = (weight * enorm) as f32;
        }
    }

    weights
}

/// Decibels relative to 1.0, floored at `AMIN` and clamped to `TOP_DB` below the peak
fn power_to_db(power: Array2<f32>) -> Array2<f32> {
    let mut log_spec = power.mapv_into(|x| 10.0 * x.max(AMIN).log10());
    let peak = log_spec.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;
    log_spec.mapv_inplace(|x| x.max(floor));
    log_spec
}

/// `(n_out, n_in)` orthonormal DCT-II basis
pub fn dct_matrix(n_out: usize, n_in: usize) -> Array2<f32> {
    let first_scale = (1.0 / n_in as f64).sqrt();
    let scale = (2.0 / n_in as f64).sqrt();

    Array2::from_shape_fn((n_out, n_in), |(k, n)| {
        let basis = (PI * k as f64 * (2 * n + 1) as f64 / (2 * n_in) as f64).cos();
        let norm = if k == 0 { first_scale } else { scale };
        (basis * norm) as f32
    })
}
