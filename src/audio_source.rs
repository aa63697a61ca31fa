//! Audio sources accepted by the spotter and their decoding into mono waveforms
//!
//! Decoding keeps the native sample rate. Multi-channel files are averaged
//! down to one channel and integer PCM is scaled into `[-1.0, 1.0)`.

use crate::error::Result;
use hound::{SampleFormat, WavReader};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

/// Where a clip comes from: a file on disk or an uploaded buffer
#[derive(Debug, Clone)]
pub enum AudioSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for AudioSource {
    fn from(path: PathBuf) -> Self {
        AudioSource::Path(path)
    }
}

impl From<&Path> for AudioSource {
    fn from(path: &Path) -> Self {
        AudioSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for AudioSource {
    fn from(bytes: Vec<u8>) -> Self {
        AudioSource::Bytes(bytes)
    }
}

/// Decoded single-channel clip
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

impl AudioSource {
    /// Decode the source, failing with [`crate::SpotterError::Decode`] when it is not audio
    pub fn decode(&self) -> Result<Waveform> {
        match self {
            AudioSource::Path(path) => read_wav(WavReader::open(path)?),
            AudioSource::Bytes(bytes) => read_wav(WavReader::new(Cursor::new(bytes.as_slice()))?),
        }
    }

    /// Short description for log lines
    pub fn describe(&self) -> String {
        match self {
            AudioSource::Path(path) => path.display().to_string(),
            AudioSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

fn read_wav<R: Read>(mut reader: WavReader<R>) -> Result<Waveform> {
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    log::debug!(
        "Decoded {} samples at {}Hz from {} channel(s)",
        samples.len(),
        spec.sample_rate,
        spec.channels
    );

    Ok(Waveform {
        samples,
        sample_rate: spec.sample_rate,
    })
}
