//! Waveform containers

use ndarray::Array1;

/// Decoded audio: interleaved samples plus format
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Interleaved samples, `frames * channels` long
    pub samples: Vec<f32>,
    /// Native sample rate (Hz)
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl Waveform {
    /// Create a waveform from interleaved samples
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Samples per channel. Zero when there are no channels.
    pub fn len(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// True when there are no samples per channel
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }
}

/// Single-channel signal, always rank 1
#[derive(Debug, Clone, PartialEq)]
pub struct MonoSignal {
    /// Samples
    pub samples: Array1<f32>,
    /// Sample rate (Hz)
    pub sample_rate: u32,
}

impl MonoSignal {
    /// Wrap a sample vector
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Array1::from(samples),
            sample_rate,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when there are no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples as a contiguous slice
    pub fn as_slice(&self) -> &[f32] {
        // Array1::from(Vec) is always in standard layout
        self.samples.as_slice().unwrap_or(&[])
    }
}
