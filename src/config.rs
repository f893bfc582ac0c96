//! Pipeline configuration
//!
//! One explicit structure carries every parameter of a run. It is built from
//! defaults, a YAML file, or CLI flags, validated once, and then passed by
//! value into [`crate::Pipeline`].

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FeatureError, FeatureResult};
use crate::segment::frames_for_duration;

/// Fill value (dB) used when padding is enabled without an explicit value
pub const DEFAULT_PAD_VALUE: f32 = -80.0;

/// How a multi-channel waveform is collapsed to mono
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MonoStrategy {
    /// Per-sample arithmetic mean across all channels
    #[default]
    Mean,
    /// Keep channel 0, discard the rest
    First,
}

/// STFT framing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Centering {
    /// Signal is zero-padded by `n_fft / 2` so frame `t` is centered on sample `t * hop`
    #[default]
    Centered,
    /// No padding; frames only cover available samples
    Uncentered,
}

/// Reference level for the dB conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DbReference {
    /// Relative to the per-file maximum power; the loudest bin sits at 0 dB
    #[default]
    Max,
    /// Absolute `10 * log10(power)`
    Unity,
}

/// What happens to a trailing range shorter than one window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TailPolicy {
    /// Residual frames are dropped
    #[default]
    Drop,
    /// One extra segment is emitted, missing columns filled with `value` (dB)
    Pad {
        /// Fill value in dB
        value: f32,
    },
}

impl TailPolicy {
    /// Pad value, if padding is enabled
    pub fn pad_value(&self) -> Option<f32> {
        match self {
            TailPolicy::Drop => None,
            TailPolicy::Pad { value } => Some(*value),
        }
    }
}

/// Export container layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// One `(N, n_mels, win_frames)` array per file
    #[default]
    Stack,
    /// One `(n_mels, win_frames)` array per segment
    Separate,
}

/// Numeric precision of exported arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    /// IEEE 754 single precision
    #[default]
    Float32,
    /// IEEE 754 half precision
    Float16,
}

impl Dtype {
    /// NumPy type string for this precision
    pub fn descr(&self) -> &'static str {
        match self {
            Dtype::Float32 => "<f4",
            Dtype::Float16 => "<f2",
        }
    }
}

/// Spectral analysis parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelConfig {
    /// Target sample rate of the mono signal (Hz)
    pub sample_rate: u32,
    /// FFT window size
    pub n_fft: usize,
    /// Hop length between frames
    pub hop_length: usize,
    /// Number of mel bands
    pub n_mels: usize,
    /// Lower edge of the filterbank (Hz)
    pub fmin: f32,
    /// Upper edge of the filterbank (Hz), at most `sample_rate / 2`
    pub fmax: f32,
    /// STFT framing mode
    pub centering: Centering,
    /// Dynamic range kept below the per-file maximum (dB)
    pub top_db: f32,
    /// dB reference level
    pub reference: DbReference,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            sample_rate: crate::DEFAULT_SAMPLE_RATE,
            n_fft: 1024,
            hop_length: 256,
            n_mels: 64,
            fmin: 20.0,
            fmax: 16000.0,
            centering: Centering::Centered,
            top_db: 80.0,
            reference: DbReference::Max,
        }
    }
}

impl MelConfig {
    /// Nyquist frequency of the target sample rate
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Check every spectral parameter.
    pub fn validate(&self) -> FeatureResult<()> {
        if self.sample_rate == 0 {
            return Err(FeatureError::parameter("sr", "must be positive"));
        }
        if self.n_fft == 0 {
            return Err(FeatureError::parameter("n_fft", "must be positive"));
        }
        if self.hop_length == 0 {
            return Err(FeatureError::parameter("hop", "must be positive"));
        }
        if self.n_mels == 0 {
            return Err(FeatureError::parameter("n_mels", "must be positive"));
        }
        if !self.top_db.is_finite() || self.top_db < 0.0 {
            return Err(FeatureError::parameter(
                "top_db",
                format!("must be a non-negative number, got {}", self.top_db),
            ));
        }

        let nyquist = self.nyquist();
        let in_range = self.fmin.is_finite()
            && self.fmax.is_finite()
            && self.fmin >= 0.0
            && self.fmin < self.fmax
            && self.fmax <= nyquist;
        if !in_range {
            return Err(FeatureError::InvalidFrequencyRange {
                fmin: self.fmin,
                fmax: self.fmax,
                nyquist,
            });
        }
        Ok(())
    }
}

/// Segmentation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Window duration (seconds)
    pub win_seconds: f64,
    /// Step between window starts (seconds)
    pub step_seconds: f64,
    /// Trailing partial-window policy
    pub tail: TailPolicy,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            win_seconds: 1.0,
            step_seconds: 0.5,
            tail: TailPolicy::Drop,
        }
    }
}

impl SegmentConfig {
    /// Check durations and pad value against the analysis geometry.
    pub fn validate(&self, sample_rate: u32, hop_length: usize) -> FeatureResult<()> {
        frames_for_duration("win_seconds", self.win_seconds, sample_rate, hop_length)?;
        frames_for_duration("step_seconds", self.step_seconds, sample_rate, hop_length)?;
        if let Some(value) = self.tail.pad_value() {
            if value.is_nan() {
                return Err(FeatureError::parameter("pad_value", "must not be NaN"));
            }
        }
        Ok(())
    }
}

/// Export parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Container layout
    pub save_mode: SaveMode,
    /// Exported precision
    pub dtype: Dtype,
    /// Also write the whole spectrogram as `<stem>_mel_full.npy`
    pub save_full_mel: bool,
    /// File name of the shared index, relative to the output directory
    pub index_csv: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            save_mode: SaveMode::Stack,
            dtype: Dtype::Float32,
            save_full_mel: false,
            index_csv: "index.csv".to_string(),
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Channel reduction rule
    pub mono: MonoStrategy,
    /// Spectral analysis
    pub mel: MelConfig,
    /// Segmentation
    pub segment: SegmentConfig,
    /// Export
    pub export: ExportConfig,
}

impl PipelineConfig {
    /// Load a configuration from a YAML file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }

    /// Check the whole configuration.
    pub fn validate(&self) -> FeatureResult<()> {
        self.mel.validate()?;
        self.segment
            .validate(self.mel.sample_rate, self.mel.hop_length)?;
        if self.export.index_csv.trim().is_empty() {
            return Err(FeatureError::parameter("index_csv", "must not be empty"));
        }
        Ok(())
    }
}
