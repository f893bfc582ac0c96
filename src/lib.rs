//! # wav2mel
//!
//! Deterministic audio feature pipeline: WAV waveform to mel-log
//! spectrogram to fixed-size, precisely indexed windows for machine-learning
//! datasets.
//!
//! ## Stages
//!
//! - Mono reduction (channel mean or first channel)
//! - STFT, Slaney mel filterbank and dB compression with a `top_db` floor
//! - Segmentation into `(n_mels, win_frames)` windows with an optional padded tail
//! - Export as stacked or per-segment `.npy` arrays (float32/float16) plus a
//!   self-describing CSV index
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wav2mel::{Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let inputs = wav2mel::pipeline::collect_wavs("recordings".as_ref())?;
//! let report = pipeline.run_batch(&inputs, "out".as_ref(), |_| {})?;
//! println!("{} segments", report.index.len());
//! ```

// Require docs for public items
#![warn(missing_docs)]

pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod segment;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::{FeatureError, FeatureResult};
pub use pipeline::Pipeline;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default analysis sample rate (44100 Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
