//! Audio processing modules
//!
//! - WAV decoding into interleaved waveforms
//! - Channel reduction to mono (mean or first channel)
//! - Sample rate conversion to the analysis rate
//! - Mel-log spectrogram computation (Slaney mel scale and area normalization)

mod loader;
mod mel;
mod mono;
mod resampler;
mod waveform;

pub use loader::AudioLoader;
pub use mel::{MelExtractor, MelSpectrogram, frame_count};
pub use mono::reduce_to_mono;
pub use resampler::Resampler;
pub use waveform::{MonoSignal, Waveform};
