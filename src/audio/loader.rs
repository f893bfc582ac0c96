//! WAV file loading

use anyhow::{Context, Result};
use std::path::Path;

use super::Waveform;

/// Decodes audio files into interleaved f32 waveforms
pub struct AudioLoader;

impl AudioLoader {
    /// Load a file at its native sample rate and channel count
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Waveform> {
        let path = path.as_ref();

        if Self::is_wav(path) {
            return Self::load_wav(path);
        }

        Err(anyhow::anyhow!("Unsupported audio format: {:?}", path))
    }

    /// True for `.wav` files, case-insensitive
    pub fn is_wav(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("wav"))
    }

    fn load_wav(path: &Path) -> Result<Waveform> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {:?}", path))?;

        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Failed to decode samples: {:?}", path))?,
            hound::SampleFormat::Int => {
                let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / max_value))
                    .collect::<std::result::Result<_, _>>()
                    .with_context(|| format!("Failed to decode samples: {:?}", path))?
            }
        };

        Ok(Waveform::new(samples, spec.sample_rate, spec.channels))
    }
}
