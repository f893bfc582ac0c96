//! Channel reduction

use crate::audio::{MonoSignal, Waveform};
use crate::config::MonoStrategy;
use crate::error::{FeatureError, FeatureResult};

/// Collapse an interleaved waveform to a single channel.
///
/// The output has exactly `wave.len()` samples and keeps the native sample rate.
pub fn reduce_to_mono(wave: &Waveform, strategy: MonoStrategy) -> FeatureResult<MonoSignal> {
    let channels = wave.channels as usize;
    if channels == 0 {
        return Err(FeatureError::InvalidChannelConfiguration(
            "waveform has 0 channels".to_string(),
        ));
    }
    if wave.samples.len() % channels != 0 {
        return Err(FeatureError::InvalidChannelConfiguration(format!(
            "{} samples do not divide into {} channels",
            wave.samples.len(),
            channels
        )));
    }

    let samples: Vec<f32> = if channels == 1 {
        wave.samples.clone()
    } else {
        match strategy {
            MonoStrategy::Mean => wave
                .samples
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect(),
            MonoStrategy::First => wave
                .samples
                .chunks_exact(channels)
                .map(|frame| frame[0])
                .collect(),
        }
    };

    Ok(MonoSignal::new(samples, wave.sample_rate))
}
