//! Audio resampling using rubato

use anyhow::Result;
use rubato::{Resampler as RubatoResampler, SincFixedIn, SincInterpolationType, SincInterpolationParameters, WindowFunction};
use tracing::debug;

use super::MonoSignal;

/// Input frames fed to the sinc resampler per call
const CHUNK_SIZE: usize = 1024;

/// Audio resampler
pub struct Resampler;

impl Resampler {
    /// Resample audio from one sample rate to another.
    ///
    /// The output holds exactly `round(len * to_sr / from_sr)` samples,
    /// aligned with the input: the filter delay is flushed and dropped.
    pub fn resample(samples: &[f32], from_sr: u32, to_sr: u32) -> Result<Vec<f32>> {
        if from_sr == to_sr || samples.is_empty() {
            return Ok(samples.to_vec());
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let ratio = to_sr as f64 / from_sr as f64;
        let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)?;
        let delay = resampler.output_delay();
        let expected = (samples.len() as f64 * ratio).round() as usize;

        let mut resampled = Vec::with_capacity(delay + expected + resampler.output_frames_max());
        let mut chunks = samples.chunks_exact(CHUNK_SIZE);
        for chunk in &mut chunks {
            let output = resampler.process(&[chunk], None)?;
            resampled.extend_from_slice(&output[0]);
        }
        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let input: [&[f32]; 1] = [remainder];
            let output = resampler.process_partial(Some(&input[..]), None)?;
            resampled.extend_from_slice(&output[0]);
        }

        // Push zeros through until the delayed tail of the signal is out
        while resampled.len() < delay + expected {
            let output = resampler.process_partial(None::<&[&[f32]]>, None)?;
            if output[0].is_empty() {
                anyhow::bail!(
                    "Resampler stalled at {} of {} samples ({} Hz -> {} Hz)",
                    resampled.len(),
                    delay + expected,
                    from_sr,
                    to_sr
                );
            }
            resampled.extend_from_slice(&output[0]);
        }
        resampled.drain(..delay);
        resampled.truncate(expected);

        debug!("Resampled {} -> {} samples ({} Hz -> {} Hz)", samples.len(), expected, from_sr, to_sr);
        Ok(resampled)
    }

    /// Bring a mono signal to `target_sr`, passing it through unchanged when rates match
    pub fn to_rate(signal: MonoSignal, target_sr: u32) -> Result<MonoSignal> {
        if signal.sample_rate == target_sr {
            return Ok(signal);
        }
        let resampled = Self::resample(signal.as_slice(), signal.sample_rate, target_sr)?;
        Ok(MonoSignal::new(resampled, target_sr))
    }
}
