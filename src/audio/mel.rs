//! Mel spectrogram computation

use ndarray::{Array2, ArrayView2, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::audio::MonoSignal;
use crate::config::{Centering, DbReference, MelConfig};
use crate::error::{FeatureError, FeatureResult};

/// Power floor before taking the logarithm
const AMIN: f32 = 1e-10;

/// Number of STFT frames for a signal of `n_samples` samples.
///
/// Centered: `1 + n_samples / hop`. Uncentered: `1 + (n_samples - n_fft) / hop`,
/// which needs at least `n_fft` samples.
pub fn frame_count(
    n_samples: usize,
    n_fft: usize,
    hop_length: usize,
    centering: Centering,
) -> FeatureResult<usize> {
    if hop_length == 0 {
        return Err(FeatureError::parameter("hop", "must be positive"));
    }
    match centering {
        Centering::Centered => {
            if n_samples == 0 {
                return Err(FeatureError::SignalTooShort { n_samples, required: 1 });
            }
            Ok(1 + n_samples / hop_length)
        }
        Centering::Uncentered => {
            if n_samples < n_fft || n_samples == 0 {
                return Err(FeatureError::SignalTooShort {
                    n_samples,
                    required: n_fft.max(1),
                });
            }
            Ok(1 + (n_samples - n_fft) / hop_length)
        }
    }
}

/// dB-scaled mel spectrogram, shape `(n_mels, total_frames)`
#[derive(Debug, Clone, PartialEq)]
pub struct MelSpectrogram {
    data: Array2<f32>,
}

impl MelSpectrogram {
    /// Wrap a `(n_mels, frames)` matrix
    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    /// Number of mel bands (rows)
    pub fn n_mels(&self) -> usize {
        self.data.nrows()
    }

    /// Number of frames (columns)
    pub fn n_frames(&self) -> usize {
        self.data.ncols()
    }

    /// Largest value, `NEG_INFINITY` for an empty matrix
    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Smallest value, `INFINITY` for an empty matrix
    pub fn min_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Borrow the matrix
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Borrow the owned matrix
    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    /// Take the matrix
    pub fn into_array(self) -> Array2<f32> {
        self.data
    }
}

/// Mel spectrogram extractor
///
/// Holds the Hann window, Slaney mel filterbank and FFT plan for one
/// [`MelConfig`]; reusable across any number of signals.
pub struct MelExtractor {
    config: MelConfig,
    /// `(n_mels, n_fft / 2 + 1)`
    mel_filters: Array2<f32>,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl MelExtractor {
    /// Create an extractor, rejecting invalid geometry before any frame is computed
    pub fn new(config: MelConfig) -> FeatureResult<Self> {
        config.validate()?;

        let window = Self::hann_window(config.n_fft);
        let mel_filters = Self::mel_filterbank(
            config.n_fft,
            config.n_mels,
            config.sample_rate,
            config.fmin,
            config.fmax,
        );
        let fft = FftPlanner::new().plan_fft_forward(config.n_fft);

        Ok(Self {
            config,
            mel_filters,
            window,
            fft,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &MelConfig {
        &self.config
    }

    /// Filterbank weights, `(n_mels, n_fft / 2 + 1)`
    pub fn filters(&self) -> &Array2<f32> {
        &self.mel_filters
    }

    /// Compute the dB-scaled mel spectrogram of a mono signal
    pub fn compute(&self, signal: &MonoSignal) -> FeatureResult<MelSpectrogram> {
        if signal.sample_rate != self.config.sample_rate {
            return Err(FeatureError::SampleRateMismatch {
                expected: self.config.sample_rate,
                actual: signal.sample_rate,
            });
        }
        let power = self.mel_power(signal.as_slice())?;
        let db = Self::power_to_db(power, self.config.reference, self.config.top_db);
        Ok(MelSpectrogram::from_array(db))
    }

    /// Mel-projected power, `(n_mels, total_frames)`
    pub fn mel_power(&self, audio: &[f32]) -> FeatureResult<Array2<f32>> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let n_frames = frame_count(audio.len(), n_fft, hop, self.config.centering)?;
        let n_freqs = n_fft / 2 + 1;

        let padded: Vec<f32> = match self.config.centering {
            Centering::Centered => {
                // Left pad n_fft/2, right pad the rest, so padded.len() - n_fft == audio.len()
                let left = n_fft / 2;
                let right = n_fft - left;
                let mut padded = vec![0.0f32; left + audio.len() + right];
                padded[left..left + audio.len()].copy_from_slice(audio);
                padded
            }
            Centering::Uncentered => audio.to_vec(),
        };

        let mut mel = Array2::<f32>::zeros((self.config.n_mels, n_frames));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];
        let mut power = vec![0.0f32; n_freqs];

        for t in 0..n_frames {
            let start = t * hop;
            let frame = &padded[start..start + n_fft];
            for ((slot, &sample), &w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *slot = Complex::new(sample * w, 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (p, c) in power.iter_mut().zip(&buffer[..n_freqs]) {
                *p = c.norm_sqr();
            }

            for (m, filter) in self.mel_filters.axis_iter(Axis(0)).enumerate() {
                mel[[m, t]] = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
            }
        }

        Ok(mel)
    }

    /// Convert power to dB and clip to `[max - top_db, max]`.
    ///
    /// The maximum is taken over this matrix only.
    pub fn power_to_db(power: Array2<f32>, reference: DbReference, top_db: f32) -> Array2<f32> {
        let ref_db = match reference {
            DbReference::Max => {
                let peak = power.iter().copied().fold(0.0f32, f32::max);
                10.0 * peak.max(AMIN).log10()
            }
            DbReference::Unity => 0.0,
        };

        let mut db = power.mapv_into(|p| 10.0 * p.max(AMIN).log10() - ref_db);

        let max_db = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = max_db - top_db;
        db.mapv_inplace(|v| v.max(floor));
        db
    }

    /// Periodic Hann window
    fn hann_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos())) as f32)
            .collect()
    }

    /// Hz to mel, Slaney scale (linear below 1 kHz, logarithmic above)
    pub fn hz_to_mel(hz: f64) -> f64 {
        let f_sp = 200.0 / 3.0;
        let min_log_hz = 1000.0;
        let min_log_mel = min_log_hz / f_sp;
        let logstep = 6.4f64.ln() / 27.0;

        if hz >= min_log_hz {
            min_log_mel + (hz / min_log_hz).ln() / logstep
        } else {
            hz / f_sp
        }
    }

    /// Mel to Hz, Slaney scale
    pub fn mel_to_hz(mel: f64) -> f64 {
        let f_sp = 200.0 / 3.0;
        let min_log_hz = 1000.0;
        let min_log_mel = min_log_hz / f_sp;
        let logstep = 6.4f64.ln() / 27.0;

        if mel >= min_log_mel {
            min_log_hz * (logstep * (mel - min_log_mel)).exp()
        } else {
            f_sp * mel
        }
    }

    /// Triangular filterbank with Slaney area normalisation, `(n_mels, n_fft / 2 + 1)`
    fn mel_filterbank(n_fft: usize, n_mels: usize, sr: u32, fmin: f32, fmax: f32) -> Array2<f32> {
        let n_freqs = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..n_freqs)
            .map(|k| k as f64 * sr as f64 / n_fft as f64)
            .collect();

        let mel_min = Self::hz_to_mel(fmin as f64);
        let mel_max = Self::hz_to_mel(fmax as f64);
        let mel_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| Self::mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let mut filters = Array2::<f32>::zeros((n_mels, n_freqs));
        for m in 0..n_mels {
            let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let enorm = 2.0 / (right - left);

            for (k, &freq) in fft_freqs.iter().enumerate() {
                let lower = (freq - left) / (center - left);
                let upper = (right - freq) / (right - center);
                let weight = lower.min(upper).max(0.0);
                filters[[m, k]] = (weight * enorm) as f32;
            }
        }

        filters
    }
}
