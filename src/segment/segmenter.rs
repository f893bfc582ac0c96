//! Fixed-width windowing of a mel spectrogram

use ndarray::{s, Array2};

use crate::audio::MelSpectrogram;
use crate::config::{SegmentConfig, TailPolicy};
use crate::error::{FeatureError, FeatureResult};

/// Convert a duration to a whole number of hops.
///
/// `max(1, round(seconds * sr / hop))`, with ties rounded to even.
pub fn frames_for_duration(
    name: &'static str,
    seconds: f64,
    sample_rate: u32,
    hop_length: usize,
) -> FeatureResult<usize> {
    if sample_rate == 0 || hop_length == 0 {
        return Err(FeatureError::InvalidWindowConfiguration(format!(
            "{} cannot be converted with sr={} and hop={}",
            name, sample_rate, hop_length
        )));
    }
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(FeatureError::InvalidWindowConfiguration(format!(
            "{} must be a positive number of seconds, got {}",
            name, seconds
        )));
    }

    let frames = (seconds * sample_rate as f64 / hop_length as f64).round_ties_even();
    if frames >= usize::MAX as f64 {
        return Err(FeatureError::InvalidWindowConfiguration(format!(
            "{}={} s is too long",
            name, seconds
        )));
    }
    Ok((frames as usize).max(1))
}

/// One `(n_mels, win_frames)` slice of a spectrogram
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSegment {
    /// Zero-based position in the file's segment sequence
    pub index: usize,
    /// First spectrogram frame covered
    pub start_frame: usize,
    /// One past the last real spectrogram frame covered
    pub end_frame: usize,
    /// Segment values; columns past `end_frame - start_frame` hold the pad value
    pub data: Array2<f32>,
}

impl WindowSegment {
    /// Columns taken from the spectrogram
    pub fn real_frames(&self) -> usize {
        self.end_frame - self.start_frame
    }

    /// Columns filled with the pad value
    pub fn padded_frames(&self) -> usize {
        self.data.ncols() - self.real_frames()
    }

    /// True when the segment carries padding
    pub fn is_padded(&self) -> bool {
        self.padded_frames() > 0
    }
}

/// Slices a spectrogram into windows of `win_frames` every `step_frames`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segmenter {
    win_frames: usize,
    step_frames: usize,
    tail: TailPolicy,
}

impl Segmenter {
    /// Build from durations against the analysis geometry
    pub fn new(config: &SegmentConfig, sample_rate: u32, hop_length: usize) -> FeatureResult<Self> {
        let win_frames = frames_for_duration("win_seconds", config.win_seconds, sample_rate, hop_length)?;
        let step_frames =
            frames_for_duration("step_seconds", config.step_seconds, sample_rate, hop_length)?;
        Self::from_frames(win_frames, step_frames, config.tail)
    }

    /// Build from frame counts directly
    pub fn from_frames(win_frames: usize, step_frames: usize, tail: TailPolicy) -> FeatureResult<Self> {
        if win_frames == 0 || step_frames == 0 {
            return Err(FeatureError::InvalidWindowConfiguration(format!(
                "win_frames={} and step_frames={} must both be positive",
                win_frames, step_frames
            )));
        }
        Ok(Self {
            win_frames,
            step_frames,
            tail,
        })
    }

    /// Window width in frames
    pub fn win_frames(&self) -> usize {
        self.win_frames
    }

    /// Stride between window starts in frames
    pub fn step_frames(&self) -> usize {
        self.step_frames
    }

    /// Tail policy
    pub fn tail(&self) -> TailPolicy {
        self.tail
    }

    /// Real frame ranges `[start, end)` of every segment, in emission order
    pub fn ranges(&self, total_frames: usize) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        while start + self.win_frames <= total_frames {
            ranges.push((start, start + self.win_frames));
            start += self.step_frames;
        }

        if self.tail.pad_value().is_some() && start < total_frames {
            // Only reachable with total_frames - start < win_frames
            ranges.push((start, total_frames));
        }
        ranges
    }

    /// Number of segments [`Segmenter::split`] will emit
    pub fn segment_count(&self, total_frames: usize) -> usize {
        self.ranges(total_frames).len()
    }

    /// Slice the spectrogram into ordered, fixed-width segments
    pub fn split(&self, mel: &MelSpectrogram) -> Vec<WindowSegment> {
        let view = mel.view();
        let pad_value = self.tail.pad_value().unwrap_or(0.0);

        self.ranges(mel.n_frames())
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                let data = if end - start == self.win_frames {
                    view.slice(s![.., start..end]).to_owned()
                } else {
                    let mut data = Array2::from_elem((mel.n_mels(), self.win_frames), pad_value);
                    data.slice_mut(s![.., ..end - start])
                        .assign(&view.slice(s![.., start..end]));
                    data
                };
                WindowSegment {
                    index,
                    start_frame: start,
                    end_frame: end,
                    data,
                }
            })
            .collect()
    }
}
