//! Error taxonomy for the feature pipeline

use thiserror::Error;

/// Failures raised by the mono/mel/segment/export stages.
///
/// Configuration failures apply uniformly to every file of a batch and
/// should abort it. Data failures are specific to one input and the batch
/// driver skips that file instead (see [`FeatureError::is_per_file`]).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// Waveform has no channels, or its sample count is not a multiple of the channel count
    #[error("invalid channel configuration: {0}")]
    InvalidChannelConfiguration(String),

    /// Signal is too short to produce a single analysis frame
    #[error("signal too short: {n_samples} samples, need at least {required}")]
    SignalTooShort {
        /// Samples available
        n_samples: usize,
        /// Samples required
        required: usize,
    },

    /// Signal reached the extractor at a rate other than the analysis rate
    #[error("sample rate mismatch: signal at {actual} Hz, expected {expected} Hz")]
    SampleRateMismatch {
        /// Analysis sample rate
        expected: u32,
        /// Rate of the signal
        actual: u32,
    },

    /// Mel frequency bounds are inconsistent with the sample rate
    #[error("invalid frequency range: fmin={fmin} Hz, fmax={fmax} Hz, nyquist={nyquist} Hz")]
    InvalidFrequencyRange {
        /// Lower bound in Hz
        fmin: f32,
        /// Upper bound in Hz
        fmax: f32,
        /// Half the sample rate
        nyquist: f32,
    },

    /// Window or step duration cannot be turned into a frame count
    #[error("invalid window configuration: {0}")]
    InvalidWindowConfiguration(String),

    /// An array crossing a stage boundary has the wrong shape
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape required at the boundary
        expected: Vec<usize>,
        /// Shape received
        actual: Vec<usize>,
    },

    /// Any other degenerate parameter (zero FFT size, zero hop, ...)
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in the config
        name: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl FeatureError {
    /// True for failures tied to a single input file.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            FeatureError::SignalTooShort { .. }
                | FeatureError::InvalidChannelConfiguration(_)
                | FeatureError::SampleRateMismatch { .. }
        )
    }

    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        FeatureError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Result alias for the core stages
pub type FeatureResult<T> = std::result::Result<T, FeatureError>;
