//! Spectrogram segmentation
//!
//! - Seconds to frame-count conversion
//! - Fixed-width windowing with an optional padded tail

mod segmenter;

pub use segmenter::{frames_for_duration, Segmenter, WindowSegment};
