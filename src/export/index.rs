//! Segment index
//!
//! One self-describing row per exported segment. Rows are only ever
//! appended; a file's rows stay contiguous and ordered by `segment_idx`.

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};
use std::io::Write;
use std::path::Path;

/// CSV column order
pub const INDEX_COLUMNS: [&str; 15] = [
    "source_wav",
    "npy_path_or_stack",
    "segment_idx",
    "start_frame",
    "end_frame",
    "start_time_s",
    "end_time_s",
    "sr",
    "n_fft",
    "hop",
    "n_mels",
    "fmin",
    "fmax",
    "win_seconds",
    "step_seconds",
];

/// Index row for one exported segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentIndexRecord {
    /// Source audio file
    pub source_wav: String,
    /// Container holding the segment (stack file or per-segment file)
    pub npy_path_or_stack: String,
    /// Position in the file's segment sequence
    pub segment_idx: usize,
    /// First spectrogram frame
    pub start_frame: usize,
    /// One past the last real spectrogram frame
    pub end_frame: usize,
    /// `start_frame * hop / sr`
    #[serde(serialize_with = "six_decimals")]
    pub start_time_s: f64,
    /// `end_frame * hop / sr`
    #[serde(serialize_with = "six_decimals")]
    pub end_time_s: f64,
    /// Analysis sample rate
    pub sr: u32,
    /// FFT size
    pub n_fft: usize,
    /// Hop length
    pub hop: usize,
    /// Mel bands
    pub n_mels: usize,
    /// Filterbank lower edge (Hz)
    pub fmin: f32,
    /// Filterbank upper edge (Hz)
    pub fmax: f32,
    /// Window duration (s)
    pub win_seconds: f64,
    /// Step duration (s)
    pub step_seconds: f64,
}

impl SegmentIndexRecord {
    /// Seconds at frame `frame` for the given hop and sample rate
    pub fn frame_time(frame: usize, hop: usize, sr: u32) -> f64 {
        (frame * hop) as f64 / sr as f64
    }
}

fn six_decimals<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{:.6}", value))
}

/// Append-only sequence of index rows shared across a batch
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    records: Vec<SegmentIndexRecord>,
}

impl SegmentIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Append all rows of one file, keeping them contiguous
    pub fn append_file(&mut self, records: Vec<SegmentIndexRecord>) {
        self.records.extend(records);
    }

    /// All rows, in append order
    pub fn records(&self) -> &[SegmentIndexRecord] {
        &self.records
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no rows have been appended
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write header and rows as CSV
    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        csv.write_record(INDEX_COLUMNS)?;
        for record in &self.records {
            csv.serialize(record)?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the index to a CSV file, creating parent directories
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create index file: {:?}", path))?;
        self.write_csv_to(file)
            .with_context(|| format!("Failed to write index file: {:?}", path))
    }
}
