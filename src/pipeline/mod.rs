//! Per-file pipeline and batch driver
//!
//! - Pipeline: mono reduction, resampling, mel extraction, segmentation, export
//! - BatchReport: per-batch summary, skipped files, shared segment index

mod batch;
mod runner;

pub use batch::{collect_wavs, BatchReport, SkippedFile};
pub use runner::{FileSummary, Pipeline, ProcessedFile};
