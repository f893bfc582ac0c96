//! Batch driver with a per-file error boundary

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::runner::{FileSummary, Pipeline};
use crate::audio::AudioLoader;
use crate::error::FeatureError;
use crate::export::{ExportTarget, SegmentIndex};

/// A file the batch skipped, with the reason
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    /// Input path
    pub path: PathBuf,
    /// Error chain, flattened
    pub reason: String,
}

/// Outcome of a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Files processed, in input order
    pub processed: Vec<FileSummary>,
    /// Files skipped because of per-file failures
    pub skipped: Vec<SkippedFile>,
    /// Rows of every exported segment
    pub index: SegmentIndex,
    /// Where the index was written
    pub index_path: PathBuf,
}

/// A single `.wav` file, or every `.wav` under a directory in sorted order
pub fn collect_wavs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let mut wavs = Vec::new();
        for entry in WalkDir::new(input) {
            let entry = entry.with_context(|| format!("Failed to walk {:?}", input))?;
            if entry.file_type().is_file() && AudioLoader::is_wav(entry.path()) {
                wavs.push(entry.into_path());
            }
        }
        wavs.sort();
        return Ok(wavs);
    }

    if input.is_file() && AudioLoader::is_wav(input) {
        return Ok(vec![input.to_path_buf()]);
    }
    Ok(Vec::new())
}

impl Pipeline {
    /// Run every input and write the shared index.
    ///
    /// Configuration failures abort the batch. Any other failure is logged
    /// and the file is skipped. A file whose `<out_root>/<stem>/` directory
    /// was already written by an earlier input is skipped as well, so no
    /// index row ever points at an overwritten container. `on_file` is
    /// called after each input.
    pub fn run_batch<F>(&self, inputs: &[PathBuf], out_root: &Path, mut on_file: F) -> Result<BatchReport>
    where
        F: FnMut(&Path),
    {
        let mut report = BatchReport {
            index_path: out_root.join(&self.config().export.index_csv),
            ..BatchReport::default()
        };

        // out_dir -> input that wrote it
        let mut written: HashMap<PathBuf, &Path> = HashMap::new();

        for path in inputs {
            let out_dir = ExportTarget::for_source(path, out_root).out_dir;
            let outcome = match written.get(&out_dir) {
                Some(owner) => Err(anyhow::anyhow!(
                    "output directory {:?} already holds the arrays of {:?}",
                    out_dir,
                    owner
                )),
                None => self.process_file(path, out_root),
            };

            match outcome {
                Ok(processed) => {
                    written.insert(out_dir, path.as_path());
                    report.index.append_file(processed.bundle.records);
                    report.processed.push(processed.summary);
                }
                Err(err) => {
                    let fatal = err
                        .downcast_ref::<FeatureError>()
                        .map_or(false, |fe| !fe.is_per_file());
                    if fatal {
                        return Err(err);
                    }
                    warn!("Skipping {:?}: {:#}", path, err);
                    report.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: format!("{:#}", err),
                    });
                }
            }
            on_file(path);
        }

        report.index.write_csv(&report.index_path)?;
        info!(
            "Processed {} files ({} skipped), {} segments indexed in {:?}",
            report.processed.len(),
            report.skipped.len(),
            report.index.len(),
            report.index_path
        );
        Ok(report)
    }
}
