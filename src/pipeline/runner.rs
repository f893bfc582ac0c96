//! Per-file feature pipeline
//!
//! Orchestrates the stages for one input:
//! 1. Channel reduction to mono
//! 2. Resampling to the analysis rate
//! 3. Mel-log spectrogram
//! 4. Fixed-width segmentation
//! 5. Container assembly and index rows

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::audio::{reduce_to_mono, AudioLoader, MelExtractor, MelSpectrogram, Resampler, Waveform};
use crate::config::PipelineConfig;
use crate::error::FeatureResult;
use crate::export::{ExportAssembler, ExportBundle, ExportTarget};
use crate::segment::{Segmenter, WindowSegment};

/// Frame arithmetic of one processed file
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    /// Source path
    pub source: String,
    /// Analysis sample rate
    pub sample_rate: u32,
    /// Spectrogram columns
    pub total_frames: usize,
    /// Window width in frames
    pub win_frames: usize,
    /// Window stride in frames
    pub step_frames: usize,
    /// Segments exported
    pub segments: usize,
}

/// Result of running the pipeline on one waveform
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    /// Full dB spectrogram at full precision
    pub mel: MelSpectrogram,
    /// Segments at full precision
    pub segments: Vec<WindowSegment>,
    /// Export-ready arrays and index rows
    pub bundle: ExportBundle,
    /// Frame arithmetic
    pub summary: FileSummary,
}

/// Feature pipeline for one validated configuration
pub struct Pipeline {
    config: PipelineConfig,
    extractor: MelExtractor,
    segmenter: Segmenter,
    assembler: ExportAssembler,
}

impl Pipeline {
    /// Validate the configuration and prepare every stage.
    ///
    /// Fails before any audio is touched when the configuration is invalid.
    pub fn new(config: PipelineConfig) -> FeatureResult<Self> {
        config.validate()?;

        let extractor = MelExtractor::new(config.mel.clone())?;
        let segmenter = Segmenter::new(&config.segment, config.mel.sample_rate, config.mel.hop_length)?;
        let assembler = ExportAssembler::new(&config.mel, &config.segment, &config.export);

        debug!(
            "Pipeline ready: win_frames={}, step_frames={}",
            segmenter.win_frames(),
            segmenter.step_frames()
        );

        Ok(Self {
            config,
            extractor,
            segmenter,
            assembler,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the segmenter
    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Mono, resample and mel stages
    pub fn spectrogram(&self, wave: &Waveform) -> Result<MelSpectrogram> {
        let mono = reduce_to_mono(wave, self.config.mono)?;
        let mono = Resampler::to_rate(mono, self.config.mel.sample_rate)
            .context("Failed to resample audio")?;
        let mel = self.extractor.compute(&mono)?;
        Ok(mel)
    }

    /// Run every stage on an in-memory waveform. Nothing is written.
    pub fn process_waveform(&self, wave: &Waveform, target: &ExportTarget) -> Result<ProcessedFile> {
        let mel = self.spectrogram(wave)?;
        let segments = self.segmenter.split(&mel);
        let bundle = self.assembler.assemble(&segments, &mel, target)?;

        let summary = FileSummary {
            source: target.source.display().to_string(),
            sample_rate: self.config.mel.sample_rate,
            total_frames: mel.n_frames(),
            win_frames: self.segmenter.win_frames(),
            step_frames: self.segmenter.step_frames(),
            segments: segments.len(),
        };

        Ok(ProcessedFile {
            mel,
            segments,
            bundle,
            summary,
        })
    }

    /// Load `path`, run every stage and write its arrays under `out_root/<stem>/`
    pub fn process_file(&self, path: &Path, out_root: &Path) -> Result<ProcessedFile> {
        let wave = AudioLoader::load(path)?;
        debug!(
            "Loaded {:?}: {} Hz, {} channels, {:.2} s",
            path,
            wave.sample_rate,
            wave.channels,
            wave.duration()
        );

        let target = ExportTarget::for_source(path, out_root);
        let processed = self
            .process_waveform(&wave, &target)
            .with_context(|| format!("Failed to process {:?}", path))?;
        processed.bundle.write()?;

        info!(
            "{:?}: {} frames -> {} segments",
            path, processed.summary.total_frames, processed.summary.segments
        );
        Ok(processed)
    }
}
