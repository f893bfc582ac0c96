//! Export container assembly

use anyhow::{Context, Result};
use half::f16;
use ndarray::{Array, Array2, Array3, Axis, Dimension, Ix2, Ix3};
use std::path::{Path, PathBuf};

use super::index::SegmentIndexRecord;
use super::npy::write_npy;
use crate::audio::MelSpectrogram;
use crate::config::{Dtype, ExportConfig, MelConfig, SaveMode, SegmentConfig};
use crate::error::{FeatureError, FeatureResult};
use crate::segment::WindowSegment;

/// Array cast to its export precision
#[derive(Debug, Clone, PartialEq)]
pub enum CastArray<D: Dimension> {
    /// Single precision
    Float32(Array<f32, D>),
    /// Half precision
    Float16(Array<f16, D>),
}

impl<D: Dimension> CastArray<D> {
    /// Cast a full-precision array
    pub fn cast(array: &Array<f32, D>, dtype: Dtype) -> Self {
        match dtype {
            Dtype::Float32 => CastArray::Float32(array.clone()),
            Dtype::Float16 => CastArray::Float16(array.mapv(f16::from_f32)),
        }
    }

    /// Precision of the stored data
    pub fn dtype(&self) -> Dtype {
        match self {
            CastArray::Float32(_) => Dtype::Float32,
            CastArray::Float16(_) => Dtype::Float16,
        }
    }

    /// Array shape
    pub fn shape(&self) -> &[usize] {
        match self {
            CastArray::Float32(a) => a.shape(),
            CastArray::Float16(a) => a.shape(),
        }
    }

    /// Widen back to f32
    pub fn to_f32(&self) -> Array<f32, D> {
        match self {
            CastArray::Float32(a) => a.clone(),
            CastArray::Float16(a) => a.mapv(f16::to_f32),
        }
    }

    /// Write as an NPY file
    pub fn write_npy<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self {
            CastArray::Float32(a) => write_npy(path, a),
            CastArray::Float16(a) => write_npy(path, a),
        }
    }
}

/// Where one source file's artifacts go
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTarget {
    /// Source audio path, recorded verbatim in the index
    pub source: PathBuf,
    /// Directory receiving this file's arrays
    pub out_dir: PathBuf,
    /// File stem used to name the arrays
    pub stem: String,
}

impl ExportTarget {
    /// `<out_root>/<stem>/` for `source`
    pub fn for_source(source: &Path, out_root: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        Self {
            source: source.to_path_buf(),
            out_dir: out_root.join(&stem),
            stem,
        }
    }

    /// Stacked container path
    pub fn stack_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_mel_chunks.npy", self.stem))
    }

    /// Per-segment container path
    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.out_dir.join(format!("{}_chunk{:04}.npy", self.stem, index))
    }

    /// Full spectrogram path
    pub fn full_mel_path(&self) -> PathBuf {
        self.out_dir.join(format!("{}_mel_full.npy", self.stem))
    }
}

/// Segment arrays in their export layout
#[derive(Debug, Clone, PartialEq)]
pub enum ExportContainer {
    /// No segments were produced; nothing is written
    Empty,
    /// One `(N, n_mels, win_frames)` array
    Stack {
        /// Destination
        path: PathBuf,
        /// Stacked segments
        array: CastArray<Ix3>,
    },
    /// One `(n_mels, win_frames)` array per segment, in segment order
    Separate(Vec<(PathBuf, CastArray<Ix2>)>),
}

impl ExportContainer {
    /// Number of segments held
    pub fn len(&self) -> usize {
        match self {
            ExportContainer::Empty => 0,
            ExportContainer::Stack { array, .. } => array.shape()[0],
            ExportContainer::Separate(arrays) => arrays.len(),
        }
    }

    /// True when no segments are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Segment `i` widened to f32, whichever layout holds it
    pub fn segment(&self, i: usize) -> Option<Array2<f32>> {
        match self {
            ExportContainer::Empty => None,
            ExportContainer::Stack { array, .. } => {
                if i >= array.shape()[0] {
                    return None;
                }
                Some(array.to_f32().index_axis_move(Axis(0), i))
            }
            ExportContainer::Separate(arrays) => arrays.get(i).map(|(_, a)| a.to_f32()),
        }
    }
}

/// Everything one file exports
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBundle {
    /// Destination directory
    pub out_dir: PathBuf,
    /// Segment arrays
    pub container: ExportContainer,
    /// Full spectrogram, when requested
    pub full_mel: Option<(PathBuf, CastArray<Ix2>)>,
    /// One row per exported segment, ordered by `segment_idx`
    pub records: Vec<SegmentIndexRecord>,
}

impl ExportBundle {
    /// Write every array to disk
    pub fn write(&self) -> Result<()> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", self.out_dir))?;

        if let Some((path, array)) = &self.full_mel {
            array.write_npy(path)?;
        }

        match &self.container {
            ExportContainer::Empty => {}
            ExportContainer::Stack { path, array } => array.write_npy(path)?,
            ExportContainer::Separate(arrays) => {
                for (path, array) in arrays {
                    array.write_npy(path)?;
                }
            }
        }
        Ok(())
    }
}

/// Packages segments into containers and index rows
#[derive(Debug, Clone)]
pub struct ExportAssembler {
    mel: MelConfig,
    segment: SegmentConfig,
    export: ExportConfig,
}

impl ExportAssembler {
    /// Create an assembler recording the given parameters in every row
    pub fn new(mel: &MelConfig, segment: &SegmentConfig, export: &ExportConfig) -> Self {
        Self {
            mel: mel.clone(),
            segment: segment.clone(),
            export: export.clone(),
        }
    }

    /// Build the container, optional full spectrogram and index rows.
    ///
    /// All segments must share the shape `(n_mels, win_frames)`; the cast to
    /// the export dtype happens here and nowhere upstream.
    pub fn assemble(
        &self,
        segments: &[WindowSegment],
        mel: &MelSpectrogram,
        target: &ExportTarget,
    ) -> FeatureResult<ExportBundle> {
        let dtype = self.export.dtype;

        if let Some(first) = segments.first() {
            let expected = [mel.n_mels(), first.data.ncols()];
            for seg in segments {
                if seg.data.shape() != expected {
                    return Err(FeatureError::ShapeMismatch {
                        expected: expected.to_vec(),
                        actual: seg.data.shape().to_vec(),
                    });
                }
            }
        }

        let full_mel = self
            .export
            .save_full_mel
            .then(|| (target.full_mel_path(), CastArray::cast(mel.as_array(), dtype)));

        let (container, paths): (ExportContainer, Vec<PathBuf>) = if segments.is_empty() {
            (ExportContainer::Empty, Vec::new())
        } else {
            match self.export.save_mode {
                SaveMode::Stack => {
                    let path = target.stack_path();
                    let array = CastArray::cast(&Self::stack(segments), dtype);
                    let paths = vec![path.clone(); segments.len()];
                    (ExportContainer::Stack { path, array }, paths)
                }
                SaveMode::Separate => {
                    let arrays: Vec<(PathBuf, CastArray<Ix2>)> = segments
                        .iter()
                        .map(|seg| (target.segment_path(seg.index), CastArray::cast(&seg.data, dtype)))
                        .collect();
                    let paths = arrays.iter().map(|(p, _)| p.clone()).collect();
                    (ExportContainer::Separate(arrays), paths)
                }
            }
        };

        let records = segments
            .iter()
            .zip(paths)
            .map(|(seg, path)| self.record(target, &path, seg))
            .collect();

        Ok(ExportBundle {
            out_dir: target.out_dir.clone(),
            container,
            full_mel,
            records,
        })
    }

    /// Stack equally-shaped segments along a new leading axis
    fn stack(segments: &[WindowSegment]) -> Array3<f32> {
        let (n_mels, win_frames) = segments[0].data.dim();
        let mut stacked = Array3::<f32>::zeros((segments.len(), n_mels, win_frames));
        for (mut slot, seg) in stacked.axis_iter_mut(Axis(0)).zip(segments) {
            slot.assign(&seg.data);
        }
        stacked
    }

    fn record(&self, target: &ExportTarget, path: &Path, seg: &WindowSegment) -> SegmentIndexRecord {
        let sr = self.mel.sample_rate;
        let hop = self.mel.hop_length;
        SegmentIndexRecord {
            source_wav: target.source.display().to_string(),
            npy_path_or_stack: path.display().to_string(),
            segment_idx: seg.index,
            start_frame: seg.start_frame,
            end_frame: seg.end_frame,
            start_time_s: SegmentIndexRecord::frame_time(seg.start_frame, hop, sr),
            end_time_s: SegmentIndexRecord::frame_time(seg.end_frame, hop, sr),
            sr,
            n_fft: self.mel.n_fft,
            hop,
            n_mels: self.mel.n_mels,
            fmin: self.mel.fmin,
            fmax: self.mel.fmax,
            win_seconds: self.segment.win_seconds,
            step_seconds: self.segment.step_seconds,
        }
    }
}
