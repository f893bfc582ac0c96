//! Integration tests for wav2mel
//!
//! Tests the full pipeline from WAV files to exported segments and index.

use std::fs;
use std::path::Path;

use wav2mel::audio::Waveform;
use wav2mel::config::{Centering, Dtype, SaveMode, TailPolicy};
use wav2mel::export::{load_npy, load_npy_f32, ExportTarget, INDEX_COLUMNS};
use wav2mel::pipeline::collect_wavs;
use wav2mel::{FeatureError, Pipeline, PipelineConfig};

/// Sine tone, 16-bit PCM, `channels` identical channels
fn write_tone(path: &Path, sample_rate: u32, channels: u16, n_samples: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..n_samples {
        let t = i as f32 / sample_rate as f32;
        let value = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
        for _ in 0..channels {
            writer.write_sample((value * 32767.0) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn tone_waveform(n_samples: usize) -> Waveform {
    let samples = (0..n_samples)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.5)
        .collect();
    Waveform::new(samples, 44100, 1)
}

fn target() -> ExportTarget {
    ExportTarget::for_source(Path::new("tone.wav"), Path::new("out"))
}

/// Scenario A: 2 s at 44.1 kHz, centered, hop 256
#[test]
fn test_total_frames_scenario() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let processed = pipeline.process_waveform(&tone_waveform(88200), &target()).unwrap();

    assert_eq!(processed.summary.total_frames, 345);
    assert_eq!(processed.mel.n_mels(), 64);
    assert_eq!(processed.mel.n_frames(), 345);

    let max = processed.mel.max_value();
    assert!(processed.mel.min_value() >= max - 80.0 - 1e-4);
}

/// Scenario B: 1 s windows every 0.5 s
#[test]
fn test_unpadded_segments_scenario() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let processed = pipeline.process_waveform(&tone_waveform(88200), &target()).unwrap();

    assert_eq!(processed.summary.win_frames, 172);
    assert_eq!(processed.summary.step_frames, 86);
    let starts: Vec<usize> = processed.segments.iter().map(|s| s.start_frame).collect();
    assert_eq!(starts, vec![0, 86, 172]);
    assert!(processed.segments.iter().all(|s| s.data.dim() == (64, 172)));
}

/// Scenario C: padded tail at frame 258
#[test]
fn test_padded_tail_scenario() {
    let mut config = PipelineConfig::default();
    config.segment.tail = TailPolicy::Pad { value: -80.0 };
    let pipeline = Pipeline::new(config).unwrap();
    let processed = pipeline.process_waveform(&tone_waveform(88200), &target()).unwrap();

    assert_eq!(processed.segments.len(), 4);
    let last = &processed.segments[3];
    assert_eq!((last.start_frame, last.end_frame), (258, 345));
    assert_eq!(last.real_frames(), 87);

    let mel = processed.mel.as_array();
    for m in 0..64 {
        for col in 0..87 {
            assert_eq!(last.data[[m, col]], mel[[m, 258 + col]]);
        }
        for col in 87..172 {
            assert_eq!(last.data[[m, col]], -80.0);
        }
    }

    let record = &processed.bundle.records[3];
    assert_eq!(record.start_frame, 258);
    assert_eq!(record.end_frame, 345);
}

/// Scenario D: fmax above Nyquist fails before any frame is computed
#[test]
fn test_fmax_above_nyquist_scenario() {
    let mut config = PipelineConfig::default();
    config.mel.fmax = 22050.5;
    assert!(matches!(
        Pipeline::new(config),
        Err(FeatureError::InvalidFrequencyRange { .. })
    ));
}

#[test]
fn test_uncentered_frame_count() {
    let mut config = PipelineConfig::default();
    config.mel.centering = Centering::Uncentered;
    let pipeline = Pipeline::new(config).unwrap();
    let processed = pipeline.process_waveform(&tone_waveform(88200), &target()).unwrap();
    assert_eq!(processed.summary.total_frames, 1 + (88200 - 1024) / 256);
}

#[test]
fn test_time_columns() {
    let mut config = PipelineConfig::default();
    config.segment.tail = TailPolicy::Pad { value: -80.0 };
    let pipeline = Pipeline::new(config).unwrap();
    let processed = pipeline.process_waveform(&tone_waveform(88200), &target()).unwrap();

    for record in &processed.bundle.records {
        assert_eq!(record.start_time_s, (record.start_frame * 256) as f64 / 44100.0);
        assert_eq!(record.end_time_s, (record.end_frame * 256) as f64 / 44100.0);
        assert_eq!(record.sr, 44100);
        assert_eq!(record.n_fft, 1024);
        assert_eq!(record.hop, 256);
        assert_eq!(record.fmin, 20.0);
        assert_eq!(record.fmax, 16000.0);
        assert_eq!(record.step_seconds, 0.5);
    }
}

#[test]
fn test_batch_writes_stack_and_index() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_tone(&input.path().join("a.wav"), 44100, 2, 88200);
    write_tone(&input.path().join("b.wav"), 44100, 1, 44100);

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let wavs = collect_wavs(input.path()).unwrap();
    assert_eq!(wavs.len(), 2);

    let mut seen = Vec::new();
    let report = pipeline
        .run_batch(&wavs, out.path(), |p| seen.push(p.to_path_buf()))
        .unwrap();
    assert_eq!(seen, wavs);
    assert!(report.skipped.is_empty());
    assert_eq!(report.processed.len(), 2);
    // a: 345 frames -> 3 segments, b: 173 frames -> 1 segment
    assert_eq!(report.index.len(), 4);

    let stack = load_npy(out.path().join("a/a_mel_chunks.npy")).unwrap();
    assert_eq!(stack.shape, vec![3, 64, 172]);
    assert_eq!(stack.dtype, "<f4");

    let csv = fs::read_to_string(out.path().join("index.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], INDEX_COLUMNS.join(","));
    assert_eq!(lines.len(), 5);
    assert!(lines[1].contains("a_mel_chunks.npy,0,0,172,0.000000,0.998458,44100,1024,256,64,"));
    assert!(lines[4].contains("b_mel_chunks.npy,0,0,172,"));
}

#[test]
fn test_stack_equals_separate_on_disk() {
    let input = tempfile::tempdir().unwrap();
    let wav = input.path().join("tone.wav");
    write_tone(&wav, 44100, 1, 88200);

    let run = |save_mode: SaveMode| -> tempfile::TempDir {
        let out = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default();
        config.segment.tail = TailPolicy::Pad { value: -80.0 };
        config.export.save_mode = save_mode;
        Pipeline::new(config)
            .unwrap()
            .run_batch(&[wav.clone()], out.path(), |_| {})
            .unwrap();
        out
    };

    let stack_out = run(SaveMode::Stack);
    let separate_out = run(SaveMode::Separate);

    let (stack, shape) = load_npy_f32(stack_out.path().join("tone/tone_mel_chunks.npy")).unwrap();
    assert_eq!(shape, vec![4, 64, 172]);
    let per_segment = 64 * 172;
    for i in 0..4 {
        let path = separate_out.path().join(format!("tone/tone_chunk{:04}.npy", i));
        let (segment, shape) = load_npy_f32(&path).unwrap();
        assert_eq!(shape, vec![64, 172]);
        assert_eq!(&stack[i * per_segment..(i + 1) * per_segment], segment.as_slice());
    }
}

#[test]
fn test_rerun_is_byte_identical() {
    let input = tempfile::tempdir().unwrap();
    let wav = input.path().join("tone.wav");
    write_tone(&wav, 44100, 2, 60000);

    let mut config = PipelineConfig::default();
    config.export.save_full_mel = true;
    let pipeline = Pipeline::new(config).unwrap();

    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    pipeline.run_batch(&[wav.clone()], first.path(), |_| {}).unwrap();
    pipeline.run_batch(&[wav.clone()], second.path(), |_| {}).unwrap();

    for name in ["tone/tone_mel_chunks.npy", "tone/tone_mel_full.npy"] {
        let a = fs::read(first.path().join(name)).unwrap();
        let b = fs::read(second.path().join(name)).unwrap();
        assert_eq!(a, b, "{} differs between runs", name);
    }

    let index_a = fs::read_to_string(first.path().join("index.csv")).unwrap();
    let index_b = fs::read_to_string(second.path().join("index.csv")).unwrap();
    assert_eq!(
        index_a.replace(&first.path().display().to_string(), ""),
        index_b.replace(&second.path().display().to_string(), "")
    );
}

#[test]
fn test_float16_export() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let wav = input.path().join("tone.wav");
    write_tone(&wav, 44100, 1, 88200);

    let mut config = PipelineConfig::default();
    config.export.dtype = Dtype::Float16;
    config.export.save_mode = SaveMode::Separate;
    let pipeline = Pipeline::new(config).unwrap();
    let report = pipeline.run_batch(&[wav], out.path(), |_| {}).unwrap();
    assert_eq!(report.index.len(), 3);

    let segment = load_npy(out.path().join("tone/tone_chunk0002.npy")).unwrap();
    assert_eq!(segment.dtype, "<f2");
    assert_eq!(segment.shape, vec![64, 172]);
    let values = segment.as_f32().unwrap();
    assert!(values.iter().all(|v| (-80.1..=0.0).contains(v)));
}

#[test]
fn test_per_file_failures_are_skipped() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_tone(&input.path().join("good.wav"), 44100, 1, 88200);
    write_tone(&input.path().join("short.wav"), 44100, 1, 500);
    fs::write(input.path().join("corrupt.wav"), b"not a wav file").unwrap();

    let mut config = PipelineConfig::default();
    config.mel.centering = Centering::Uncentered;
    let pipeline = Pipeline::new(config).unwrap();

    let wavs = collect_wavs(input.path()).unwrap();
    let report = pipeline.run_batch(&wavs, out.path(), |_| {}).unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.skipped.len(), 2);
    let skipped: Vec<String> = report
        .skipped
        .iter()
        .map(|s| s.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(skipped, vec!["corrupt.wav", "short.wav"]);
    assert!(report.skipped[1].reason.contains("signal too short"));

    let csv = fs::read_to_string(out.path().join("index.csv")).unwrap();
    assert_eq!(csv.lines().count(), 1 + report.index.len());
    assert!(report.index.records().iter().all(|r| r.source_wav.ends_with("good.wav")));
}

#[test]
fn test_custom_geometry() {
    let mut config = PipelineConfig::default();
    config.mel.sample_rate = 16000;
    config.mel.n_fft = 400;
    config.mel.hop_length = 160;
    config.mel.n_mels = 80;
    config.mel.fmin = 0.0;
    config.mel.fmax = 8000.0;
    config.segment.win_seconds = 0.25;
    config.segment.step_seconds = 0.1;
    let pipeline = Pipeline::new(config).unwrap();

    // 1 s at 44.1 kHz, resampled to 16 kHz
    let processed = pipeline.process_waveform(&tone_waveform(44100), &target()).unwrap();
    assert_eq!(processed.summary.total_frames, 1 + 16000 / 160);
    assert_eq!(processed.summary.win_frames, 25);
    assert_eq!(processed.summary.step_frames, 10);
    assert_eq!(processed.segments.len(), (101 - 25) / 10 + 1);
    assert!(processed.segments.iter().all(|s| s.data.dim() == (80, 25)));
}

#[test]
fn test_same_stem_in_different_folders() {
    let input = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    fs::create_dir_all(input.path().join("a")).unwrap();
    fs::create_dir_all(input.path().join("b")).unwrap();
    write_tone(&input.path().join("a/x.wav"), 44100, 1, 88200);
    write_tone(&input.path().join("b/x.wav"), 44100, 1, 44100);

    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let wavs = collect_wavs(input.path()).unwrap();
    let report = pipeline.run_batch(&wavs, out.path(), |_| {}).unwrap();

    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].path, input.path().join("b/x.wav"));
    assert!(report.skipped[0].reason.contains("already holds"));

    // Every row refers to the file that owns the container, and the
    // container holds exactly as many segments as there are rows
    let records = report.index.records();
    assert_eq!(records.len(), 3);
    let owner = input.path().join("a/x.wav").display().to_string();
    assert!(records.iter().all(|r| r.source_wav == owner));
    let stack = load_npy(out.path().join("x/x_mel_chunks.npy")).unwrap();
    assert_eq!(stack.shape, vec![records.len(), 64, 172]);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.segment_idx, i);
    }
}

#[test]
fn test_resampled_tail_matches_native_rate() {
    let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
    let low: Vec<f32> = (0..44100)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22050.0).sin() * 0.5)
        .collect();
    let resampled = pipeline.spectrogram(&Waveform::new(low, 22050, 1)).unwrap();
    let native = pipeline.spectrogram(&tone_waveform(88200)).unwrap();
    assert_eq!(resampled.n_frames(), 345);

    // Strongest band of the last frame, which reaches the final samples
    let (resampled, native) = (resampled.as_array(), native.as_array());
    let last = 344;
    let band = (0..64)
        .max_by(|&a, &b| native[[a, last]].total_cmp(&native[[b, last]]))
        .unwrap();
    let diff = (resampled[[band, last]] - native[[band, last]]).abs();
    assert!(diff < 1.5, "last frame differs by {} dB", diff);
}
