//! wav2mel CLI - WAV to mel-log segments for ML datasets

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wav2mel::config::{
    Centering, DbReference, Dtype, MonoStrategy, SaveMode, TailPolicy, DEFAULT_PAD_VALUE,
};
use wav2mel::export::load_npy;
use wav2mel::pipeline::collect_wavs;
use wav2mel::{Pipeline, PipelineConfig, VERSION};

/// wav2mel - mel-log spectrogram windows from WAV files
#[derive(Parser, Debug)]
#[command(name = "wav2mel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract mel-log segments from a WAV file or a folder of WAV files
    Extract {
        /// WAV file or folder with WAV files
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "./out")]
        out: PathBuf,

        #[command(flatten)]
        params: ConfigArgs,
    },

    /// Show the resolved configuration and derived frame counts
    Info {
        #[command(flatten)]
        params: ConfigArgs,
    },

    /// Show shape and value range of an exported .npy file
    Inspect {
        /// Path to the .npy file
        path: PathBuf,
    },
}

/// Parameters layered over the defaults or a YAML config file
#[derive(Args, Debug)]
struct ConfigArgs {
    /// YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target sample rate
    #[arg(long)]
    sr: Option<u32>,

    /// FFT size
    #[arg(long)]
    n_fft: Option<usize>,

    /// Hop length
    #[arg(long)]
    hop: Option<usize>,

    /// Number of mel bands
    #[arg(long)]
    n_mels: Option<usize>,

    /// Lowest filterbank frequency (Hz)
    #[arg(long)]
    fmin: Option<f32>,

    /// Highest filterbank frequency (Hz), at most sr / 2
    #[arg(long)]
    fmax: Option<f32>,

    /// Disable STFT centering (enabled by default)
    #[arg(long)]
    no_center: bool,

    /// Dynamic range kept below the per-file peak (dB)
    #[arg(long)]
    top_db: Option<f32>,

    /// dB reference level
    #[arg(long, value_enum)]
    db_ref: Option<DbReference>,

    /// Channel reduction rule
    #[arg(long, value_enum)]
    mono_strategy: Option<MonoStrategy>,

    /// Window length (s)
    #[arg(long)]
    win_seconds: Option<f64>,

    /// Step between windows (s)
    #[arg(long)]
    step_seconds: Option<f64>,

    /// Pad the last window if incomplete
    #[arg(long)]
    pad_last: bool,

    /// dB value for padding the last window
    #[arg(long, allow_hyphen_values = true)]
    pad_value: Option<f32>,

    /// Export layout
    #[arg(long, value_enum)]
    save_mode: Option<SaveMode>,

    /// Export precision
    #[arg(long, value_enum)]
    dtype: Option<Dtype>,

    /// Also save the full mel-log spectrogram
    #[arg(long)]
    save_full_mel: bool,

    /// Index CSV file name (inside the output directory)
    #[arg(long)]
    index_csv: Option<String>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        let mel = &mut config.mel;
        if let Some(sr) = self.sr {
            mel.sample_rate = sr;
        }
        if let Some(n_fft) = self.n_fft {
            mel.n_fft = n_fft;
        }
        if let Some(hop) = self.hop {
            mel.hop_length = hop;
        }
        if let Some(n_mels) = self.n_mels {
            mel.n_mels = n_mels;
        }
        if let Some(fmin) = self.fmin {
            mel.fmin = fmin;
        }
        if let Some(fmax) = self.fmax {
            mel.fmax = fmax;
        }
        if self.no_center {
            mel.centering = Centering::Uncentered;
        }
        if let Some(top_db) = self.top_db {
            mel.top_db = top_db;
        }
        if let Some(reference) = self.db_ref {
            mel.reference = reference;
        }

        if let Some(mono) = self.mono_strategy {
            config.mono = mono;
        }

        let segment = &mut config.segment;
        if let Some(win) = self.win_seconds {
            segment.win_seconds = win;
        }
        if let Some(step) = self.step_seconds {
            segment.step_seconds = step;
        }
        let current_pad = segment.tail.pad_value();
        if self.pad_last || current_pad.is_some() {
            let value = self.pad_value.or(current_pad).unwrap_or(DEFAULT_PAD_VALUE);
            segment.tail = TailPolicy::Pad { value };
        }

        let export = &mut config.export;
        if let Some(mode) = self.save_mode {
            export.save_mode = mode;
        }
        if let Some(dtype) = self.dtype {
            export.dtype = dtype;
        }
        if self.save_full_mel {
            export.save_full_mel = true;
        }
        if let Some(index_csv) = &self.index_csv {
            export.index_csv = index_csv.clone();
        }

        Ok(config)
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn create_progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn extract(input: &Path, out: &Path, params: &ConfigArgs) -> Result<()> {
    let config = params.resolve()?;
    let pipeline = Pipeline::new(config).context("Invalid configuration")?;

    let wavs = collect_wavs(input)?;
    if wavs.is_empty() {
        anyhow::bail!("No WAV files found at: {:?}", input);
    }
    info!("Found {} WAV files in {:?}", wavs.len(), input);

    let pb = create_progress_bar(wavs.len())?;
    let report = pipeline.run_batch(&wavs, out, |path| {
        pb.set_message(path.display().to_string());
        pb.inc(1);
    })?;
    pb.finish_with_message("done");

    for skipped in &report.skipped {
        eprintln!("Skipped {:?}: {}", skipped.path, skipped.reason);
    }
    println!(
        "Done. {} segments from {} files, index at {:?}",
        report.index.len(),
        report.processed.len(),
        report.index_path
    );
    Ok(())
}

fn show_info(params: &ConfigArgs) -> Result<()> {
    let config = params.resolve()?;
    print!("{}", config.to_yaml()?);

    let pipeline = Pipeline::new(config).context("Invalid configuration")?;
    let segmenter = pipeline.segmenter();
    println!("# win_frames: {}", segmenter.win_frames());
    println!("# step_frames: {}", segmenter.step_frames());
    Ok(())
}

fn inspect(path: &Path) -> Result<()> {
    let array = load_npy(path)?;
    let values = array.as_f32()?;
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    println!("shape: {:?}", array.shape);
    println!("dtype: {}", array.dtype);
    if !values.is_empty() {
        println!("range: [{}, {}]", min, max);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!("wav2mel v{}", VERSION);

    match cli.command {
        Commands::Extract { input, out, params } => extract(&input, &out, &params),
        Commands::Info { params } => show_info(&params),
        Commands::Inspect { path } => inspect(&path),
    }
}
