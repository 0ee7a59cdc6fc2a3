use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use modal_probe::acquisition::{Recorder, RecordingStats, SimulatedChannel};
use modal_probe::analysis::analyze_damping;
use modal_probe::analysis::spectrum::{FrequencyScale, MagnitudeScale, WindowKind};
use modal_probe::config::{FilterConfig, SmoothingConfig};
use modal_probe::report::{write_report, DampingSummary, PipelineSummary, SpectrumSummary};
use modal_probe::storage::{load_series, save_series, save_session_notes, SessionNotes};
use modal_probe::sweep::{generate_sweep, write_sweep_wav, SweepConfig};
use modal_probe::{
    analyze_spectrum, filter_series, init_logging, run_pipeline, AnalysisConfig, SamplingEstimate,
};

#[derive(Parser, Debug)]
#[command(
    name = "modal_cli",
    about = "Damping and spectral analysis of vibration test recordings"
)]
struct Cli {
    /// JSON analysis configuration; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect decaying peaks and fit the damping envelope
    Damping {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        exclude_after_max: Option<usize>,
        #[arg(long)]
        exclude_last: Option<usize>,
        /// Prominence threshold as a fraction of the signal std
        #[arg(long)]
        min_prominence: Option<f64>,
        /// Height threshold as a fraction of the signal maximum
        #[arg(long)]
        min_height: Option<f64>,
        /// Fixed inter-peak distance in samples
        #[arg(long)]
        min_distance: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Full-length spectrum and spectrogram
    Spectrum {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum)]
        window: Option<WindowArg>,
        /// Zero-pad the transform to this many samples
        #[arg(long)]
        zero_pad: Option<usize>,
        #[arg(long)]
        log_magnitude: bool,
        #[arg(long)]
        linear_frequency: bool,
        /// Low-pass cutoff applied to the magnitude spectrum
        #[arg(long)]
        smoothing: Option<f64>,
        /// Minimum magnitude of annotated spectral peaks
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Zero-phase Butterworth low-pass of a series
    Filter {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        cutoff: Option<f64>,
        #[arg(long)]
        order: Option<usize>,
    },
    /// Run damping, spectrum and filter branches and write a report
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Generate a linear sweep WAV, its sample series and session notes
    Sweep {
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(long)]
        duration: f64,
        #[arg(long, default_value_t = 1.0)]
        volume: f64,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Record a simulated damped oscillator
    Record {
        #[arg(long)]
        duration: f64,
        #[arg(long)]
        rate: f64,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 20.0)]
        frequency: f64,
        #[arg(long, default_value_t = 0.5)]
        beta: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum WindowArg {
    Hann,
    Hamming,
    Blackman,
    Rectangular,
}

impl From<WindowArg> for WindowKind {
    fn from(arg: WindowArg) -> Self {
        match arg {
            WindowArg::Hann => WindowKind::Hann,
            WindowArg::Hamming => WindowKind::Hamming,
            WindowArg::Blackman => WindowKind::Blackman,
            WindowArg::Rectangular => WindowKind::Rectangular,
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let mut config = AnalysisConfig::load_optional(cli.config.as_ref());

    match cli.command {
        Commands::Damping {
            input,
            exclude_after_max,
            exclude_last,
            min_prominence,
            min_height,
            min_distance,
            output,
        } => {
            let peaks = &mut config.peaks;
            override_with(&mut peaks.exclude_after_max, exclude_after_max);
            override_with(&mut peaks.exclude_last_n, exclude_last);
            override_with(&mut peaks.min_prominence_factor, min_prominence);
            override_with(&mut peaks.min_height_factor, min_height);
            if min_distance.is_some() {
                peaks.min_distance = min_distance;
            }
            run_damping(&input, &config, output)
        }
        Commands::Spectrum {
            input,
            window,
            zero_pad,
            log_magnitude,
            linear_frequency,
            smoothing,
            threshold,
            output,
        } => {
            let spectrum = &mut config.spectrum;
            if let Some(window) = window {
                spectrum.window = Some(window.into());
            }
            if zero_pad.is_some() {
                spectrum.zero_pad_to = zero_pad;
            }
            if log_magnitude {
                spectrum.magnitude_scale = MagnitudeScale::Log;
            }
            if linear_frequency {
                spectrum.frequency_scale = FrequencyScale::Linear;
            }
            if let Some(cutoff) = smoothing {
                spectrum.smoothing = Some(SmoothingConfig::new(cutoff));
            }
            if threshold.is_some() {
                spectrum.peak_threshold = threshold;
            }
            run_spectrum(&input, &config, output)
        }
        Commands::Filter {
            input,
            output,
            cutoff,
            order,
        } => {
            override_with(&mut config.filter.cutoff_hz, cutoff);
            override_with(&mut config.filter.order, order);
            run_filter(&input, &output, &config.filter)
        }
        Commands::Analyze { input, output_dir } => run_analyze(&input, &output_dir, &config),
        Commands::Sweep {
            start,
            end,
            duration,
            volume,
            sample_rate,
            output_dir,
            notes,
        } => {
            let sweep = SweepConfig {
                start_hz: start,
                end_hz: end,
                duration_s: duration,
                sample_rate,
                volume,
            };
            run_sweep(&sweep, &output_dir, notes)
        }
        Commands::Record {
            duration,
            rate,
            output,
            frequency,
            beta,
        } => run_record(duration, rate, &output, frequency, beta),
    }
}

fn override_with<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn run_damping(input: &Path, config: &AnalysisConfig, output: Option<PathBuf>) -> Result<ExitCode> {
    let series = load_series(input)?;
    let analysis = analyze_damping(&series, config)
        .with_context(|| format!("damping analysis of {}", input.display()))?;
    emit_json(&DampingSummary::from(&analysis), output)?;
    Ok(ExitCode::from(0))
}

fn run_spectrum(
    input: &Path,
    config: &AnalysisConfig,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let series = load_series(input)?;
    let result = analyze_spectrum(&series, &config.spectrum)
        .with_context(|| format!("spectral analysis of {}", input.display()))?;
    emit_json(&SpectrumSummary::from(&result), output)?;
    Ok(ExitCode::from(0))
}

fn run_filter(input: &Path, output: &Path, filter: &FilterConfig) -> Result<ExitCode> {
    let series = load_series(input)?;
    let filtered = filter_series(&series, filter, SamplingEstimate::MeanInterval)
        .with_context(|| format!("filtering {}", input.display()))?;
    save_series(output, &filtered)?;
    Ok(ExitCode::from(0))
}

fn run_analyze(input: &Path, output_dir: &Path, config: &AnalysisConfig) -> Result<ExitCode> {
    let series = load_series(input)?;
    let report = run_pipeline(&series, config);

    let filtered_path = output_dir.join("filtered_series.json");
    let written = match &report.filtered {
        Ok(filtered) => {
            save_series(&filtered_path, filtered)?;
            Some(filtered_path.as_path())
        }
        Err(_) => None,
    };

    let summary = PipelineSummary::new(series.len(), &report, written);
    write_report(&output_dir.join("analysis_report.json"), &summary)?;

    for failure in report.failures() {
        eprintln!("{failure}");
    }
    Ok(if summary.is_complete() {
        ExitCode::from(0)
    } else {
        ExitCode::from(2)
    })
}

fn run_sweep(sweep: &SweepConfig, output_dir: &Path, notes: String) -> Result<ExitCode> {
    let signal = generate_sweep(sweep)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating directory {}", output_dir.display()))?;

    let wav_name = "sweep.wav";
    write_sweep_wav(&output_dir.join(wav_name), &signal.samples, sweep.sample_rate)?;
    save_series(&output_dir.join("sweep_series.json"), &signal.to_series()?)?;
    save_session_notes(
        &output_dir.join("session.json"),
        &SessionNotes {
            duration_s: sweep.duration_s,
            start_hz: sweep.start_hz,
            end_hz: sweep.end_hz,
            volume: sweep.volume,
            notes,
            filename: wav_name.to_string(),
        },
    )?;
    Ok(ExitCode::from(0))
}

fn run_record(
    duration: f64,
    rate: f64,
    output: &Path,
    frequency: f64,
    beta: f64,
) -> Result<ExitCode> {
    let duration = Duration::try_from_secs_f64(duration)
        .with_context(|| format!("invalid duration {}", duration))?;
    let recording = Recorder::new(duration, rate).record(SimulatedChannel::new(1.0, beta, frequency))?;
    save_series(output, &recording.series)?;
    emit_json(
        &RecordPayload {
            output: output.display().to_string(),
            stats: recording.stats,
        },
        None,
    )?;
    Ok(ExitCode::from(0))
}

fn emit_json<T: Serialize>(payload: &T, output_path: Option<PathBuf>) -> Result<()> {
    match output_path {
        Some(path) => write_report(&path, payload),
        None => {
            println!("{}", serde_json::to_string_pretty(payload)?);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct RecordPayload {
    output: String,
    stats: RecordingStats,
}
