// Sweep module - linear chirp excitation for frequency-response runs
//
// The signal is cos(2π(f0·t + (f1 − f0)/(2T)·t²)) sampled on
// linspace(0, T, ⌊sr·T⌋), so the instantaneous frequency rises linearly
// from f0 at t = 0 to f1 at t = T.

use std::f64::consts::PI;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::series::TimeSeries;

/// Sweep parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub start_hz: f64,
    pub end_hz: f64,
    pub duration_s: f64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_volume")]
    pub volume: f64,
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_volume() -> f64 {
    1.0
}

impl SweepConfig {
    pub fn new(start_hz: f64, end_hz: f64, duration_s: f64) -> Self {
        Self {
            start_hz,
            end_hz,
            duration_s,
            sample_rate: default_sample_rate(),
            volume: default_volume(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.duration_s.is_finite() && self.duration_s > 0.0) {
            return Err(anyhow!("sweep duration must be positive, got {}", self.duration_s));
        }
        if self.sample_rate == 0 {
            return Err(anyhow!("sweep sample rate must be positive"));
        }
        if !(self.start_hz >= 0.0 && self.end_hz >= 0.0) {
            return Err(anyhow!(
                "sweep frequencies must be non-negative, got {} -> {} Hz",
                self.start_hz,
                self.end_hz
            ));
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        if self.start_hz.max(self.end_hz) > nyquist {
            log::warn!(
                "[Sweep] {} Hz is above Nyquist ({} Hz), the sweep will alias",
                self.start_hz.max(self.end_hz),
                nyquist
            );
        }
        Ok(())
    }
}

/// Sweep samples and their timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub timestamps: Vec<f64>,
    pub samples: Vec<f64>,
}

impl Sweep {
    /// The sweep as a two-row series for storage alongside the WAV
    pub fn to_series(&self) -> Result<TimeSeries> {
        TimeSeries::new(self.timestamps.clone(), self.samples.clone())
            .context("sweep samples do not form a valid series")
    }
}

/// Generate the chirp described by `config`
pub fn generate_sweep(config: &SweepConfig) -> Result<Sweep> {
    config.validate()?;

    let n = (config.sample_rate as f64 * config.duration_s).floor() as usize;
    let duration = config.duration_s;
    let sweep_rate = (config.end_hz - config.start_hz) / (2.0 * duration);

    let timestamps: Vec<f64> = match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let step = duration / (n - 1) as f64;
            (0..n).map(|i| i as f64 * step).collect()
        }
    };
    let samples = timestamps
        .iter()
        .map(|&t| config.volume * (2.0 * PI * (config.start_hz * t + sweep_rate * t * t)).cos())
        .collect();

    log::info!(
        "[Sweep] {} -> {} Hz over {}s, {} samples at {} Hz",
        config.start_hz,
        config.end_hz,
        duration,
        n,
        config.sample_rate
    );

    Ok(Sweep {
        timestamps,
        samples,
    })
}

/// Write mono 32-bit float WAV
pub fn write_sweep_wav(path: &Path, samples: &[f64], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer
            .write_sample(sample as f32)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    log::info!("[Sweep] Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}
