//! Persistence of recorded series and session notes.
//!
//! A series on disk is a two-row table: timestamps in seconds, then
//! amplitudes. The file extension selects the encoding:
//!
//! - `.json`: `[[t0, t1, ...], [v0, v1, ...]]`
//! - `.csv`: two comma-separated rows, same order
//! - `.wav` (load only): mono PCM or float, `t = i / sample_rate`
//!
//! Every load goes through `TimeSeries::new`, so a file that breaks the
//! series invariants is rejected here rather than inside an analysis stage.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::series::TimeSeries;

/// Series encoding, chosen from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesFormat {
    Json,
    Csv,
    Wav,
}

impl SeriesFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("json") => Ok(SeriesFormat::Json),
            Some("csv") => Ok(SeriesFormat::Csv),
            Some("wav") => Ok(SeriesFormat::Wav),
            _ => Err(anyhow!(
                "Unsupported series file {} (expected .json, .csv or .wav)",
                path.display()
            )),
        }
    }
}

/// Metadata saved next to the data of one test run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionNotes {
    pub duration_s: f64,
    pub start_hz: f64,
    pub end_hz: f64,
    pub volume: f64,
    #[serde(default)]
    pub notes: String,
    /// Data file the notes describe
    pub filename: String,
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display())),
        _ => Ok(()),
    }
}

/// Save `series` to `path` in the format its extension names
pub fn save_series(path: &Path, series: &TimeSeries) -> Result<()> {
    let contents = match SeriesFormat::from_path(path)? {
        SeriesFormat::Json => serde_json::to_string(series)?,
        SeriesFormat::Csv => format!(
            "{}\n{}\n",
            join_row(series.timestamps()),
            join_row(series.values())
        ),
        SeriesFormat::Wav => {
            return Err(anyhow!(
                "Writing series as WAV is not supported ({}); use .json or .csv",
                path.display()
            ))
        }
    };

    ensure_parent(path)?;
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    log::info!("[Storage] Saved {} samples to {}", series.len(), path.display());
    Ok(())
}

/// Load a series from `path`
pub fn load_series(path: &Path) -> Result<TimeSeries> {
    let series = match SeriesFormat::from_path(path)? {
        SeriesFormat::Json => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let rows: Vec<Vec<f64>> = serde_json::from_str(&contents)
                .with_context(|| format!("parsing {}", path.display()))?;
            from_rows(rows, path)?
        }
        SeriesFormat::Csv => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let rows = contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .enumerate()
                .map(|(row, line)| parse_row(line, row, path))
                .collect::<Result<Vec<_>>>()?;
            from_rows(rows, path)?
        }
        SeriesFormat::Wav => {
            let (samples, sample_rate) = read_wav(path)?;
            TimeSeries::from_uniform(sample_rate as f64, samples)
                .with_context(|| format!("invalid series in {}", path.display()))?
        }
    };

    log::info!(
        "[Storage] Loaded {} samples from {}",
        series.len(),
        path.display()
    );
    Ok(series)
}

/// Save session notes as pretty JSON
pub fn save_session_notes(path: &Path, notes: &SessionNotes) -> Result<()> {
    let json = serde_json::to_string_pretty(notes)?;
    ensure_parent(path)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

pub fn load_session_notes(path: &Path) -> Result<SessionNotes> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn join_row(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_row(line: &str, row: usize, path: &Path) -> Result<Vec<f64>> {
    line.split(',')
        .enumerate()
        .map(|(col, field)| {
            field.trim().parse::<f64>().with_context(|| {
                format!(
                    "{}: row {}, column {}: '{}' is not a number",
                    path.display(),
                    row + 1,
                    col + 1,
                    field.trim()
                )
            })
        })
        .collect()
}

fn from_rows(rows: Vec<Vec<f64>>, path: &Path) -> Result<TimeSeries> {
    let [timestamps, values]: [Vec<f64>; 2] = rows.try_into().map_err(|rows: Vec<Vec<f64>>| {
        anyhow!(
            "{} must hold exactly two rows (timestamps, values), found {}",
            path.display(),
            rows.len()
        )
    })?;
    TimeSeries::new(timestamps, values)
        .with_context(|| format!("invalid series in {}", path.display()))
}

fn read_wav(path: &Path) -> Result<(Vec<f64>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(anyhow!(
            "{} must be mono (found {} channels)",
            path.display(),
            spec.channels
        ));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map(f64::from).map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f64>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f64;
            match spec.bits_per_sample {
                8 | 16 | 24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f64 / max)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f64>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("modal_probe_storage_{}", name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_series() -> TimeSeries {
        TimeSeries::new(vec![0.0, 0.001, 0.002, 0.0035], vec![0.5, -0.25, 1e-7, 3.0]).unwrap()
    }

    #[test]
    fn test_json_layout_is_two_rows() {
        let path = scratch_dir("json").join("run.json");
        save_series(&path, &sample_series()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 2);
        assert_eq!(raw[1][3], 3.0);
        assert_eq!(load_series(&path).unwrap(), sample_series());
    }

    #[test]
    fn test_csv_roundtrip_and_parse_errors() {
        let dir = scratch_dir("csv");
        let path = dir.join("run.csv");
        save_series(&path, &sample_series()).unwrap();
        assert_eq!(load_series(&path).unwrap(), sample_series());

        let bad = dir.join("bad.csv");
        fs::write(&bad, "0,1,2\n0.5,abc,1\n").unwrap();
        let err = load_series(&bad).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2, column 2"));
    }

    #[test]
    fn test_rejects_invalid_tables() {
        let dir = scratch_dir("invalid");

        let one_row = dir.join("one_row.json");
        fs::write(&one_row, "[[0.0, 1.0]]").unwrap();
        assert!(load_series(&one_row).is_err());

        let unordered = dir.join("unordered.json");
        fs::write(&unordered, "[[0.0, 2.0, 1.0], [1.0, 2.0, 3.0]]").unwrap();
        assert!(load_series(&unordered).is_err());

        assert!(SeriesFormat::from_path(Path::new("run.txt")).is_err());
    }

    #[test]
    fn test_wav_load_uses_sample_rate() {
        let path = scratch_dir("wav").join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for value in [0i16, 16383, 32767, -32767] {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        let series = load_series(&path).unwrap();
        assert_eq!(series.len(), 4);
        assert!((series.timestamps()[3] - 3.0 / 8000.0).abs() < 1e-12);
        assert!((series.values()[2] - 1.0).abs() < 1e-12);
        assert!((series.values()[3] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_session_notes_roundtrip() {
        let path = scratch_dir("notes").join("session.json");
        let notes = SessionNotes {
            duration_s: 5.0,
            start_hz: 20.0,
            end_hz: 2000.0,
            volume: 0.8,
            notes: "steel beam, clamp A".to_string(),
            filename: "sweep.wav".to_string(),
        };
        save_session_notes(&path, &notes).unwrap();
        assert_eq!(load_session_notes(&path).unwrap(), notes);
    }
}
