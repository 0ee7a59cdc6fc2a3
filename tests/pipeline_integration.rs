use std::f64::consts::PI;
use std::fs;
use std::path::PathBuf;

use modal_probe::analysis::decay::damping_ratio;
use modal_probe::config::PeakDetectionConfig;
use modal_probe::error::{AnalysisErrorCodes, ErrorCode};
use modal_probe::report::{write_report, PipelineSummary};
use modal_probe::storage::{load_series, save_series};
use modal_probe::{
    detect_peaks, estimate_dominant_frequency, fit_exponential_decay, run_pipeline,
    AnalysisConfig, AnalysisError, DynamicPeakDetector, PeakSet, TimeSeries,
};

fn damped_sinusoid(a0: f64, beta: f64, frequency: f64, sample_rate: f64, seconds: f64) -> TimeSeries {
    let samples = (sample_rate * seconds) as usize;
    let values = (0..samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            a0 * (-beta * t).exp() * (2.0 * PI * frequency * t).sin()
        })
        .collect();
    TimeSeries::from_uniform(sample_rate, values).expect("valid synthetic series")
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("modal_probe_it_{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn decay_parameters_recovered_from_detected_peaks() {
    let series = damped_sinusoid(3.0, 1.5, 10.0, 2000.0, 3.0);
    let peaks = detect_peaks(&series, &PeakDetectionConfig::default()).expect("peaks");
    let fit = fit_exponential_decay(&peaks).expect("fit");

    assert!((fit.beta - 1.5).abs() / 1.5 < 0.05, "beta {}", fit.beta);
    assert!((fit.a0 - 3.0).abs() / 3.0 < 0.05, "a0 {}", fit.a0);
    assert!(fit.r_squared > 0.95);
    assert!((fit.damping_ratio - damping_ratio(fit.beta).unwrap()).abs() < 1e-12);
}

#[test]
fn sinusoid_peak_count_matches_cycles() {
    let (frequency, seconds) = (5.0, 2.0);
    let series = damped_sinusoid(1.0, 0.0, frequency, 1000.0, seconds);
    let candidates = DynamicPeakDetector::new(PeakDetectionConfig::default()).candidates(&series);
    let expected = (frequency * seconds) as i64;
    assert!((candidates.len() as i64 - expected).abs() <= 1, "{} peaks", candidates.len());
}

#[test]
fn dominant_frequency_within_one_bin() {
    let series = damped_sinusoid(1.0, 0.0, 37.3, 1000.0, 2.0);
    let estimate = estimate_dominant_frequency(&series);
    // 2000 samples at 1 kHz -> 0.5 Hz bins
    assert!((estimate - 37.3).abs() <= 0.5, "estimate {}", estimate);
}

#[test]
fn twenty_one_sample_scenario() {
    let timestamps: Vec<f64> = (0..21).map(|i| i as f64 * 0.1).collect();
    let values = timestamps
        .iter()
        .map(|&t| 2.0 * (-0.5 * t).exp() * (2.0 * PI * 2.0 * t).cos())
        .collect();
    let series = TimeSeries::new(timestamps, values).unwrap();

    let config = PeakDetectionConfig {
        exclude_after_max: 0,
        exclude_last_n: 0,
        ..PeakDetectionConfig::default()
    };
    let peaks = detect_peaks(&series, &config).unwrap();
    let fit = fit_exponential_decay(&peaks).unwrap();

    assert!((fit.beta - 0.5).abs() < 1e-6);
    assert!((fit.damping_ratio - 0.0796).abs() < 1e-3);
    assert!(fit.r_squared > 0.99);
}

#[test]
fn boundary_errors() {
    let constant = TimeSeries::from_uniform(100.0, vec![1.0; 200]).unwrap();
    assert!(matches!(
        detect_peaks(&constant, &PeakDetectionConfig::default()),
        Err(AnalysisError::InsufficientPeaks { .. })
    ));

    let times = vec![0.0, 0.1, 0.2, 0.3, 0.4];
    let values = times.iter().map(|&t: &f64| 10.0 * (-8.0 * t).exp()).collect();
    let peaks = PeakSet::from_points(times, values).unwrap();
    let err = fit_exponential_decay(&peaks).unwrap_err();
    assert_eq!(err.code(), AnalysisErrorCodes::INVALID_DAMPING_REGIME);
}

#[test]
fn pipeline_report_roundtrip_through_storage() {
    let dir = scratch_dir("pipeline");
    let input = dir.join("run.csv");
    save_series(&input, &damped_sinusoid(2.0, 0.8, 12.0, 1000.0, 3.0)).unwrap();

    let series = load_series(&input).unwrap();
    let mut config = AnalysisConfig::default();
    config.spectrum.stft.segment_length = 256;
    let report = run_pipeline(&series, &config);
    assert!(report.is_complete());

    let filtered_path = dir.join("filtered_series.json");
    save_series(&filtered_path, report.filtered.as_ref().unwrap()).unwrap();
    assert_eq!(load_series(&filtered_path).unwrap().len(), series.len());

    let report_path = dir.join("analysis_report.json");
    let summary = PipelineSummary::new(series.len(), &report, Some(filtered_path.as_path()));
    write_report(&report_path, &summary).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    let beta = json["damping"]["ok"]["beta"].as_f64().unwrap();
    assert!((beta - 0.8).abs() < 0.05, "beta {}", beta);
    let frequencies = json["spectrum"]["ok"]["frequencies"].as_array().unwrap();
    assert!(frequencies[0].as_f64().unwrap() > 0.0);
    assert_eq!(json["filtered"]["ok"]["samples"], 3000);
}

#[test]
fn pipeline_is_idempotent() {
    let series = damped_sinusoid(1.0, 0.3, 8.0, 500.0, 4.0);
    let mut config = AnalysisConfig::default();
    config.spectrum.stft.segment_length = 128;

    let first = run_pipeline(&series, &config);
    let second = run_pipeline(&series, &config);
    assert_eq!(first.damping, second.damping);
    assert_eq!(first.spectrum, second.spectrum);
    assert_eq!(first.filtered, second.filtered);
}
