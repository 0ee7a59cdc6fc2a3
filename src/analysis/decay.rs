// Decay module - exponential envelope fit and damping ratio
//
// The peak amplitudes of a free, underdamped vibration follow
//   amplitude(t) = A0 · exp(-beta · t)
// with t the absolute peak time, so A0 is the envelope at t = 0.
//
// beta is recovered with Levenberg-Marquardt least squares starting from
// (A0, beta) = (first peak value, 1.0). The damping ratio uses the
// logarithmic decrement relation
//   zeta = beta / (2π · sqrt(1 - (beta / 2π)²))
// which only has a real solution for |beta| < 2π.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::analysis::peaks::{PeakSet, MIN_FIT_PEAKS};
use crate::error::AnalysisError;

/// Upper bound on accepted plus rejected solver iterations
const MAX_ITERATIONS: usize = 400;

/// Relative parameter change treated as converged
const PARAM_TOLERANCE: f64 = 1.5e-8;

/// Relative cost reduction treated as converged
const COST_TOLERANCE: f64 = 1.5e-8;

/// Damping factor beyond which no downhill step exists
const MAX_LAMBDA: f64 = 1e16;

/// Outcome of an exponential decay fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayFitResult {
    /// Envelope amplitude at t = 0
    pub a0: f64,
    /// Decay rate in 1/s
    pub beta: f64,
    /// Dimensionless damping ratio (zeta)
    pub damping_ratio: f64,
    /// Coefficient of determination of the fitted envelope, at most 1
    pub r_squared: f64,
    /// Peaks per second over the fitted span; `None` when the span is zero
    pub omega_d: Option<f64>,
}

impl DecayFitResult {
    /// Envelope value at time `t`
    pub fn envelope(&self, t: f64) -> f64 {
        exponential_decay(t, self.a0, self.beta)
    }
}

/// `A0 · exp(-beta · t)`
pub fn exponential_decay(t: f64, a0: f64, beta: f64) -> f64 {
    a0 * (-beta * t).exp()
}

/// Damping ratio from decay rate
///
/// Fails with [`AnalysisError::InvalidDampingRegime`] when `|beta| >= 2π`.
pub fn damping_ratio(beta: f64) -> Result<f64, AnalysisError> {
    let normalized = beta / (2.0 * PI);
    if !beta.is_finite() || normalized.abs() >= 1.0 {
        return Err(AnalysisError::InvalidDampingRegime { beta });
    }
    Ok(beta / (2.0 * PI * (1.0 - normalized * normalized).sqrt()))
}

/// Coefficient of determination of `fitted` against `observed`
///
/// A constant observation has no variance to explain: the fit scores 1
/// when it reproduces the constant and 0 otherwise.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> f64 {
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_res: f64 = observed
        .iter()
        .zip(fitted)
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res <= f64::EPSILON {
        1.0
    } else {
        0.0
    }
}

/// Fit the exponential envelope to a peak set
pub fn fit_exponential_decay(peaks: &PeakSet) -> Result<DecayFitResult, AnalysisError> {
    if peaks.len() < MIN_FIT_PEAKS {
        return Err(AnalysisError::InsufficientPeaks {
            required: MIN_FIT_PEAKS,
            found: peaks.len(),
        });
    }

    let times = peaks.times();
    let values = peaks.values();
    let span = times[times.len() - 1] - times[0];
    let omega_d = (span != 0.0).then(|| peaks.len() as f64 / span);

    let (a0, beta) = levenberg_marquardt(times, values, [values[0], 1.0], MAX_ITERATIONS)?;
    let zeta = damping_ratio(beta)?;

    let fitted: Vec<f64> = times
        .iter()
        .map(|&t| exponential_decay(t, a0, beta))
        .collect();
    let r_squared = r_squared(values, &fitted);

    log::info!(
        "[DecayFitter] A0={:.4} beta={:.4} zeta={:.4} R^2={:.4} over {} peaks",
        a0,
        beta,
        zeta,
        r_squared,
        peaks.len()
    );

    Ok(DecayFitResult {
        a0,
        beta,
        damping_ratio: zeta,
        r_squared,
        omega_d,
    })
}

fn sum_squares(times: &[f64], values: &[f64], a0: f64, beta: f64) -> f64 {
    times
        .iter()
        .zip(values)
        .map(|(&t, &y)| (y - exponential_decay(t, a0, beta)).powi(2))
        .sum()
}

/// Two-parameter Levenberg-Marquardt with Marquardt diagonal scaling
fn levenberg_marquardt(
    times: &[f64],
    values: &[f64],
    initial: [f64; 2],
    max_iterations: usize,
) -> Result<(f64, f64), AnalysisError> {
    let [mut a0, mut beta] = initial;
    let mut cost = sum_squares(times, values, a0, beta);
    if !cost.is_finite() {
        return Err(AnalysisError::FitConvergence {
            reason: format!("initial guess A0={}, beta={} is not evaluable", a0, beta),
        });
    }

    let scale: f64 = values.iter().map(|y| y * y).sum();
    let mut lambda = 1e-3;

    for iteration in 0..max_iterations {
        if cost <= scale * f64::EPSILON * f64::EPSILON {
            return Ok((a0, beta));
        }

        // Normal equations J^T J δ = J^T r for the model Jacobian
        let (mut jtj_aa, mut jtj_ab, mut jtj_bb) = (0.0, 0.0, 0.0);
        let (mut g_a, mut g_b) = (0.0, 0.0);
        for (&t, &y) in times.iter().zip(values) {
            let e = (-beta * t).exp();
            let d_a = e;
            let d_b = -a0 * t * e;
            let r = y - a0 * e;
            jtj_aa += d_a * d_a;
            jtj_ab += d_a * d_b;
            jtj_bb += d_b * d_b;
            g_a += d_a * r;
            g_b += d_b * r;
        }

        if !(jtj_aa > 0.0 && jtj_aa.is_finite() && jtj_bb.is_finite()) {
            return Err(AnalysisError::FitConvergence {
                reason: format!(
                    "model Jacobian degenerate at A0={:.4}, beta={:.4}",
                    a0, beta
                ),
            });
        }

        let mut accepted = false;
        while lambda < MAX_LAMBDA {
            let m_aa = jtj_aa * (1.0 + lambda);
            let m_bb = jtj_bb * (1.0 + lambda);
            let det = m_aa * m_bb - jtj_ab * jtj_ab;
            if det.abs() <= f64::MIN_POSITIVE || !det.is_finite() {
                lambda *= 10.0;
                continue;
            }

            let step_a = (m_bb * g_a - jtj_ab * g_b) / det;
            let step_b = (m_aa * g_b - jtj_ab * g_a) / det;
            let next_a0 = a0 + step_a;
            let next_beta = beta + step_b;
            let next_cost = sum_squares(times, values, next_a0, next_beta);

            if next_cost.is_finite() && next_cost < cost {
                let reduction = cost - next_cost;
                let small_step = step_a.abs() <= PARAM_TOLERANCE * (a0.abs() + PARAM_TOLERANCE)
                    && step_b.abs() <= PARAM_TOLERANCE * (beta.abs() + PARAM_TOLERANCE);

                a0 = next_a0;
                beta = next_beta;
                cost = next_cost;
                lambda = (lambda / 10.0).max(1e-12);
                accepted = true;

                if small_step || reduction <= COST_TOLERANCE * (cost + reduction) {
                    log::debug!(
                        "[DecayFitter] Converged after {} iterations, cost={:.3e}",
                        iteration + 1,
                        cost
                    );
                    return Ok((a0, beta));
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No downhill direction left: already at a stationary point
            log::debug!(
                "[DecayFitter] Stationary after {} iterations, cost={:.3e}",
                iteration,
                cost
            );
            return Ok((a0, beta));
        }

        if !(a0.is_finite() && beta.is_finite()) {
            return Err(AnalysisError::FitConvergence {
                reason: "parameters diverged to non-finite values".to_string(),
            });
        }
    }

    Err(AnalysisError::FitConvergence {
        reason: format!(
            "no convergence within {} iterations (A0={:.4}, beta={:.4})",
            max_iterations, a0, beta
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::peaks::detect_peaks;
    use crate::analysis::series::TimeSeries;
    use crate::config::PeakDetectionConfig;
    use crate::error::{AnalysisErrorCodes, ErrorCode};

    fn envelope_peaks(a0: f64, beta: f64, times: &[f64]) -> PeakSet {
        let values = times.iter().map(|&t| exponential_decay(t, a0, beta)).collect();
        PeakSet::from_points(times.to_vec(), values).unwrap()
    }

    #[test]
    fn test_exact_envelope_recovered() {
        let times: Vec<f64> = (0..10).map(|i| 0.3 + 0.25 * i as f64).collect();
        let result = fit_exponential_decay(&envelope_peaks(3.0, 0.7, &times)).unwrap();

        assert!((result.a0 - 3.0).abs() < 1e-6, "A0 {}", result.a0);
        assert!((result.beta - 0.7).abs() < 1e-6, "beta {}", result.beta);
        assert!(result.r_squared > 0.999_999);
        let expected_zeta = 0.7 / (2.0 * PI * (1.0 - (0.7 / (2.0 * PI)).powi(2)).sqrt());
        assert!((result.damping_ratio - expected_zeta).abs() < 1e-9);
    }

    #[test]
    fn test_damped_sinusoid_parameters_recovered() {
        let (a0, beta, frequency, sample_rate) = (2.5, 0.6, 8.0, 2000.0);
        let values: Vec<f64> = (0..(sample_rate * 5.0) as usize)
            .map(|i| {
                let t = i as f64 / sample_rate;
                a0 * (-beta * t).exp() * (2.0 * PI * frequency * t).sin()
            })
            .collect();
        let series = TimeSeries::from_uniform(sample_rate, values).unwrap();

        let peaks = detect_peaks(&series, &PeakDetectionConfig::default()).unwrap();
        let result = fit_exponential_decay(&peaks).unwrap();

        assert!((result.beta - beta).abs() / beta < 0.05, "beta {}", result.beta);
        assert!((result.a0 - a0).abs() / a0 < 0.05, "A0 {}", result.a0);
        assert!(result.r_squared > 0.95);
        let omega_d = result.omega_d.unwrap();
        assert!((omega_d - frequency).abs() < 1.5, "omega_d {}", omega_d);
    }

    #[test]
    fn test_sampled_cosine_scenario() {
        // 21 samples over 2 s of 2·exp(-0.5t)·cos(4πt)
        let timestamps: Vec<f64> = (0..=20).map(|i| i as f64 * 0.1).collect();
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
        let result = fit_exponential_decay(&peaks).unwrap();

        assert!((result.beta - 0.5).abs() < 1e-3, "beta {}", result.beta);
        assert!((result.damping_ratio - 0.0796).abs() < 1e-3);
        assert!(result.r_squared > 0.99);
    }

    #[test]
    fn test_fast_decay_is_invalid_regime() {
        let times = [0.0, 0.05, 0.1, 0.15, 0.2];
        let err = fit_exponential_decay(&envelope_peaks(1.0, 8.0, &times)).unwrap_err();
        match err {
            AnalysisError::InvalidDampingRegime { beta } => assert!((beta - 8.0).abs() < 1e-3),
            other => panic!("expected InvalidDampingRegime, got {:?}", other),
        }
    }

    #[test]
    fn test_unevaluable_initial_guess_fails_to_converge() {
        // exp(800) overflows at the initial beta of 1
        let peaks = PeakSet::from_points(vec![-800.0, -799.0], vec![1.0, 0.5]).unwrap();
        let err = fit_exponential_decay(&peaks).unwrap_err();
        assert!(
            matches!(err, AnalysisError::FitConvergence { .. }),
            "got {:?}",
            err
        );
        assert_eq!(err.code(), AnalysisErrorCodes::FIT_CONVERGENCE);
    }

    #[test]
    fn test_vanishing_jacobian_fails_to_converge() {
        // exp(-1000) underflows, leaving no sensitivity to A0
        let peaks = PeakSet::from_points(vec![1000.0, 1001.0], vec![1.0, 0.5]).unwrap();
        match fit_exponential_decay(&peaks).unwrap_err() {
            AnalysisError::FitConvergence { reason } => assert!(reason.contains("degenerate")),
            other => panic!("expected FitConvergence, got {:?}", other),
        }
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let times: Vec<f64> = (0..10).map(|i| i as f64 * 0.2).collect();
        let values: Vec<f64> = times.iter().map(|&t| exponential_decay(t, 2.0, 0.5)).collect();

        let err = levenberg_marquardt(&times, &values, [2.0, 1.0], 1).unwrap_err();
        match err {
            AnalysisError::FitConvergence { reason } => assert!(reason.contains("1 iterations")),
            other => panic!("expected FitConvergence, got {:?}", other),
        }

        let (a0, beta) = levenberg_marquardt(&times, &values, [2.0, 1.0], MAX_ITERATIONS).unwrap();
        assert!((a0 - 2.0).abs() < 1e-6 && (beta - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_damping_ratio_guard() {
        assert!(damping_ratio(2.0 * PI).is_err());
        assert!(damping_ratio(-7.0).is_err());
        assert!(damping_ratio(f64::NAN).is_err());
        assert!((damping_ratio(0.0).unwrap()).abs() < 1e-15);
    }

    #[test]
    fn test_single_peak_rejected() {
        let peaks = PeakSet::from_points(vec![1.0], vec![1.0]).unwrap();
        assert_eq!(
            fit_exponential_decay(&peaks).unwrap_err(),
            AnalysisError::InsufficientPeaks {
                required: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_r_squared_bounds() {
        assert_eq!(r_squared(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0);
        assert!(r_squared(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]) < 0.0);
        assert_eq!(r_squared(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r_squared(&[2.0, 2.0], &[1.0, 3.0]), 0.0);
    }

    #[test]
    fn test_omega_d_counts_peaks_per_second() {
        let times = [1.0, 1.5, 2.0, 2.5];
        let result = fit_exponential_decay(&envelope_peaks(1.0, 0.2, &times)).unwrap();
        assert!((result.omega_d.unwrap() - 4.0 / 1.5).abs() < 1e-12);
    }
}
