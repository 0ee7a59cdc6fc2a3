// Window functions applied before FFTs to reduce spectral leakage

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Supported tapering windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl WindowKind {
    /// Symmetric window of length `len` (endpoints mirror each other)
    ///
    /// Used for the single full-length transform.
    pub fn symmetric(self, len: usize) -> Vec<f64> {
        self.coefficients(len, len.saturating_sub(1))
    }

    /// Periodic window of length `len` (one sample of a `len + 1` symmetric window dropped)
    ///
    /// Used for overlapping STFT segments so that shifted copies sum evenly.
    pub fn periodic(self, len: usize) -> Vec<f64> {
        self.coefficients(len, len)
    }

    fn coefficients(self, len: usize, denominator: usize) -> Vec<f64> {
        if len == 1 || denominator == 0 {
            return vec![1.0; len];
        }
        let m = denominator as f64;
        (0..len)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / m;
                match self {
                    WindowKind::Rectangular => 1.0,
                    WindowKind::Hann => 0.5 - 0.5 * x.cos(),
                    WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                    WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}
