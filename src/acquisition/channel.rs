// Channel module - scalar sensor capability and its simulated implementation

use std::f64::consts::PI;
use std::time::Instant;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source that yields one scalar reading per call
///
/// Hardware drivers (accelerometers, DAQ boards) implement this; the
/// recorder only needs blocking single reads.
pub trait ScalarChannel {
    fn read_scalar(&mut self) -> Result<f64>;
}

/// Time base of a simulated channel
#[derive(Debug, Clone, Copy)]
enum Clock {
    /// Real elapsed time since construction
    Wall(Instant),
    /// Advances by a fixed step on every read
    Stepped { next: f64, step: f64 },
}

impl Clock {
    fn tick(&mut self) -> f64 {
        match self {
            Clock::Wall(start) => start.elapsed().as_secs_f64(),
            Clock::Stepped { next, step } => {
                let t = *next;
                *next += *step;
                t
            }
        }
    }
}

/// Damped sinusoid `A0·e^(−βt)·sin(2πft)` with optional uniform noise
#[derive(Debug, Clone)]
pub struct SimulatedChannel {
    amplitude: f64,
    beta: f64,
    frequency_hz: f64,
    noise_amplitude: f64,
    rng: StdRng,
    clock: Clock,
}

impl SimulatedChannel {
    /// Channel driven by the wall clock
    pub fn new(amplitude: f64, beta: f64, frequency_hz: f64) -> Self {
        Self {
            amplitude,
            beta,
            frequency_hz,
            noise_amplitude: 0.0,
            rng: StdRng::seed_from_u64(0),
            clock: Clock::Wall(Instant::now()),
        }
    }

    /// Replace the wall clock with one that advances `step_s` per read
    pub fn with_step_clock(mut self, step_s: f64) -> Self {
        self.clock = Clock::Stepped {
            next: 0.0,
            step: step_s,
        };
        self
    }

    /// Add uniform noise in `[-amplitude, amplitude)` from a seeded generator
    pub fn with_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise_amplitude = amplitude.abs();
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Noise-free value at time `t`
    pub fn signal(&self, t: f64) -> f64 {
        self.amplitude * (-self.beta * t).exp() * (2.0 * PI * self.frequency_hz * t).sin()
    }
}

impl ScalarChannel for SimulatedChannel {
    fn read_scalar(&mut self) -> Result<f64> {
        let t = self.clock.tick();
        let noise = if self.noise_amplitude > 0.0 {
            self.rng
                .gen_range(-self.noise_amplitude..self.noise_amplitude)
        } else {
            0.0
        };
        Ok(self.signal(t) + noise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_clock_is_deterministic() {
        let mut channel = SimulatedChannel::new(1.0, 0.0, 10.0).with_step_clock(0.025);
        let readings: Vec<f64> = (0..4).map(|_| channel.read_scalar().unwrap()).collect();
        // Quarter periods of a 10 Hz sine
        let expected = [0.0, 1.0, 0.0, -1.0];
        for (got, want) in readings.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_envelope_decays() {
        let channel = SimulatedChannel::new(2.0, 1.0, 0.25);
        // sin(2π·0.25·1) = 1
        assert!((channel.signal(1.0) - 2.0 * (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_noise_is_bounded_and_seeded() {
        let read_all = |seed| {
            let mut channel = SimulatedChannel::new(0.0, 0.0, 1.0)
                .with_step_clock(0.01)
                .with_noise(0.5, seed);
            (0..100)
                .map(|_| channel.read_scalar().unwrap())
                .collect::<Vec<f64>>()
        };
        let first = read_all(42);
        assert!(first.iter().all(|v| v.abs() <= 0.5));
        assert_eq!(first, read_all(42));
        assert_ne!(first, read_all(43));
    }
}
