// Recorder - paced sampling thread feeding a lock-free SPSC ring
//
// Threading model:
// - Sampling thread: owns the channel and the ring Producer, reads at the
//   target rate and pushes (elapsed_s, value) pairs
// - Caller thread: owns the Consumer, drains the ring until the sampling
//   thread ends, then builds an owned TimeSeries snapshot
//
// Analysis never sees the ring; it only receives the finished snapshot.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use rtrb::{Consumer, RingBuffer};
use serde::Serialize;
use statrs::statistics::Statistics;

use super::channel::ScalarChannel;
use crate::analysis::series::TimeSeries;

/// Ring capacity in samples
pub const DEFAULT_RING_CAPACITY: usize = 4096;

/// How often the caller drains the ring while recording
const DRAIN_INTERVAL: Duration = Duration::from_millis(2);

type Sample = (f64, f64);

/// Sampling thread counters
#[derive(Debug, Default, Clone, Copy)]
struct ThreadCounters {
    read_errors: usize,
    dropped: usize,
}

/// Timing quality of a finished recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordingStats {
    pub samples: usize,
    /// Mean of the instantaneous rates `1 / Δt`
    pub achieved_rate_hz: f64,
    /// Population standard deviation of the instantaneous rates
    pub rate_std_hz: f64,
    pub read_errors: usize,
    /// Samples lost because the ring was full
    pub dropped: usize,
}

/// Result of [`Recorder::record`]
#[derive(Debug, Clone)]
pub struct Recording {
    pub series: TimeSeries,
    pub stats: RecordingStats,
}

/// Records a scalar channel for a fixed duration at a target rate
#[derive(Debug, Clone, Copy)]
pub struct Recorder {
    duration: Duration,
    target_rate_hz: f64,
    ring_capacity: usize,
}

impl Recorder {
    pub fn new(duration: Duration, target_rate_hz: f64) -> Self {
        Self {
            duration,
            target_rate_hz,
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }

    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity.max(1);
        self
    }

    /// Record `channel` on a dedicated thread and return the snapshot
    ///
    /// Read errors are logged and skipped. Fails when fewer than two
    /// samples were captured.
    pub fn record<C>(&self, mut channel: C) -> Result<Recording>
    where
        C: ScalarChannel + Send + 'static,
    {
        if !(self.target_rate_hz.is_finite() && self.target_rate_hz > 0.0) {
            return Err(anyhow!(
                "target rate must be positive, got {} Hz",
                self.target_rate_hz
            ));
        }
        let period = Duration::try_from_secs_f64(1.0 / self.target_rate_hz).with_context(|| {
            format!(
                "target rate {} Hz has no representable sampling period",
                self.target_rate_hz
            )
        })?;

        let (mut producer, mut consumer) = RingBuffer::<Sample>::new(self.ring_capacity);
        let duration = self.duration;

        log::info!(
            "[Recorder] Recording {:.2}s at {:.1} Hz",
            duration.as_secs_f64(),
            self.target_rate_hz
        );

        let handle = thread::Builder::new()
            .name("modal-recorder".to_string())
            .spawn(move || {
                let mut counters = ThreadCounters::default();
                let start = Instant::now();
                let mut tick: u32 = 0;

                loop {
                    let deadline = period * tick;
                    if deadline >= duration {
                        break;
                    }
                    if let Some(wait) = deadline.checked_sub(start.elapsed()) {
                        thread::sleep(wait);
                    }
                    tick = tick.saturating_add(1);

                    let elapsed = start.elapsed().as_secs_f64();
                    match channel.read_scalar() {
                        Ok(value) => {
                            if producer.push((elapsed, value)).is_err() {
                                counters.dropped += 1;
                            }
                        }
                        Err(err) => {
                            counters.read_errors += 1;
                            log::warn!("[Recorder] Read failed at {:.4}s: {:#}", elapsed, err);
                        }
                    }
                }
                counters
            })
            .context("Failed to spawn recording thread")?;

        let mut samples: Vec<Sample> = Vec::new();
        while !handle.is_finished() {
            drain(&mut consumer, &mut samples);
            thread::sleep(DRAIN_INTERVAL);
        }
        let counters = handle
            .join()
            .map_err(|_| anyhow!("Recording thread panicked"))?;
        drain(&mut consumer, &mut samples);

        if counters.dropped > 0 {
            log::warn!("[Recorder] {} samples dropped, ring full", counters.dropped);
        }

        let (timestamps, values): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();
        let stats = rate_stats(&timestamps, counters);
        log::info!(
            "[Recorder] {} samples, achieved {:.1} ± {:.1} Hz",
            stats.samples,
            stats.achieved_rate_hz,
            stats.rate_std_hz
        );

        let series = TimeSeries::new(timestamps, values).context("Recording is not a valid series")?;
        Ok(Recording { series, stats })
    }
}

fn drain(consumer: &mut Consumer<Sample>, samples: &mut Vec<Sample>) {
    while let Ok(sample) = consumer.pop() {
        samples.push(sample);
    }
}

fn rate_stats(timestamps: &[f64], counters: ThreadCounters) -> RecordingStats {
    let rates: Vec<f64> = timestamps
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|dt| *dt > 0.0)
        .map(|dt| 1.0 / dt)
        .collect();
    let (achieved_rate_hz, rate_std_hz) = if rates.is_empty() {
        (0.0, 0.0)
    } else {
        (rates.iter().mean(), rates.iter().population_std_dev())
    };

    RecordingStats {
        samples: timestamps.len(),
        achieved_rate_hz,
        rate_std_hz,
        read_errors: counters.read_errors,
        dropped: counters.dropped,
    }
}
