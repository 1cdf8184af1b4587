//! Fixed-capacity rate-of-change windows for CO2 and tVOC.
//!
//! Each window is a time-ordered ring of `(timestamp, value)` samples used
//! only for rate and plateau math — never as the authoritative current
//! value (that lives in `SensorState`). The oldest sample is evicted on
//! overflow.

use embassy_time::Instant;
use heapless::Deque;

/// Samples kept per window. Sized for roughly half a day of readings at the
/// vendor feed's cadence.
pub const RATE_WINDOW_SAMPLES: usize = 40;

/// Minimum samples before a rate is considered meaningful; fewer is treated
/// as insufficient data by callers.
const MIN_RATE_SAMPLES: usize = 3;

/// Minimum samples before a plateau can be declared.
const MIN_PLATEAU_SAMPLES: usize = 10;

/// Minimum span between first and last sample for a usable rate.
const MIN_RATE_SPAN_SECS: u64 = 60;

/// Bounded ring of timestamped samples with rate/plateau queries.
#[derive(Debug)]
pub struct RateWindow<const N: usize = RATE_WINDOW_SAMPLES> {
    samples: Deque<(Instant, f32), N>,
}

impl<const N: usize> RateWindow<N> {
    pub const fn new() -> Self {
        Self {
            samples: Deque::new(),
        }
    }

    /// Append a sample, evicting the oldest when full. Out-of-order samples
    /// (clock went backwards across a restart) reset the window instead of
    /// corrupting the rate math.
    pub fn push(&mut self, at: Instant, value: f32) {
        if let Some(&(last_at, _)) = self.samples.back() {
            if at < last_at {
                self.samples.clear();
            }
        }
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        // Cannot fail: a slot was just freed if the ring was full.
        let _ = self.samples.push_back((at, value));
    }

    /// Drop every sample (done on AWAY entry so the purge window starts
    /// from a clean slate).
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Signed rate of change in units per minute across the whole window,
    /// or `None` when there is not enough data to say.
    pub fn rate_per_min(&self) -> Option<f32> {
        if self.samples.len() < MIN_RATE_SAMPLES {
            return None;
        }
        let &(t0, v0) = self.samples.front()?;
        let &(t1, v1) = self.samples.back()?;
        let span_secs = (t1 - t0).as_secs();
        if span_secs < MIN_RATE_SPAN_SECS {
            return None;
        }
        Some((v1 - v0) / (span_secs as f32 / 60.0))
    }

    /// Plateau check: every consecutive-pair rate magnitude stays below
    /// `rate_threshold` (units/min) across the whole window, the window has
    /// accumulated enough samples to mean anything, and the latest value
    /// sits below the ceiling when one is given.
    pub fn plateau(&self, rate_threshold: f32, ceiling: Option<f32>) -> bool {
        if self.samples.len() < MIN_PLATEAU_SAMPLES {
            return false;
        }
        if let (Some(limit), Some(&(_, latest))) = (ceiling, self.samples.back()) {
            if latest >= limit {
                return false;
            }
        }
        let mut prev: Option<(Instant, f32)> = None;
        for &(at, value) in self.samples.iter() {
            if let Some((prev_at, prev_value)) = prev {
                let secs = (at - prev_at).as_secs();
                if secs == 0 {
                    prev = Some((at, value));
                    continue;
                }
                let rate = (value - prev_value).abs() / (secs as f32 / 60.0);
                if rate >= rate_threshold {
                    return false;
                }
            }
            prev = Some((at, value));
        }
        true
    }

    /// Most recent sample value, if any.
    pub fn latest(&self) -> Option<f32> {
        self.samples.back().map(|&(_, v)| v)
    }
}

impl<const N: usize> Default for RateWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}
