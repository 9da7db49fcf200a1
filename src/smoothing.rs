//! Frame-rate smoothing window.
//!
//! Keeps the most recent per-tick instantaneous frame rates and reports their
//! mean, which is what the controller compares against its hysteresis band.

use std::collections::VecDeque;
use std::time::Duration;

/// Window capacity in samples.
pub const WINDOW_CAPACITY: usize = 30;

/// Bounded FIFO of instantaneous frame rates.
#[derive(Debug, Clone)]
pub struct FrameRateWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl FrameRateWindow {
    /// Create a new window with the default capacity (30 samples).
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }

    /// Create a new window with a specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Push a new rate, removing the oldest if at capacity.
    pub fn push(&mut self, rate: f64) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rate);
    }

    /// Convert a frame duration into an instantaneous rate and push it.
    ///
    /// Returns the smoothed rate after the push, or `None` when the duration
    /// is zero, negative or not finite. Nothing is recorded in that case.
    pub fn record_frame(&mut self, frame_duration_secs: f64) -> Option<f64> {
        if !frame_duration_secs.is_finite() || frame_duration_secs <= 0.0 {
            return None;
        }
        let rate = 1.0 / frame_duration_secs;
        self.push(rate);
        Some(self.smoothed().unwrap_or(rate))
    }

    /// Same as [`record_frame`](Self::record_frame) for a `Duration`.
    pub fn record_duration(&mut self, frame_duration: Duration) -> Option<f64> {
        self.record_frame(frame_duration.as_secs_f64())
    }

    /// Arithmetic mean of the window. Returns 0.0 if empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Smoothed rate: the mean when more than one sample is held, otherwise
    /// the single raw sample.
    pub fn smoothed(&self) -> Option<f64> {
        match self.samples.len() {
            0 => None,
            1 => self.samples.back().copied(),
            _ => Some(self.average()),
        }
    }

    /// Most recently pushed rate.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}

impl Default for FrameRateWindow {
    fn default() -> Self {
        Self::new()
    }
}
