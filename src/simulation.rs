//! Synthetic frame-time load for the bundled host.
//!
//! Frame cost grows linearly with the quality level, with a slow periodic
//! swell so the controller has something to react to in both directions.

use crate::config::HostConfig;
use std::time::Duration;

/// Period of the load swell in frames.
const SWELL_PERIOD_FRAMES: u64 = 2400;

/// Deterministic frame-time model.
#[derive(Debug, Clone)]
pub struct SyntheticLoad {
    base_frame_ms: f64,
    frame_ms_per_level: f64,
    /// Peak extra cost of the swell as a fraction of the level cost
    swell: f64,
    frame: u64,
}

impl SyntheticLoad {
    pub fn new(base_frame_ms: f64, frame_ms_per_level: f64, swell: f64) -> Self {
        Self {
            base_frame_ms,
            frame_ms_per_level,
            swell: swell.max(0.0),
            frame: 0,
        }
    }

    pub fn from_host_config(host: &HostConfig) -> Self {
        Self::new(host.base_frame_ms, host.frame_ms_per_level, 0.25)
    }

    /// Frame cost at `level` without the swell.
    pub fn steady_frame_ms(&self, level: i32) -> f64 {
        self.base_frame_ms + self.frame_ms_per_level * level.max(0) as f64
    }

    /// Produce the next frame's duration for the given level.
    pub fn next_frame(&mut self, level: i32) -> Duration {
        let phase = (self.frame % SWELL_PERIOD_FRAMES) as f64 / SWELL_PERIOD_FRAMES as f64;
        let swell = 1.0 + self.swell * (phase * std::f64::consts::TAU).sin().max(0.0);
        self.frame += 1;

        Duration::from_secs_f64(self.steady_frame_ms(level) * swell / 1000.0)
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_grows_with_level() {
        let load = SyntheticLoad::new(7.0, 1.5, 0.0);
        assert_eq!(load.steady_frame_ms(0), 7.0);
        assert_eq!(load.steady_frame_ms(2), 10.0);
        assert_eq!(load.steady_frame_ms(-1), 7.0);
    }

    #[test]
    fn test_swell_never_speeds_frames_up() {
        let mut load = SyntheticLoad::new(10.0, 0.0, 0.5);
        let steady = Duration::from_secs_f64(0.010);

        let frames: Vec<Duration> = (0..SWELL_PERIOD_FRAMES).map(|_| load.next_frame(0)).collect();

        assert!(frames.iter().all(|f| *f >= steady - Duration::from_nanos(1)));
        assert!(frames.iter().any(|f| *f > steady + Duration::from_millis(4)));
        assert_eq!(load.frames_produced(), SWELL_PERIOD_FRAMES);
    }
}
