//! Display capability and target frame-rate resolution.
//!
//! The host selects a [`DisplayCapability`] once at startup and injects a
//! [`DisplayPlatform`] into the controller, which resolves its target frame
//! rate from it on activation.

use serde::{Deserialize, Serialize};

/// Lowest device refresh rate trusted as a target on generic XR displays.
pub const MIN_DEVICE_REFRESH_HZ: f64 = 30.0;

/// Holographic displays reporting a rate at or below this fall back to 60 Hz.
const HOLOGRAPHIC_MIN_HZ: f64 = 59.0;
const HOLOGRAPHIC_FALLBACK_HZ: f64 = 60.0;

/// Kind of display the host is rendering to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayCapability {
    /// Flat screen, no head-mounted display
    #[default]
    NoXr,
    /// Head-mounted display reporting its refresh rate
    GenericXr,
    /// Holographic head-mounted display
    HolographicXr,
}

/// Platform queries the controller needs at activation.
pub trait DisplayPlatform: Send {
    fn capability(&self) -> DisplayCapability;

    /// Native refresh rate of the display; 0 when unavailable.
    fn display_refresh_rate(&self) -> f64;

    /// Application-level frame-rate cap; 0 or negative when uncapped.
    fn application_frame_rate_cap(&self) -> f64;
}

/// Fixed platform description, typically read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticDisplay {
    pub capability: DisplayCapability,
    pub refresh_rate: f64,
    pub application_frame_rate_cap: f64,
}

impl Default for StaticDisplay {
    fn default() -> Self {
        Self {
            capability: DisplayCapability::NoXr,
            refresh_rate: 0.0,
            application_frame_rate_cap: 0.0,
        }
    }
}

impl DisplayPlatform for StaticDisplay {
    fn capability(&self) -> DisplayCapability {
        self.capability
    }

    fn display_refresh_rate(&self) -> f64 {
        match self.capability {
            DisplayCapability::NoXr => 0.0,
            _ => self.refresh_rate,
        }
    }

    fn application_frame_rate_cap(&self) -> f64 {
        self.application_frame_rate_cap
    }
}

/// Resolve the steady-state target frame rate.
///
/// Device refresh rate takes priority over an application cap. Holographic
/// displays never consult the application cap. The result never exceeds
/// `max_target`.
pub fn resolve_target_frame_rate(
    initial_target: f64,
    max_target: f64,
    platform: &dyn DisplayPlatform,
) -> f64 {
    let mut target = initial_target;
    let device_rate = platform.display_refresh_rate();

    match platform.capability() {
        DisplayCapability::HolographicXr => {
            if device_rate > 0.0 {
                target = if device_rate > HOLOGRAPHIC_MIN_HZ {
                    device_rate
                } else {
                    HOLOGRAPHIC_FALLBACK_HZ
                };
            }
        }
        DisplayCapability::GenericXr | DisplayCapability::NoXr => {
            let cap = platform.application_frame_rate_cap();
            if device_rate >= MIN_DEVICE_REFRESH_HZ {
                target = device_rate;
            } else if cap > 0.0 && cap < target {
                target = cap;
            }
        }
    }

    target.min(max_target)
}
