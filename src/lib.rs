//! Adaptive quality controller.
//!
//! Samples the running frame rate once per frame and moves a discrete quality
//! level up or down one step at a time to keep the frame rate inside a band
//! just below the target, with hysteresis, debouncing and a capped number of
//! increase attempts.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod levels;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod platform;
pub mod registry;
pub mod simulation;
pub mod smoothing;

pub use config::{ConfigManager, HostConfig, QualityConfig};
pub use controller::{AdaptiveQualityController, ControllerStatus, Direction, Lifecycle, TickOutcome};
pub use error::{ActivationError, ConfigError, ControllerError, StoreError};
pub use events::{QualityChange, QualityEvents, SubscriptionId};
pub use levels::{QualityLadder, QualityLevels, Step};
pub use persistence::{JsonLevelStore, LevelStore, MemoryLevelStore};
pub use platform::{DisplayCapability, DisplayPlatform, StaticDisplay};
pub use registry::{InstanceId, InstanceRegistry};
