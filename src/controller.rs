//! Adaptive quality controller.
//!
//! This module contains the state machine that moves the quality level one
//! step at a time to keep the smoothed frame rate inside a hysteresis band
//! below the target frame rate.

use crate::config::QualityConfig;
use crate::error::{ActivationError, ConfigError, StoreError};
use crate::events::{ObserverError, QualityChange, QualityEvents, SubscriptionId};
use crate::levels::{QualityLevels, Step};
use crate::persistence::LevelStore;
use crate::platform::{resolve_target_frame_rate, DisplayPlatform};
use crate::registry::{InstanceId, InstanceRegistry};
use crate::smoothing::FrameRateWindow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Desired action computed from the smoothed frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    #[default]
    Hold,
    Up,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Down => write!(f, "down"),
            Direction::Hold => write!(f, "hold"),
            Direction::Up => write!(f, "up"),
        }
    }
}

/// Activation state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Never activated, or deactivated
    Idle,
    /// Holds the registry slot and reacts to ticks
    Active,
    /// Lost the activation race; never ticks again
    Inert,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Controller is not active
    Inactive,
    /// Still inside the startup warm-up window
    WarmingUp,
    /// Frame duration was zero, negative or not finite
    SkippedSample,
    /// Smoothed rate is inside the hysteresis band
    Holding { smoothed_rate: f64 },
    /// Direction has not been stable for long enough
    Waiting { direction: Direction, smoothed_rate: f64 },
    /// Decrease wanted, but the level floor was already discovered
    AtFloor,
    /// Increase wanted, but the level ceiling was already discovered
    AtCeiling,
    /// Increase wanted, but the up-attempt budget is spent
    UpBudgetExhausted,
    /// A one-step change took effect
    Changed(QualityChange),
    /// A decrease had no effect; this level is now the floor
    FloorDiscovered(i32),
    /// An increase had no effect; this level is now the ceiling
    CeilingDiscovered(i32),
}

/// Snapshot of controller state for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub instance: InstanceId,
    pub active: bool,
    pub current_level: i32,
    pub target_frame_rate: f64,
    pub smoothed_rate: Option<f64>,
    pub direction: Direction,
    pub min_level_reachable: Option<i32>,
    pub max_level_reachable: Option<i32>,
    pub up_attempts_used: u32,
}

/// Closed-loop quality controller.
///
/// Drive it by calling [`tick`](Self::tick) once per frame with the frame's
/// duration. Only one controller per [`InstanceRegistry`] can be active.
pub struct AdaptiveQualityController<L: QualityLevels> {
    id: InstanceId,
    registry: Arc<InstanceRegistry>,
    config: QualityConfig,
    startup_time: Duration,
    stability_delay: Duration,
    levels: L,
    store: Arc<dyn LevelStore>,
    display: Box<dyn DisplayPlatform>,
    events: QualityEvents,

    lifecycle: Lifecycle,
    target_frame_rate: f64,
    window: FrameRateWindow,
    direction: Direction,
    /// `None` right after an attempt, until a direction is observed again
    direction_changed_at: Option<Instant>,
    min_level_reachable: Option<i32>,
    max_level_reachable: Option<i32>,
    up_attempts_used: u32,
    last_applied: Option<Step>,
    started_at: Instant,
    last_smoothed: Option<f64>,
}

impl<L: QualityLevels> AdaptiveQualityController<L> {
    /// Create an idle controller. Fails if `config` is invalid.
    pub fn new(
        config: QualityConfig,
        levels: L,
        store: Arc<dyn LevelStore>,
        display: Box<dyn DisplayPlatform>,
        registry: Arc<InstanceRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let id = registry.allocate_id();
        let target_frame_rate = config.initial_target_framerate;
        let startup_time = config.startup_time();
        let stability_delay = config.stability_delay();

        Ok(Self {
            id,
            registry,
            config,
            startup_time,
            stability_delay,
            levels,
            store,
            display,
            events: QualityEvents::new(),
            lifecycle: Lifecycle::Idle,
            target_frame_rate,
            window: FrameRateWindow::new(),
            direction: Direction::Hold,
            direction_changed_at: None,
            min_level_reachable: None,
            max_level_reachable: None,
            up_attempts_used: 0,
            last_applied: None,
            started_at: Instant::now(),
            last_smoothed: None,
        })
    }

    /// Register a quality change subscriber.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&QualityChange) -> Result<(), ObserverError> + Send + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Become the active controller and restore the persisted level.
    pub fn activate(&mut self) -> Result<(), ActivationError> {
        self.activate_at(Instant::now())
    }

    /// Activate with an explicit timestamp (for testing).
    ///
    /// A controller that loses the race for the registry slot logs the
    /// contention and becomes permanently inert.
    pub fn activate_at(&mut self, now: Instant) -> Result<(), ActivationError> {
        match self.lifecycle {
            Lifecycle::Inert => return Err(ActivationError::Inert(self.id)),
            Lifecycle::Active => return Ok(()),
            Lifecycle::Idle => {}
        }

        if let Err(e) = self.registry.try_claim(self.id) {
            warn!(instance = self.id, "{}", e);
            self.lifecycle = Lifecycle::Inert;
            return Err(e);
        }

        self.target_frame_rate = resolve_target_frame_rate(
            self.config.initial_target_framerate,
            self.config.max_target_framerate,
            self.display.as_ref(),
        );

        let initial_level = self.levels.current_level();
        let restored = self.store.persisted_level(initial_level);
        let applied = self.levels.apply_level(restored);

        self.started_at = now;
        self.window.clear();
        self.direction = Direction::Hold;
        self.direction_changed_at = None;
        self.min_level_reachable = None;
        self.max_level_reachable = None;
        self.up_attempts_used = 0;
        self.last_applied = None;
        self.last_smoothed = None;
        self.lifecycle = Lifecycle::Active;

        info!(
            instance = self.id,
            target_fps = self.target_frame_rate,
            capability = ?self.display.capability(),
            "Quality controller activated at level {} (persisted {}, platform {})",
            applied,
            restored,
            initial_level
        );

        if applied != initial_level {
            self.events.emit(QualityChange::new(initial_level, applied));
        }

        Ok(())
    }

    /// Persist the current level and give up the registry slot.
    ///
    /// No-op unless the controller is active. The slot is released even when
    /// flushing the store fails; the flush error is returned.
    pub fn deactivate(&mut self) -> Result<(), StoreError> {
        if self.lifecycle != Lifecycle::Active {
            return Ok(());
        }

        let level = self.levels.current_level();
        self.store.set_persisted_level(level);
        let flushed = self.store.flush();

        self.up_attempts_used = 0;
        self.lifecycle = Lifecycle::Idle;
        self.registry.release(self.id);

        match &flushed {
            Ok(()) => info!(instance = self.id, "Quality controller deactivated at level {}", level),
            Err(e) => warn!(instance = self.id, "Failed to persist quality level {}: {}", level, e),
        }

        flushed
    }

    /// Feed one frame's duration in seconds.
    pub fn tick(&mut self, frame_duration_secs: f64) -> TickOutcome {
        self.tick_at(frame_duration_secs, Instant::now())
    }

    /// Tick with explicit timestamp (for testing).
    pub fn tick_at(&mut self, frame_duration_secs: f64, now: Instant) -> TickOutcome {
        if self.lifecycle != Lifecycle::Active {
            return TickOutcome::Inactive;
        }

        if now.saturating_duration_since(self.started_at) < self.startup_time {
            return TickOutcome::WarmingUp;
        }

        let smoothed_rate = match self.window.record_frame(frame_duration_secs) {
            Some(rate) => rate,
            None => {
                trace!(frame_duration_secs, "Skipping degenerate frame sample");
                return TickOutcome::SkippedSample;
            }
        };
        self.last_smoothed = Some(smoothed_rate);

        let desired = self.desired_direction(smoothed_rate);

        if desired != self.direction {
            trace!(from = %self.direction, to = %desired, smoothed_rate, "Direction changed");
            self.direction = desired;
            self.direction_changed_at = Some(now);
        }

        if self.direction == Direction::Hold {
            // Settling in the band ends any run of increases
            self.last_applied = None;
            return TickOutcome::Holding { smoothed_rate };
        }

        let stable = match self.direction_changed_at {
            Some(since) => now.saturating_duration_since(since) >= self.stability_delay,
            None => false,
        };
        if !stable {
            return TickOutcome::Waiting {
                direction: self.direction,
                smoothed_rate,
            };
        }

        match self.direction {
            Direction::Down => self.try_decrease(smoothed_rate),
            Direction::Up => self.try_increase(smoothed_rate),
            Direction::Hold => TickOutcome::Holding { smoothed_rate },
        }
    }

    fn desired_direction(&self, smoothed_rate: f64) -> Direction {
        if smoothed_rate < self.low_bound() {
            Direction::Down
        } else if smoothed_rate > self.high_bound() {
            Direction::Up
        } else {
            Direction::Hold
        }
    }

    /// Rates below this ask for a lower level.
    pub fn low_bound(&self) -> f64 {
        self.target_frame_rate - self.config.down_threshold
    }

    /// Rates above this ask for a higher level.
    pub fn high_bound(&self) -> f64 {
        self.target_frame_rate - self.config.up_threshold
    }

    /// Reset direction state after an attempt so the next tick starts clean.
    fn mark_attempt(&mut self) {
        self.direction = Direction::Hold;
        self.direction_changed_at = None;
    }

    fn try_decrease(&mut self, smoothed_rate: f64) -> TickOutcome {
        let current = self.levels.current_level();
        if matches!(self.min_level_reachable, Some(floor) if current <= floor) {
            return TickOutcome::AtFloor;
        }

        self.mark_attempt();
        let new_level = self.levels.request_level_change(Step::Down);

        if new_level == current {
            self.min_level_reachable = Some(current);
            debug!(instance = self.id, "Lowest reachable quality level is {}", current);
            return TickOutcome::FloorDiscovered(current);
        }

        self.last_applied = Some(Step::Down);
        self.realize_change(current, new_level, smoothed_rate)
    }

    fn try_increase(&mut self, smoothed_rate: f64) -> TickOutcome {
        let current = self.levels.current_level();
        if matches!(self.max_level_reachable, Some(ceiling) if current >= ceiling) {
            return TickOutcome::AtCeiling;
        }
        if self.up_attempts_used >= self.config.max_up_attempts {
            return TickOutcome::UpBudgetExhausted;
        }

        self.mark_attempt();
        let new_level = self.levels.request_level_change(Step::Up);

        if new_level == current {
            self.max_level_reachable = Some(current);
            debug!(instance = self.id, "Highest reachable quality level is {}", current);
            return TickOutcome::CeilingDiscovered(current);
        }

        // A run of consecutive increases spends one attempt
        if self.last_applied != Some(Step::Up) {
            self.up_attempts_used += 1;
        }
        self.last_applied = Some(Step::Up);
        self.realize_change(current, new_level, smoothed_rate)
    }

    fn realize_change(&mut self, previous: i32, new_level: i32, smoothed_rate: f64) -> TickOutcome {
        let change = QualityChange::new(previous, new_level);
        info!(
            instance = self.id,
            smoothed_fps = smoothed_rate,
            target_fps = self.target_frame_rate,
            up_attempts = self.up_attempts_used,
            "Quality level changed {} -> {}",
            previous,
            new_level
        );
        self.events.emit(change);
        TickOutcome::Changed(change)
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_inert(&self) -> bool {
        self.lifecycle == Lifecycle::Inert
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    pub fn target_frame_rate(&self) -> f64 {
        self.target_frame_rate
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn min_level_reachable(&self) -> Option<i32> {
        self.min_level_reachable
    }

    pub fn max_level_reachable(&self) -> Option<i32> {
        self.max_level_reachable
    }

    pub fn up_attempts_used(&self) -> u32 {
        self.up_attempts_used
    }

    pub fn window(&self) -> &FrameRateWindow {
        &self.window
    }

    /// Time left in the warm-up window, zero once it has passed.
    pub fn warm_up_remaining(&self, now: Instant) -> Duration {
        self.startup_time
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }

    pub fn levels(&self) -> &L {
        &self.levels
    }

    pub fn levels_mut(&mut self) -> &mut L {
        &mut self.levels
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            instance: self.id,
            active: self.is_active(),
            current_level: self.levels.current_level(),
            target_frame_rate: self.target_frame_rate,
            smoothed_rate: self.last_smoothed,
            direction: self.direction,
            min_level_reachable: self.min_level_reachable,
            max_level_reachable: self.max_level_reachable,
            up_attempts_used: self.up_attempts_used,
        }
    }
}

impl<L: QualityLevels> Drop for AdaptiveQualityController<L> {
    fn drop(&mut self) {
        if let Err(e) = self.deactivate() {
            warn!(instance = self.id, "Deactivation on drop failed: {}", e);
        }
    }
}
