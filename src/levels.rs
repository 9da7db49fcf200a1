//! Quality level control.
//!
//! [`QualityLevels`] is the seam between the controller and whatever owns the
//! rendering settings. [`QualityLadder`] is an in-memory implementation over an
//! ordered list of named levels.

use std::fmt;

/// One-step change direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Down,
    Up,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Down => write!(f, "down"),
            Step::Up => write!(f, "up"),
        }
    }
}

/// Discrete quality level control.
///
/// Changes are synchronous. A change that cannot be made is reported by
/// returning the unchanged level.
pub trait QualityLevels {
    fn current_level(&self) -> i32;

    /// Move one step and return the resulting level.
    fn request_level_change(&mut self, step: Step) -> i32;

    /// Apply `level` (clamped to what the platform supports) and return the
    /// resulting level.
    fn apply_level(&mut self, level: i32) -> i32;
}

/// Ordered, named quality levels; index 0 is the cheapest.
#[derive(Debug, Clone)]
pub struct QualityLadder {
    names: Vec<String>,
    current: usize,
}

impl QualityLadder {
    /// Create a ladder positioned at `initial` (clamped into range).
    ///
    /// Returns `None` when `names` is empty.
    pub fn new(names: Vec<String>, initial: i32) -> Option<Self> {
        if names.is_empty() {
            return None;
        }
        let current = Self::clamp_index(initial, names.len());
        Some(Self { names, current })
    }

    fn clamp_index(level: i32, len: usize) -> usize {
        level.clamp(0, len as i32 - 1) as usize
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn highest_level(&self) -> i32 {
        self.names.len() as i32 - 1
    }

    /// Name of the current level.
    pub fn current_name(&self) -> &str {
        &self.names[self.current]
    }

    pub fn name_of(&self, level: i32) -> Option<&str> {
        usize::try_from(level)
            .ok()
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }
}

impl QualityLevels for QualityLadder {
    fn current_level(&self) -> i32 {
        self.current as i32
    }

    fn request_level_change(&mut self, step: Step) -> i32 {
        match step {
            Step::Down => self.current = self.current.saturating_sub(1),
            Step::Up => {
                if self.current + 1 < self.names.len() {
                    self.current += 1;
                }
            }
        }
        self.current as i32
    }

    fn apply_level(&mut self, level: i32) -> i32 {
        self.current = Self::clamp_index(level, self.names.len());
        self.current as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ladder(initial: i32) -> QualityLadder {
        let names = ["Low", "Medium", "High"].iter().map(|s| s.to_string()).collect();
        QualityLadder::new(names, initial).unwrap()
    }

    #[test]
    fn test_empty_ladder_rejected() {
        assert!(QualityLadder::new(Vec::new(), 0).is_none());
    }

    #[test]
    fn test_steps_clamp_at_both_ends() {
        let mut ladder = ladder(0);
        assert_eq!(ladder.request_level_change(Step::Down), 0);
        assert_eq!(ladder.request_level_change(Step::Up), 1);
        assert_eq!(ladder.request_level_change(Step::Up), 2);
        assert_eq!(ladder.request_level_change(Step::Up), 2);
        assert_eq!(ladder.current_name(), "High");
    }

    #[test]
    fn test_apply_level_clamps() {
        let mut ladder = ladder(1);
        assert_eq!(ladder.apply_level(7), 2);
        assert_eq!(ladder.apply_level(-3), 0);
        assert_eq!(ladder.name_of(1), Some("Medium"));
        assert_eq!(ladder.name_of(-1), None);
        assert_eq!(ladder.highest_level(), 2);
    }

    proptest! {
        #[test]
        fn prop_level_stays_in_range(
            initial in -5i32..10i32,
            steps in prop::collection::vec(any::<bool>(), 0..50),
        ) {
            let mut ladder = ladder(initial);
            for up in steps {
                let step = if up { Step::Up } else { Step::Down };
                let before = ladder.current_level();
                let after = ladder.request_level_change(step);
                prop_assert!((0..=2).contains(&after));
                prop_assert!((after - before).abs() <= 1);
            }
        }
    }
}
