//! Metrics collection for quality changes.
//!
//! Tracks change counts and timing. Hosts register the collector as an
//! ordinary quality change subscriber.

use crate::events::QualityChange;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

const HOUR: Duration = Duration::from_secs(3600);
const MAX_INTERVALS: usize = 100;
const NO_LEVEL: i64 = i64::MIN;

/// Metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total number of quality changes since the collector was created
    pub total_changes: u64,
    /// Changes in the last hour
    pub changes_per_hour: u64,
    /// Average time between consecutive changes (seconds)
    pub avg_secs_between_changes: f64,
    pub uptime_sec: u64,
    pub decrease_count: u64,
    pub increase_count: u64,
    /// Level after the most recent change
    pub last_level: Option<i32>,
}

/// Quality change metrics collector.
pub struct QualityMetrics {
    start_time: Instant,
    total_changes: AtomicU64,
    decrease_count: AtomicU64,
    increase_count: AtomicU64,
    last_level: AtomicI64,
    /// Recent changes with timestamps for per-hour calculation
    recent_changes: RwLock<Vec<Instant>>,
    intervals: RwLock<Vec<Duration>>,
    last_change: RwLock<Option<Instant>>,
}

impl QualityMetrics {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start_time: Instant) -> Self {
        Self {
            start_time,
            total_changes: AtomicU64::new(0),
            decrease_count: AtomicU64::new(0),
            increase_count: AtomicU64::new(0),
            last_level: AtomicI64::new(NO_LEVEL),
            recent_changes: RwLock::new(Vec::new()),
            intervals: RwLock::new(Vec::new()),
            last_change: RwLock::new(None),
        }
    }

    /// Record a quality change
    pub fn record_change(&self, change: &QualityChange) {
        self.record_change_at(change, Instant::now());
    }

    pub fn record_change_at(&self, change: &QualityChange, now: Instant) {
        self.total_changes.fetch_add(1, Ordering::SeqCst);

        if change.is_decrease() {
            self.decrease_count.fetch_add(1, Ordering::SeqCst);
        } else if change.is_increase() {
            self.increase_count.fetch_add(1, Ordering::SeqCst);
        }
        self.last_level
            .store(change.new_level as i64, Ordering::SeqCst);

        if let Ok(mut changes) = self.recent_changes.write() {
            changes.push(now);
            changes.retain(|t| now.saturating_duration_since(*t) < HOUR);
        }

        if let Ok(mut last_change) = self.last_change.write() {
            if let Some(last) = *last_change {
                if let Ok(mut intervals) = self.intervals.write() {
                    intervals.push(now.saturating_duration_since(last));
                    if intervals.len() > MAX_INTERVALS {
                        intervals.remove(0);
                    }
                }
            }
            *last_change = Some(now);
        }
    }

    /// Get current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> MetricsSnapshot {
        let changes_per_hour = self
            .recent_changes
            .read()
            .map(|changes| {
                changes
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < HOUR)
                    .count() as u64
            })
            .unwrap_or(0);

        let avg_secs_between_changes = self
            .intervals
            .read()
            .map(|intervals| {
                if intervals.is_empty() {
                    0.0
                } else {
                    let total: Duration = intervals.iter().sum();
                    total.as_secs_f64() / intervals.len() as f64
                }
            })
            .unwrap_or(0.0);

        let last_level = match self.last_level.load(Ordering::SeqCst) {
            NO_LEVEL => None,
            level => Some(level as i32),
        };

        MetricsSnapshot {
            total_changes: self.total_changes.load(Ordering::SeqCst),
            changes_per_hour,
            avg_secs_between_changes,
            uptime_sec: now.saturating_duration_since(self.start_time).as_secs(),
            decrease_count: self.decrease_count.load(Ordering::SeqCst),
            increase_count: self.increase_count.load(Ordering::SeqCst),
            last_level,
        }
    }
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self::new()
    }
}
