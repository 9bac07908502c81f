//! Sliding-window call rate meter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use peerbook_types::RateMeterConfig;

/// Upper bound on the slots reserved up front. Larger quotas grow on demand.
const INITIAL_CAPACITY: u32 = 64;

/// Counts calls in a sliding window and refuses the call that would exceed
/// the quota.
///
/// A refused call is not recorded, so a caller that keeps retrying does not
/// push its own window forward.
#[derive(Debug)]
pub struct CallRateMeter {
    config: RateMeterConfig,
    /// Admission instants inside the current window, oldest first.
    calls: VecDeque<Instant>,
}

impl CallRateMeter {
    #[must_use]
    pub fn new(config: RateMeterConfig) -> Self {
        Self {
            config,
            calls: VecDeque::with_capacity(config.count.min(INITIAL_CAPACITY) as usize),
        }
    }

    #[must_use]
    pub fn config(&self) -> RateMeterConfig {
        self.config
    }

    /// Admit and record a call at `now`, or return `false` if the quota for
    /// the window ending at `now` is used up.
    pub fn check_and_record(&mut self, now: Instant) -> bool {
        self.prune(now);
        if self.calls.len() >= self.config.count as usize {
            return false;
        }
        self.calls.push_back(now);
        true
    }

    /// Calls currently counted against the window ending at `now`.
    pub fn calls_in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.calls.len()
    }

    /// Time until the oldest counted call leaves the window.
    #[must_use]
    pub fn retry_after(&self, now: Instant) -> Option<Duration> {
        let oldest = *self.calls.front()?;
        Some(self.config.window().saturating_sub(now.saturating_duration_since(oldest)))
    }

    fn prune(&mut self, now: Instant) {
        let window = self.config.window();
        while let Some(&front) = self.calls.front() {
            if now.saturating_duration_since(front) >= window {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}
