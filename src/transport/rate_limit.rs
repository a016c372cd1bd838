//! Inbound line rate limiting
//!
//! Sensors free-run at whatever rate their firmware produces; downstream
//! consumers rarely want more than ~100 samples per second. The limiter
//! admits a line only when at least one full gap has elapsed since the last
//! admitted line, and counts what it drops.

use std::time::{Duration, Instant};

pub const DEFAULT_MAX_LINES_PER_SECOND: u32 = 100;

/// Min-gap admission filter applied before parsing.
///
/// A limit of 0 disables limiting entirely.
pub struct RateLimiter {
    min_gap: Duration,
    last_admitted: Option<Instant>,
    dropped: u64,
}

impl RateLimiter {
    pub fn new(max_lines_per_second: u32) -> Self {
        Self {
            min_gap: Self::gap_for(max_lines_per_second),
            last_admitted: None,
            dropped: 0,
        }
    }

    fn gap_for(max_lines_per_second: u32) -> Duration {
        if max_lines_per_second == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / max_lines_per_second
        }
    }

    pub fn set_limit(&mut self, max_lines_per_second: u32) {
        self.min_gap = Self::gap_for(max_lines_per_second);
    }

    /// Whether a line arriving now should be processed.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Admission decision against an explicit clock reading.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        if self.min_gap.is_zero() {
            self.last_admitted = Some(now);
            return true;
        }
        match self.last_admitted {
            Some(prev) if now.duration_since(prev) < self.min_gap => {
                self.dropped += 1;
                false
            }
            _ => {
                self.last_admitted = Some(now);
                true
            }
        }
    }

    /// Lines rejected since construction or the last [`reset`](Self::reset).
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Forget admission history and the dropped counter. Called on reconnect.
    pub fn reset(&mut self) {
        self.last_admitted = None;
        self.dropped = 0;
    }

    /// Zero the dropped counter without touching admission history.
    pub fn reset_dropped(&mut self) {
        self.dropped = 0;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES_PER_SECOND)
    }
}
