//! Free-running monotonic microsecond counter.
//!
//! Every subsystem in this crate measures elapsed time against this
//! counter rather than the wall clock: GPS fix staleness, SNTP poll
//! intervals and timeouts, and the discipline engine's `boot_to_utc`
//! offset are all expressed in monotonic microseconds since process
//! start.

use std::time::Instant;

/// Collaborator contract: `monotonic_micros() -> u64`, free-running,
/// never regresses.
pub trait MonotonicClock: Send + Sync {
    fn now_micros(&self) -> u64;
}

/// `Instant`-backed implementation anchored at construction time.
pub struct SystemMonotonicClock {
    epoch: Instant,
}

impl SystemMonotonicClock {
    pub fn new() -> Self {
        SystemMonotonicClock {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemMonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemMonotonicClock {
    fn now_micros(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_regresses() {
        let clock = SystemMonotonicClock::new();
        let a = clock.now_micros();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now_micros();
        assert!(b >= a);
    }

    #[test]
    fn test_starts_near_zero() {
        let clock = SystemMonotonicClock::new();
        assert!(clock.now_micros() < 1_000_000);
    }
}
