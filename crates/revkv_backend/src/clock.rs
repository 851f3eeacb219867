//! Time source abstraction.
//!
//! Adapters never read the OS clock directly; they take an
//! `Arc<dyn Clock>` at construction so tests can drive expiry
//! deterministically with [`ManualClock`].

use parking_lot::RwLock;
use std::time::{Duration, SystemTime};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// The production clock, backed by the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// Time starts at the instant of construction and advances exclusively
/// through [`ManualClock::advance`] and [`ManualClock::set`], which makes
/// expiry behavior fully deterministic in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<SystemTime>,
}

impl ManualClock {
    /// Creates a manual clock starting at the current OS time.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(SystemTime::now())
    }

    /// Creates a manual clock starting at a fixed time.
    #[must_use]
    pub fn starting_at(at: SystemTime) -> Self {
        Self {
            now: RwLock::new(at),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, to: SystemTime) {
        *self.now.write() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn manual_clock_does_not_drift() {
        let clock = ManualClock::starting_at(UNIX_EPOCH);
        assert_eq!(clock.now(), UNIX_EPOCH);
        assert_eq!(clock.now(), UNIX_EPOCH);
    }

    #[test]
    fn advance_moves_time_forward() {
        let clock = ManualClock::starting_at(UNIX_EPOCH);
        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now(), UNIX_EPOCH + Duration::from_secs(30));
    }

    #[test]
    fn set_jumps_to_absolute_time() {
        let clock = ManualClock::new();
        let target = UNIX_EPOCH + Duration::from_secs(7);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
