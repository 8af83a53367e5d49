// crates/speedfog-core/src/clock.rs
// ============================================================================
// Module: SpeedFog Clock
// Description: Injectable wall-clock source for deterministic tests.
// Purpose: Keep `now()` reads explicit and swappable, the way the store and
// monitors need to be driven by a fixed clock in tests (P9 idempotence, S5).
// Dependencies: time
// ============================================================================

//! ## Overview
//! Nothing in this crate calls `OffsetDateTime::now_utc()` directly outside of
//! [`SystemClock`]. Callers thread a `&dyn Clock` through so background
//! monitors and reroll/finish timestamps can be tested without sleeping.

use std::sync::Mutex;

use time::OffsetDateTime;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> OffsetDateTime;
}

/// Real wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Fixed/advanceable clock for tests.
#[derive(Debug)]
pub struct FixedClock(Mutex<OffsetDateTime>);

impl FixedClock {
    /// Creates a clock pinned at `at`.
    #[must_use]
    pub fn new(at: OffsetDateTime) -> Self {
        Self(Mutex::new(at))
    }

    /// Advances the clock by `duration`.
    pub fn advance(&self, duration: time::Duration) {
        #[allow(clippy::unwrap_used, reason = "test-only clock, poisoning is a test bug")]
        let mut guard = self.0.lock().unwrap();
        *guard += duration;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        #[allow(clippy::unwrap_used, reason = "test-only clock, poisoning is a test bug")]
        let guard = self.0.lock().unwrap();
        *guard
    }
}
