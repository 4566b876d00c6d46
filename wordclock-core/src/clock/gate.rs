//! 1 Hz delivery gate
//!
//! The board posts `Tick1s` only while the gate is open. The clock
//! controller opens it on entering the running state, once the RTC has
//! been seeded and its square-wave output is on.

use portable_atomic::{AtomicBool, Ordering};

pub struct PeriodicGate(AtomicBool);

impl PeriodicGate {
    /// Create a closed gate
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Default for PeriodicGate {
    fn default() -> Self {
        Self::new()
    }
}
