//! System watchdog hook

/// Hardware watchdog
///
/// The clock controller feeds it on every watchdog event, so a stalled
/// event loop ends in a hardware reset.
pub trait Watchdog {
    /// Restart the watchdog countdown
    fn feed(&mut self);
}

/// Watchdog that does nothing, for boards without one and for tests
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    fn feed(&mut self) {}
}
