//! Fatal conditions
//!
//! A fault stops the scheduler. The board logs it and restarts through
//! the watchdog; nothing in the core tries to recover from one.

use core::fmt;

/// Unrecoverable condition raised by a dispatch step or the bus interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// An event could not be posted because the named queue was full
    QueueOverflow { queue: &'static str },
    /// Drift correction outside -2..=2 (bad BCD or a decode bug upstream)
    DriftOutOfRange(i8),
    /// A request was submitted with a partial transfer still recorded
    StaleRequest,
    /// Operator asked for a restart
    ResetRequested,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::QueueOverflow { queue } => write!(f, "event queue {} overflowed", queue),
            Fault::DriftOutOfRange(diff) => write!(f, "drift correction {} out of range", diff),
            Fault::StaleRequest => f.write_str("request resubmitted without reset"),
            Fault::ResetRequested => f.write_str("reset requested"),
        }
    }
}
