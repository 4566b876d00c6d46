//! Clock synchronisation
//!
//! - [`bcd`]: RTC time register encoding
//! - [`drift`]: alignment of reads to 5-second marks
//! - [`gate`]: 1 Hz tick gate shared with the board
//! - [`controller`]: the clock active object

pub mod bcd;
pub mod controller;
pub mod drift;
pub mod gate;

pub use bcd::{BcdError, ClockReading, HourMode, TimeOfDay};
pub use controller::{ClockBuffers, ClockLinks, ClockState, ClockSync, SetupError};
pub use drift::{near_5s_diff, next_countdown};
pub use gate::PeriodicGate;
