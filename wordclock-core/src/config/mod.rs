//! Configuration types
//!
//! Compile-time defaults for the clock and its queues. Nothing here is
//! persisted; the RTC keeps the only state that survives power loss.

pub mod types;

pub use types::*;
