//! Wordclock Hardware Abstraction Layer
//!
//! This crate defines the hardware traits the clock logic is written
//! against. Chip or board crates implement them; the core crate never
//! touches registers directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  wordclock-core (engine, clock, events) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  wordclock-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  SimTwi (host │       │ BitBangTwi /  │
//! │    tests)     │       │ board ports   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`twi::TwiPort`] - Interrupt-driven two-wire bus peripheral
//! - [`watchdog::Watchdog`] - System watchdog hook

#![no_std]
#![deny(unsafe_code)]

pub mod twi;
pub mod watchdog;

// Re-export key traits at crate root for convenience
pub use twi::{Control, TwiConfig, TwiPort, STATUS_MASK};
pub use watchdog::{NoWatchdog, Watchdog};
