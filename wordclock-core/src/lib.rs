//! Board-agnostic core logic for the clock firmware
//!
//! This crate contains everything that does not touch a specific chip:
//!
//! - Two-wire bus status table, protocol engine and session manager
//! - Clock synchronisation controller and BCD time handling
//! - Event queues and the run-to-completion scheduler
//! - Operator command interpreter
//! - Configuration type definitions
//!
//! Hardware is reached only through the traits in `wordclock-hal`.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod clock;
pub mod command;
pub mod config;
pub mod event;
pub mod fault;
pub mod trace;
pub mod twi;

pub use fault::Fault;
