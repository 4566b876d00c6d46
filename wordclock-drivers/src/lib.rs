//! Driver implementations
//!
//! Concrete implementations of the `wordclock-hal` traits, plus a model
//! of the RTC chip:
//!
//! - DS1307 register map and register-file model
//! - `SimTwi`: status-code bus peripheral emulation with a DS1307 attached
//! - `BitBangTwi`: software bus master over `embedded-hal` pins

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod bus;
pub mod rtc;

pub use bus::{BitBangTwi, SimTwi};
pub use rtc::Ds1307;
