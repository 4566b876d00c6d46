//! Two-wire bus ports

pub mod bitbang;
pub mod sim;

pub use bitbang::BitBangTwi;
pub use sim::SimTwi;
