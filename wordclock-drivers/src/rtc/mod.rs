//! Real-time clock chips

pub mod ds1307;

pub use ds1307::Ds1307;
