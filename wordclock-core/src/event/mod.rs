//! Event delivery
//!
//! Every active object owns one queue. Interrupt handlers and other
//! objects post into it; the scheduler takes one event at a time and runs
//! the owner's handler to completion before taking the next.

pub mod active;
pub mod queue;
pub mod signals;

pub use active::{ActiveObject, InterruptSource, Scheduler};
pub use queue::{EventQueue, Mailbox};
pub use signals::Event;
