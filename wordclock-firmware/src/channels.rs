//! Queues, flags and signals shared between tasks
//!
//! The active objects' event queues live here as statics so the tick,
//! square-wave and console tasks can post into them. Every post wakes the
//! dispatcher.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_sync::signal::Signal;

use wordclock_core::clock::PeriodicGate;
use wordclock_core::config::{BUS_QUEUE_DEPTH, CLOCK_QUEUE_DEPTH, COMMANDER_QUEUE_DEPTH};
use wordclock_core::event::{Event, EventQueue, Mailbox};
use wordclock_core::trace::TraceFlag;

/// Console output buffer size
pub const CONSOLE_BUF_SIZE: usize = 512;

/// Session manager queue
pub static BUS_QUEUE: EventQueue<BUS_QUEUE_DEPTH> = EventQueue::new("<twi>");

/// Clock controller queue
pub static CLOCK_QUEUE: EventQueue<CLOCK_QUEUE_DEPTH> = EventQueue::new("<wordclock>");

/// Command interpreter queue
pub static COMMANDER_QUEUE: EventQueue<COMMANDER_QUEUE_DEPTH> = EventQueue::new("<commander>");

/// 1 Hz delivery gate, opened by the clock controller once running
pub static GATE: PeriodicGate = PeriodicGate::new();

/// Transfer tracing on the console, toggled by TRON/TROFF
pub static TRACE: TraceFlag = TraceFlag::new(false);

/// Wakes the dispatcher when something was posted
pub static WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Bytes waiting for the console UART
pub static CONSOLE_OUT: Pipe<CriticalSectionRawMutex, CONSOLE_BUF_SIZE> = Pipe::new();

/// Post an event from a task and wake the dispatcher
///
/// A full queue is fatal.
pub fn post(queue: &dyn Mailbox, event: Event) {
    if let Err(fault) = queue.post(event) {
        crate::fatal(fault);
    }
    WAKE.signal(());
}
