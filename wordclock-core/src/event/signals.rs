//! Events exchanged between active objects

use crate::twi::{Session, Slot, TransferRequest};

/// Events that drive the state machines
#[derive(Debug)]
pub enum Event {
    // Board events
    /// Periodic liveness check, fed through to the hardware watchdog
    Watchdog,
    /// Fast tick, twenty per second
    Tick20th,
    /// One-second tick from the RTC square wave
    Tick1s,
    /// A byte received on the console
    Char(u8),

    // Operator requests
    /// Set the RTC to three BCD bytes: seconds, minutes, hours with flags
    SetTime([u8; 3]),
    /// Read the clock on the next tick and report the result
    GetTime,

    // Clock controller
    /// The reply timer expired before the RTC answered
    ReplyTimeout,

    // Bus controller
    /// Submission of one or two chained transfers
    TwiRequest(Session),
    /// The protocol engine finished a slot (posted from interrupt context)
    TwiSlotDone(Slot),
    /// The protocol engine released the bus (posted from interrupt context)
    TwiSessionFinished,

    // Completion notifications, named by the request owner
    /// Completed request, general reply signal
    TwiReply(TransferRequest),
    /// Completed request, first reply signal
    TwiReply1(TransferRequest),
    /// Completed request, second reply signal
    TwiReply2(TransferRequest),
}

impl Event {
    /// Check if this event returns a request to its owner
    pub fn is_reply(&self) -> bool {
        matches!(
            self,
            Event::TwiReply(_) | Event::TwiReply1(_) | Event::TwiReply2(_)
        )
    }

    /// Check if this event comes from the bus interrupt
    pub fn is_bus_notification(&self) -> bool {
        matches!(self, Event::TwiSlotDone(_) | Event::TwiSessionFinished)
    }

    /// Take the request out of a reply event
    pub fn into_reply(self) -> Result<TransferRequest, Event> {
        match self {
            Event::TwiReply(request) | Event::TwiReply1(request) | Event::TwiReply2(request) => {
                Ok(request)
            }
            other => Err(other),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::Watchdog => "WATCHDOG",
            Event::Tick20th => "TICK_20TH",
            Event::Tick1s => "TICK_1S",
            Event::Char(_) => "CHAR",
            Event::SetTime(_) => "SET_TIME",
            Event::GetTime => "GET_TIME",
            Event::ReplyTimeout => "REPLY_TIMEOUT",
            Event::TwiRequest(_) => "TWI_REQUEST",
            Event::TwiSlotDone(_) => "TWI_SLOT_DONE",
            Event::TwiSessionFinished => "TWI_FINISHED",
            Event::TwiReply(_) => "TWI_REPLY",
            Event::TwiReply1(_) => "TWI_REPLY_1",
            Event::TwiReply2(_) => "TWI_REPLY_2",
        }
    }
}
