//! Two-wire bus controller
//!
//! Two layers cooperate here:
//!
//! - The [`engine`] runs in interrupt context. It reacts to each status code
//!   the peripheral reports and issues the next bus phase, one byte at a
//!   time, chaining a second transfer with a repeated START when asked.
//! - The [`session`] manager runs as an active object. It accepts one or two
//!   chained requests at a time, hands them to the engine, and returns each
//!   request to its owner when the engine reports it done.
//!
//! ```text
//! client ──TwiRequest──▶ SessionManager ──begin()──▶ TwiBus (engine)
//!   ▲                        │   ▲                      │
//!   └──────TwiReplyN─────────┘   └──SlotDone/Finished───┘
//! ```

pub mod engine;
pub mod request;
pub mod session;
pub mod status;

pub use engine::{BusSnapshot, ProtocolState, SlotSnapshot, TwiBus};
pub use request::{DeviceAddress, Direction, ReplySignal, ReplyTo, RequestError, TransferRequest};
pub use session::{ManagerState, Session, SessionManager, Slot};
pub use status::{StatusClass, StatusEntry, TransferStatus, STATUS_TABLE};
