//! Session manager
//!
//! Serialises access to the bus: one session of one or two chained
//! transfers at a time. Anything submitted while a session is in flight is
//! returned to its owner at once with [`TransferStatus::QueueFull`].

use super::engine::TwiBus;
use super::request::TransferRequest;
use super::status::TransferStatus;
use crate::event::{ActiveObject, Event, Mailbox};
use crate::fault::Fault;
use wordclock_hal::TwiPort;

/// Position of a request within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slot {
    First,
    Second,
}

impl Slot {
    pub const fn index(&self) -> usize {
        match self {
            Slot::First => 0,
            Slot::Second => 1,
        }
    }
}

/// One transfer, or two chained with a repeated START
#[derive(Debug)]
pub struct Session {
    first: TransferRequest,
    second: Option<TransferRequest>,
}

impl Session {
    pub fn single(request: TransferRequest) -> Self {
        Self {
            first: request,
            second: None,
        }
    }

    /// `second` starts only after `first` completes successfully
    pub fn chained(first: TransferRequest, second: TransferRequest) -> Self {
        Self {
            first,
            second: Some(second),
        }
    }

    /// Number of requests in the session
    pub fn len(&self) -> usize {
        1 + usize::from(self.second.is_some())
    }

    pub fn into_slots(self) -> (TransferRequest, Option<TransferRequest>) {
        (self.first, self.second)
    }

    /// Clear progress on every request before it goes on the bus
    ///
    /// A request that still records a partial transfer was never reset by
    /// its owner; that is a fault.
    fn prepare(&mut self) -> Result<(), Fault> {
        for request in core::iter::once(&mut self.first).chain(self.second.as_mut()) {
            if request.is_partial() {
                return Err(Fault::StaleRequest);
            }
            request.reset();
        }
        Ok(())
    }

    /// Return every request to its owner with `status`
    fn reject(self, status: TransferStatus) -> Result<(), Fault> {
        let (first, second) = self.into_slots();
        for mut request in core::iter::once(first).chain(second) {
            request.finish(status);
            request.reply()?;
        }
        Ok(())
    }
}

/// Session manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ManagerState {
    Idle,
    Busy,
}

/// Active object in front of the protocol engine
pub struct SessionManager<'a, P> {
    bus: &'a TwiBus<P>,
    inbox: &'static dyn Mailbox,
    state: ManagerState,
}

impl<'a, P: TwiPort> SessionManager<'a, P> {
    /// `inbox` must be the mailbox the bus reports to
    pub fn new(bus: &'a TwiBus<P>, inbox: &'static dyn Mailbox) -> Self {
        Self {
            bus,
            inbox,
            state: ManagerState::Idle,
        }
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Accept a session, or reject it if one is in flight
    pub fn submit(&mut self, mut session: Session) -> Result<(), Fault> {
        if self.state == ManagerState::Busy {
            debug!("bus busy, rejecting {} request(s)", session.len());
            return session.reject(TransferStatus::QueueFull);
        }
        session.prepare()?;
        match self.bus.begin(session) {
            Ok(()) => {
                self.state = ManagerState::Busy;
                Ok(())
            }
            Err(session) => {
                warn!("engine still holds a session");
                session.reject(TransferStatus::QueueFull)
            }
        }
    }

    fn slot_done(&mut self, slot: Slot) -> Result<(), Fault> {
        match self.bus.take_slot(slot) {
            Some(request) => {
                trace!("slot {} done: {}", slot.index(), request.status());
                request.reply()
            }
            None => {
                warn!("completion for empty slot {}", slot.index());
                Ok(())
            }
        }
    }

    fn session_finished(&mut self) -> Result<(), Fault> {
        for mut request in self.bus.end_session().into_iter().flatten() {
            // Chained behind a failed transfer, never started
            if request.status() == TransferStatus::Pending {
                request.finish(TransferStatus::Skipped);
            }
            request.reply()?;
        }
        self.state = ManagerState::Idle;
        Ok(())
    }
}

impl<P: TwiPort> ActiveObject for SessionManager<'_, P> {
    fn name(&self) -> &'static str {
        "<twi>"
    }

    fn inbox(&self) -> &'static dyn Mailbox {
        self.inbox
    }

    fn dispatch(&mut self, event: Event) -> Result<(), Fault> {
        match event {
            Event::TwiRequest(session) => self.submit(session),
            Event::TwiSlotDone(slot) => self.slot_done(slot),
            Event::TwiSessionFinished => self.session_finished(),
            other => {
                debug!("<twi> ignoring {}", other.name());
                Ok(())
            }
        }
    }
}
