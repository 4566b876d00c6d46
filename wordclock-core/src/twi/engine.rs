//! Byte-level protocol engine
//!
//! Runs in interrupt context. Each call to [`TwiBus::on_interrupt`] reads the
//! peripheral's status code, checks it against the current
//! [`ProtocolState`], and issues exactly one follow-up command. All state
//! shared with the main loop sits behind a critical-section mutex.

use core::cell::RefCell;

use critical_section::Mutex;
use wordclock_hal::{Control, TwiPort, STATUS_MASK};

use super::request::{DeviceAddress, Direction, TransferRequest};
use super::session::{Session, Slot};
use super::status::{code, TransferStatus};
use crate::event::{Event, InterruptSource, Mailbox};
use crate::fault::Fault;

/// What the engine expects on the next interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolState {
    /// Bus released
    Idle,
    /// START or repeated START issued
    StartSent,
    /// SLA+W on the bus
    TransmitAddressSent,
    /// Data byte on the bus
    TransmitDataSent,
    /// SLA+R on the bus
    ReceiveAddressSent,
    /// Waiting for a data byte from the device
    ReceiveDataReceived,
}

/// Progress of one slot, copied out for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub address: DeviceAddress,
    pub direction: Direction,
    pub requested: usize,
    pub count: usize,
    pub status: TransferStatus,
}

impl SlotSnapshot {
    fn of(request: &TransferRequest) -> Self {
        Self {
            address: request.address(),
            direction: request.direction(),
            requested: request.requested(),
            count: request.count(),
            status: request.status(),
        }
    }
}

/// Engine state, copied out in one critical section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusSnapshot {
    pub mode: ProtocolState,
    pub busy: bool,
    pub active: Slot,
    pub slots: [Option<SlotSnapshot>; 2],
    pub interrupts: u32,
}

enum Step {
    Continue,
    Complete(TransferStatus),
}

struct BusState<P> {
    port: P,
    mode: ProtocolState,
    slots: [Option<TransferRequest>; 2],
    active: Slot,
    busy: bool,
    interrupts: u32,
}

/// Receive command for the next byte, or `None` when nothing is left
fn receive_command(remaining: usize) -> Option<Control> {
    match remaining {
        0 => None,
        1 => Some(Control::ReceiveNack),
        _ => Some(Control::ReceiveAck),
    }
}

/// Load the next byte to send, or complete once every byte was acknowledged
fn transmit_next<P: TwiPort>(
    port: &mut P,
    mode: &mut ProtocolState,
    request: &TransferRequest,
) -> Step {
    match request.next_outgoing() {
        Some(byte) => {
            port.write_data(byte);
            *mode = ProtocolState::TransmitDataSent;
            port.control(Control::Transmit);
            Step::Continue
        }
        None => Step::Complete(TransferStatus::Ok),
    }
}

impl<P: TwiPort> BusState<P> {
    fn step(&mut self, manager: &dyn Mailbox) -> Result<(), Fault> {
        self.interrupts = self.interrupts.wrapping_add(1);
        let status = self.port.status() & STATUS_MASK;
        let active = self.active;

        let Some(request) = self.slots[active.index()].as_mut() else {
            warn!("bus interrupt without a transfer, status {=u8:#x}", status);
            self.port.control(Control::Disable);
            self.mode = ProtocolState::Idle;
            return Ok(());
        };

        let step = match (self.mode, status) {
            (
                ProtocolState::Idle | ProtocolState::StartSent,
                code::START | code::REPEATED_START,
            ) => {
                let direction = request.direction();
                self.port.write_data(request.address().sla(direction));
                self.mode = match direction {
                    Direction::Write => ProtocolState::TransmitAddressSent,
                    Direction::Read => ProtocolState::ReceiveAddressSent,
                };
                self.port.control(Control::Transmit);
                Step::Continue
            }
            (ProtocolState::TransmitAddressSent, code::MT_SLA_ACK) => {
                transmit_next(&mut self.port, &mut self.mode, request)
            }
            (ProtocolState::TransmitDataSent, code::MT_DATA_ACK) => {
                request.ack_outgoing();
                transmit_next(&mut self.port, &mut self.mode, request)
            }
            (ProtocolState::ReceiveAddressSent, code::MR_SLA_ACK) => {
                match receive_command(request.remaining()) {
                    Some(command) => {
                        self.mode = ProtocolState::ReceiveDataReceived;
                        self.port.control(command);
                        Step::Continue
                    }
                    None => Step::Complete(TransferStatus::Ok),
                }
            }
            (ProtocolState::ReceiveDataReceived, code::MR_DATA_ACK) => {
                request.store_incoming(self.port.read_data());
                match receive_command(request.remaining()) {
                    Some(command) => {
                        self.port.control(command);
                        Step::Continue
                    }
                    None => Step::Complete(TransferStatus::Ok),
                }
            }
            (ProtocolState::ReceiveDataReceived, code::MR_DATA_NACK) => {
                request.store_incoming(self.port.read_data());
                Step::Complete(TransferStatus::Ok)
            }
            (mode, other) => {
                debug!("unexpected status {=u8:#x} in {}", other, mode);
                Step::Complete(TransferStatus::Protocol(other))
            }
        };

        let Step::Complete(status) = step else {
            return Ok(());
        };
        request.finish(status);

        let chain = status.is_ok() && active == Slot::First && self.slots[1].is_some();
        if chain {
            // Slot 0 is reported before slot 1 starts
            manager.post(Event::TwiSlotDone(active))?;
            self.active = Slot::Second;
            self.mode = ProtocolState::StartSent;
            self.port.control(Control::Start);
        } else {
            self.port.control(Control::Stop);
            self.mode = ProtocolState::Idle;
            manager.post(Event::TwiSlotDone(active))?;
            manager.post(Event::TwiSessionFinished)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> BusSnapshot {
        BusSnapshot {
            mode: self.mode,
            busy: self.busy,
            active: self.active,
            slots: [
                self.slots[0].as_ref().map(SlotSnapshot::of),
                self.slots[1].as_ref().map(SlotSnapshot::of),
            ],
            interrupts: self.interrupts,
        }
    }
}

/// Interrupt-driven bus master over a [`TwiPort`]
///
/// Shared between the bus interrupt and the session manager. The manager
/// hands a session over with [`TwiBus::begin`] and takes the finished
/// requests back when the engine posts its notifications.
pub struct TwiBus<P> {
    state: Mutex<RefCell<BusState<P>>>,
    manager: &'static dyn Mailbox,
}

impl<P: TwiPort> TwiBus<P> {
    /// Create an idle bus that reports to `manager`
    pub const fn new(port: P, manager: &'static dyn Mailbox) -> Self {
        Self {
            state: Mutex::new(RefCell::new(BusState {
                port,
                mode: ProtocolState::Idle,
                slots: [None, None],
                active: Slot::First,
                busy: false,
                interrupts: 0,
            })),
            manager,
        }
    }

    /// Take ownership of a session and issue the first START
    ///
    /// Hands the session back untouched if one is already in flight. The
    /// check and the hand-over happen in one critical section.
    pub fn begin(&self, session: Session) -> Result<(), Session> {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if state.busy {
                return Err(session);
            }
            let (first, second) = session.into_slots();
            state.slots = [Some(first), second];
            state.active = Slot::First;
            state.busy = true;
            state.mode = ProtocolState::StartSent;
            state.port.control(Control::Start);
            Ok(())
        })
    }

    /// Handle one bus interrupt
    ///
    /// Call from the peripheral's interrupt handler. Returns a fault only if
    /// a notification could not be posted.
    pub fn on_interrupt(&self) -> Result<(), Fault> {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).step(self.manager))
    }

    /// Check if the peripheral is waiting for the engine
    pub fn interrupt_pending(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).port.interrupt_flag())
    }

    /// Remove a finished request from its slot
    pub fn take_slot(&self, slot: Slot) -> Option<TransferRequest> {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).slots[slot.index()].take())
    }

    /// Release the bus, returning whatever is still in the slots
    pub fn end_session(&self) -> [Option<TransferRequest>; 2] {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.busy = false;
            state.active = Slot::First;
            [state.slots[0].take(), state.slots[1].take()]
        })
    }

    /// Current protocol mode
    pub fn mode(&self) -> ProtocolState {
        critical_section::with(|cs| self.state.borrow_ref(cs).mode)
    }

    /// Check if a session is in flight
    pub fn is_busy(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).busy)
    }

    /// Copy of the engine state
    pub fn snapshot(&self) -> BusSnapshot {
        critical_section::with(|cs| self.state.borrow_ref(cs).snapshot())
    }

    /// Run a closure against the port
    ///
    /// Used by boards to reconfigure the peripheral and by tests to inspect
    /// simulated devices.
    pub fn with_port<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs).port))
    }
}

impl<P: TwiPort> InterruptSource for TwiBus<P> {
    fn service_pending(&self) -> Result<bool, Fault> {
        if self.interrupt_pending() {
            self.on_interrupt()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
