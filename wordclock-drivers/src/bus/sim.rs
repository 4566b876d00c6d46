//! Simulated status-code bus peripheral
//!
//! Behaves like a microcontroller TWI block with one DS1307 on the bus.
//! Every command completes at once and raises the interrupt flag, so the
//! protocol engine can be driven from a plain loop. Faults can be injected
//! to exercise the error paths.

use wordclock_core::twi::status::code;
use wordclock_hal::{Control, TwiPort};

use crate::rtc::{ds1307, Ds1307};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Writing,
    Reading,
    /// Address was not acknowledged
    Ignored,
}

/// Status-code peripheral with a simulated DS1307 attached
pub struct SimTwi {
    rtc: Ds1307,
    address: u8,
    present: bool,
    nack_after: Option<usize>,
    prescaler: u8,

    phase: Phase,
    status: u8,
    data: u8,
    flag: bool,
    written: usize,

    starts: u32,
    stops: u32,
}

impl Default for SimTwi {
    fn default() -> Self {
        Self::new(Ds1307::new())
    }
}

impl SimTwi {
    /// Bus with `rtc` at the DS1307's fixed address
    pub fn new(rtc: Ds1307) -> Self {
        Self {
            rtc,
            address: ds1307::ADDRESS,
            present: true,
            nack_after: None,
            prescaler: 0,
            phase: Phase::Idle,
            status: code::NO_INFO,
            data: 0xFF,
            flag: false,
            written: 0,
            starts: 0,
            stops: 0,
        }
    }

    /// Set the prescaler bits reported in the low bits of the status
    pub fn with_prescaler(mut self, bits: u8) -> Self {
        self.prescaler = bits & 0x03;
        self
    }

    pub fn rtc(&self) -> &Ds1307 {
        &self.rtc
    }

    pub fn rtc_mut(&mut self) -> &mut Ds1307 {
        &mut self.rtc
    }

    /// Detach the device; its address is NACKed from now on
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// NACK the data byte after `n` have been accepted in one transfer
    pub fn nack_after(&mut self, n: Option<usize>) {
        self.nack_after = n;
    }

    /// START conditions seen, repeated STARTs included
    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn stops(&self) -> u32 {
        self.stops
    }

    /// Check if the bus is held by the master
    pub fn is_bus_held(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn start(&mut self) {
        self.status = if self.phase == Phase::Idle {
            code::START
        } else {
            code::REPEATED_START
        };
        self.phase = Phase::Started;
        self.starts += 1;
    }

    fn transmit(&mut self) {
        match self.phase {
            Phase::Started => {
                let read = self.data & 1 != 0;
                let acked = self.present && self.data >> 1 == self.address;
                self.status = match (read, acked) {
                    (false, true) => code::MT_SLA_ACK,
                    (false, false) => code::MT_SLA_NACK,
                    (true, true) => code::MR_SLA_ACK,
                    (true, false) => code::MR_SLA_NACK,
                };
                self.phase = match (read, acked) {
                    (_, false) => Phase::Ignored,
                    (false, true) => Phase::Writing,
                    (true, true) => Phase::Reading,
                };
                self.written = 0;
                if self.phase == Phase::Writing {
                    self.rtc.begin_write();
                }
            }
            Phase::Writing => {
                if self.nack_after == Some(self.written) {
                    self.status = code::MT_DATA_NACK;
                } else {
                    self.rtc.write(self.data);
                    self.written += 1;
                    self.status = code::MT_DATA_ACK;
                }
            }
            // Nothing drives the bus here
            Phase::Idle | Phase::Reading | Phase::Ignored => self.status = code::BUS_ERROR,
        }
    }

    fn receive(&mut self, ack: bool) {
        if self.phase == Phase::Reading {
            self.data = self.rtc.read();
            self.status = if ack {
                code::MR_DATA_ACK
            } else {
                code::MR_DATA_NACK
            };
        } else {
            self.status = code::BUS_ERROR;
        }
    }
}

impl TwiPort for SimTwi {
    fn status(&mut self) -> u8 {
        self.status | self.prescaler
    }

    fn read_data(&mut self) -> u8 {
        self.data
    }

    fn write_data(&mut self, byte: u8) {
        self.data = byte;
    }

    fn control(&mut self, command: Control) {
        match command {
            Control::Start => self.start(),
            Control::Transmit => self.transmit(),
            Control::ReceiveAck => self.receive(true),
            Control::ReceiveNack => self.receive(false),
            Control::Stop => {
                self.phase = Phase::Idle;
                self.status = code::NO_INFO;
                self.stops += 1;
            }
            Control::Disable => {
                self.phase = Phase::Idle;
                self.status = code::NO_INFO;
            }
        }
        self.flag = command.raises_interrupt();
    }

    fn interrupt_flag(&mut self) -> bool {
        self.flag
    }
}
