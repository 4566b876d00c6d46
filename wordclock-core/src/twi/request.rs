//! Transfer requests
//!
//! A [`TransferRequest`] owns its data buffer for as long as it exists. The
//! owner creates it, moves it into a session, and gets it back by value in
//! a reply event, so nobody else can touch the buffer in between.

use core::fmt;

use super::status::TransferStatus;
use crate::event::{Event, Mailbox};
use crate::fault::Fault;

/// 7-bit bus address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Create an address; returns `None` above 0x7F
    pub const fn new(address: u8) -> Option<Self> {
        if address <= 0x7F {
            Some(Self(address))
        } else {
            None
        }
    }

    /// The 7-bit address
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Address byte with the direction bit (SLA+R/W)
    pub const fn sla(&self, direction: Direction) -> u8 {
        (self.0 << 1) | direction.bit()
    }
}

/// Transfer direction, from the master's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// The R/W bit of the address byte
    pub const fn bit(&self) -> u8 {
        match self {
            Direction::Write => 0,
            Direction::Read => 1,
        }
    }

    /// One-letter tag for traces
    pub const fn tag(&self) -> char {
        match self {
            Direction::Write => 'w',
            Direction::Read => 'r',
        }
    }
}

/// Which completion event the owner wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplySignal {
    Reply,
    Reply1,
    Reply2,
}

impl ReplySignal {
    /// Wrap a finished request in the matching event
    pub fn into_event(self, request: TransferRequest) -> Event {
        match self {
            ReplySignal::Reply => Event::TwiReply(request),
            ReplySignal::Reply1 => Event::TwiReply1(request),
            ReplySignal::Reply2 => Event::TwiReply2(request),
        }
    }
}

/// Owner identity: where and how to deliver the finished request
#[derive(Clone, Copy)]
pub struct ReplyTo {
    pub mailbox: &'static dyn Mailbox,
    pub signal: ReplySignal,
}

impl ReplyTo {
    pub fn new(mailbox: &'static dyn Mailbox, signal: ReplySignal) -> Self {
        Self { mailbox, signal }
    }
}

impl fmt::Debug for ReplyTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyTo")
            .field("mailbox", &self.mailbox.name())
            .field("signal", &self.signal)
            .finish()
    }
}

/// Invalid request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// Requested length does not fit the buffer
    BufferTooSmall { requested: usize, capacity: usize },
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::BufferTooSmall {
                requested,
                capacity,
            } => write!(f, "{} bytes requested, buffer holds {}", requested, capacity),
        }
    }
}

/// One bus transfer: address, direction, data and progress
pub struct TransferRequest {
    reply_to: ReplyTo,
    address: DeviceAddress,
    direction: Direction,
    buf: &'static mut [u8],
    requested: usize,
    count: usize,
    status: TransferStatus,
}

impl TransferRequest {
    fn new(
        reply_to: ReplyTo,
        address: DeviceAddress,
        direction: Direction,
        buf: &'static mut [u8],
        len: usize,
    ) -> Result<Self, RequestError> {
        if len > buf.len() {
            return Err(RequestError::BufferTooSmall {
                requested: len,
                capacity: buf.len(),
            });
        }
        Ok(Self {
            reply_to,
            address,
            direction,
            buf,
            requested: len,
            count: 0,
            status: TransferStatus::Pending,
        })
    }

    /// Write the first `len` bytes of `buf` to the device
    pub fn write(
        reply_to: ReplyTo,
        address: DeviceAddress,
        buf: &'static mut [u8],
        len: usize,
    ) -> Result<Self, RequestError> {
        Self::new(reply_to, address, Direction::Write, buf, len)
    }

    /// Read `len` bytes from the device into `buf`
    pub fn read(
        reply_to: ReplyTo,
        address: DeviceAddress,
        buf: &'static mut [u8],
        len: usize,
    ) -> Result<Self, RequestError> {
        Self::new(reply_to, address, Direction::Read, buf, len)
    }

    /// Change the transfer length and reset progress
    pub fn set_len(&mut self, len: usize) -> Result<(), RequestError> {
        if len > self.buf.len() {
            return Err(RequestError::BufferTooSmall {
                requested: len,
                capacity: self.buf.len(),
            });
        }
        self.requested = len;
        self.reset();
        Ok(())
    }

    /// Clear progress so the request can be submitted again
    pub fn reset(&mut self) {
        self.count = 0;
        self.status = TransferStatus::Pending;
    }

    /// Bytes transferred so far: acknowledged on a write, received on a read
    ///
    /// For a finished read this is the data received.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.count]
    }

    /// The whole buffer, for filling in outgoing data
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..]
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Bytes acknowledged by the device on a write, or stored on a read
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn reply_to(&self) -> ReplyTo {
        self.reply_to
    }

    /// Check if a partial transfer is still recorded
    pub fn is_partial(&self) -> bool {
        self.count > 0 && self.count < self.requested
    }

    /// Send the request back to its owner
    pub fn reply(self) -> Result<(), Fault> {
        let ReplyTo { mailbox, signal } = self.reply_to;
        mailbox.post(signal.into_event(self))
    }

    pub(crate) fn remaining(&self) -> usize {
        self.requested - self.count
    }

    /// Next byte to transmit; the count moves only once it is acknowledged
    pub(crate) fn next_outgoing(&self) -> Option<u8> {
        self.buf[..self.requested].get(self.count).copied()
    }

    /// The device acknowledged the byte from [`Self::next_outgoing`]
    pub(crate) fn ack_outgoing(&mut self) {
        if self.count < self.requested {
            self.count += 1;
        }
    }

    /// Store one received byte; bytes past the requested length are dropped
    pub(crate) fn store_incoming(&mut self, byte: u8) {
        if self.count < self.requested {
            self.buf[self.count] = byte;
            self.count += 1;
        }
    }

    pub(crate) fn finish(&mut self, status: TransferStatus) {
        self.status = status;
    }
}

impl fmt::Debug for TransferRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferRequest")
            .field("owner", &self.reply_to)
            .field("address", &self.address)
            .field("direction", &self.direction)
            .field("requested", &self.requested)
            .field("count", &self.count)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use std::boxed::Box;
    use std::vec;

    fn owner() -> ReplyTo {
        let queue: &'static EventQueue<4> = Box::leak(Box::new(EventQueue::new("owner")));
        ReplyTo::new(queue, ReplySignal::Reply2)
    }

    fn buffer(len: usize) -> &'static mut [u8] {
        Box::leak(vec![0u8; len].into_boxed_slice())
    }

    #[test]
    fn test_address_byte() {
        let rtc = DeviceAddress::new(0x68).unwrap();
        assert_eq!(rtc.sla(Direction::Write), 0xD0);
        assert_eq!(rtc.sla(Direction::Read), 0xD1);
        assert!(DeviceAddress::new(0x80).is_none());
    }

    #[test]
    fn test_length_checked_against_buffer() {
        let addr = DeviceAddress::new(0x68).unwrap();
        let result = TransferRequest::read(owner(), addr, buffer(3), 4);
        assert_eq!(
            result.err(),
            Some(RequestError::BufferTooSmall {
                requested: 4,
                capacity: 3
            })
        );
    }

    #[test]
    fn test_outgoing_count_follows_acks() {
        let addr = DeviceAddress::new(0x68).unwrap();
        let buf = buffer(4);
        buf.copy_from_slice(&[1, 2, 3, 4]);
        let mut req = TransferRequest::write(owner(), addr, buf, 2).unwrap();

        assert_eq!(req.next_outgoing(), Some(1));
        assert_eq!(req.next_outgoing(), Some(1));
        assert_eq!(req.count(), 0);
        req.ack_outgoing();
        assert!(req.is_partial());
        assert_eq!(req.next_outgoing(), Some(2));
        req.ack_outgoing();
        assert_eq!(req.next_outgoing(), None);
        req.ack_outgoing();
        assert_eq!(req.count(), 2);
        assert!(!req.is_partial());
    }

    #[test]
    fn test_incoming_bytes_stop_at_requested() {
        let addr = DeviceAddress::new(0x68).unwrap();
        let mut req = TransferRequest::read(owner(), addr, buffer(8), 2).unwrap();
        req.store_incoming(0x11);
        req.store_incoming(0x22);
        req.store_incoming(0x33);
        assert_eq!(req.bytes(), &[0x11, 0x22]);
        assert_eq!(req.remaining(), 0);
    }

    #[test]
    fn test_reply_uses_owner_signal() {
        let addr = DeviceAddress::new(0x68).unwrap();
        let reply_to = owner();
        let mut req = TransferRequest::read(reply_to, addr, buffer(3), 3).unwrap();
        req.finish(TransferStatus::Ok);
        req.reply().unwrap();

        match reply_to.mailbox.fetch() {
            Some(Event::TwiReply2(req)) => assert!(req.status().is_ok()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_set_len_resets_progress() {
        let addr = DeviceAddress::new(0x68).unwrap();
        let mut req = TransferRequest::write(owner(), addr, buffer(9), 9).unwrap();
        req.ack_outgoing();
        req.finish(TransferStatus::Protocol(0x30));
        req.set_len(4).unwrap();
        assert_eq!(req.count(), 0);
        assert_eq!(req.requested(), 4);
        assert_eq!(req.status(), TransferStatus::Pending);
        assert!(req.set_len(10).is_err());
    }
}
