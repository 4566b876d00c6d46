//! Two-wire bus peripheral abstraction
//!
//! Models a byte-level, interrupt-driven bus master of the kind found on
//! small microcontrollers: software issues one [`Control`] command, the
//! peripheral performs that bus phase, then raises an interrupt and exposes
//! a status code describing what happened. The protocol engine in
//! `wordclock-core` reacts to each status code and issues the next command.

/// Bits of the status register that carry the status code.
///
/// The low three bits hold prescaler and reserved bits and must be masked
/// off before comparing against the status table.
pub const STATUS_MASK: u8 = 0xF8;

/// Command written to the peripheral's control register.
///
/// Every variant except [`Control::Disable`] also clears the interrupt flag,
/// which is what starts the next bus phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Control {
    /// Generate a START (or REPEATED START while the bus is held)
    Start,
    /// Shift out the byte previously written with [`TwiPort::write_data`]
    Transmit,
    /// Receive a byte and ACK it, asking the device for more
    ReceiveAck,
    /// Receive a byte and NACK it, telling the device it was the last one
    ReceiveNack,
    /// Generate a STOP and release the bus
    Stop,
    /// Turn the peripheral off, acknowledging any stray interrupt
    Disable,
}

impl Control {
    /// Check if this command produces another interrupt when done
    pub fn raises_interrupt(&self) -> bool {
        !matches!(self, Control::Stop | Control::Disable)
    }
}

/// Interrupt-driven two-wire bus master
///
/// Implementations must be callable from interrupt context: no method may
/// block waiting for the bus.
pub trait TwiPort {
    /// Read the raw status register
    ///
    /// Callers mask with [`STATUS_MASK`].
    fn status(&mut self) -> u8;

    /// Read the data register (the byte most recently received)
    fn read_data(&mut self) -> u8;

    /// Load the data register with the next byte to transmit
    fn write_data(&mut self, byte: u8);

    /// Write the control register
    fn control(&mut self, command: Control);

    /// Check if the peripheral has finished a bus phase and is waiting
    ///
    /// This is the interrupt flag. It stays set until the next
    /// [`TwiPort::control`] call.
    fn interrupt_flag(&mut self) -> bool;
}

/// Two-wire bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TwiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for TwiConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl TwiConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self { frequency: 100_000 };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self { frequency: 400_000 };

    /// Half of one SCL period in nanoseconds
    ///
    /// Used by software masters to time each clock edge.
    pub fn half_period_ns(&self) -> u32 {
        500_000_000 / self.frequency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_does_not_raise_interrupt() {
        assert!(Control::Start.raises_interrupt());
        assert!(Control::ReceiveNack.raises_interrupt());
        assert!(!Control::Stop.raises_interrupt());
        assert!(!Control::Disable.raises_interrupt());
    }

    #[test]
    fn test_half_period() {
        assert_eq!(TwiConfig::STANDARD.half_period_ns(), 5_000);
        assert_eq!(TwiConfig::FAST.half_period_ns(), 1_250);
    }
}
