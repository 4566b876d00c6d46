//! Software bus master
//!
//! Drives SDA and SCL as open-drain GPIOs through `embedded-hal` and
//! reports the same status codes as a hardware TWI block, so the protocol
//! engine runs unchanged on boards without one. Each command runs the whole
//! bus phase before returning; the interrupt flag is then set at once.
//!
//! Both pins must be open-drain: `set_high` releases the line and
//! `is_high` reads the actual line level.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use wordclock_core::twi::status::code;
use wordclock_hal::{Control, TwiConfig, TwiPort};

/// Half periods to wait for a device stretching SCL
///
/// 500 us at standard speed. A stuck clock line becomes `BUS_ERROR`.
const STRETCH_LIMIT: u32 = 100;

/// A pin reported an error or a device held a line too long
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Writing,
    Reading,
}

/// Bit-banged bus master
///
/// The protocol engine issues commands from inside its critical section,
/// so a whole bus phase runs with interrupts masked. One byte takes about
/// 90 us at standard speed, plus at most 100 half periods per clock pulse
/// if a device stretches SCL.
pub struct BitBangTwi<SDA, SCL, D> {
    sda: SDA,
    scl: SCL,
    delay: D,
    half_period_ns: u32,
    phase: Phase,
    status: u8,
    data: u8,
    flag: bool,
}

impl<SDA, SCL, D> BitBangTwi<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(sda: SDA, scl: SCL, delay: D, config: TwiConfig) -> Self {
        Self {
            sda,
            scl,
            delay,
            half_period_ns: config.half_period_ns(),
            phase: Phase::Idle,
            status: code::NO_INFO,
            data: 0xFF,
            flag: false,
        }
    }

    /// Release both lines and return the pins
    pub fn release(mut self) -> (SDA, SCL, D) {
        let _ = self.sda.set_high();
        let _ = self.scl.set_high();
        (self.sda, self.scl, self.delay)
    }

    fn wait(&mut self) {
        self.delay.delay_ns(self.half_period_ns);
    }

    fn sda_set(&mut self, high: bool) -> Result<(), LineFault> {
        let result = if high {
            self.sda.set_high()
        } else {
            self.sda.set_low()
        };
        result.map_err(|_| LineFault)
    }

    fn sda_is_high(&mut self) -> Result<bool, LineFault> {
        self.sda.is_high().map_err(|_| LineFault)
    }

    fn scl_low(&mut self) -> Result<(), LineFault> {
        self.scl.set_low().map_err(|_| LineFault)
    }

    /// Release SCL and wait for it to go high
    fn scl_high(&mut self) -> Result<(), LineFault> {
        self.scl.set_high().map_err(|_| LineFault)?;
        for _ in 0..STRETCH_LIMIT {
            if self.scl.is_high().map_err(|_| LineFault)? {
                return Ok(());
            }
            self.wait();
        }
        Err(LineFault)
    }

    fn start_condition(&mut self) -> Result<(), LineFault> {
        self.sda_set(true)?;
        self.scl_high()?;
        self.wait();
        if !self.sda_is_high()? {
            // Someone else is holding SDA
            return Err(LineFault);
        }
        self.sda_set(false)?;
        self.wait();
        self.scl_low()?;
        self.wait();
        Ok(())
    }

    fn stop_condition(&mut self) -> Result<(), LineFault> {
        self.sda_set(false)?;
        self.wait();
        self.scl_high()?;
        self.wait();
        self.sda_set(true)?;
        self.wait();
        Ok(())
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), LineFault> {
        self.sda_set(bit)?;
        self.wait();
        self.scl_high()?;
        self.wait();
        self.scl_low()
    }

    fn read_bit(&mut self) -> Result<bool, LineFault> {
        self.wait();
        self.scl_high()?;
        let bit = self.sda_is_high()?;
        self.wait();
        self.scl_low()?;
        Ok(bit)
    }

    /// Shift out a byte, returning whether the device acknowledged it
    fn write_byte(&mut self, byte: u8) -> Result<bool, LineFault> {
        for i in (0..8).rev() {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        self.sda_set(true)?;
        let nack = self.read_bit()?;
        Ok(!nack)
    }

    fn read_byte(&mut self, ack: bool) -> Result<u8, LineFault> {
        self.sda_set(true)?;
        let mut byte = 0;
        for _ in 0..8 {
            byte = (byte << 1) | u8::from(self.read_bit()?);
        }
        self.write_bit(!ack)?;
        self.sda_set(true)?;
        Ok(byte)
    }

    fn run(&mut self, command: Control) -> Result<u8, LineFault> {
        match (command, self.phase) {
            (Control::Start, phase) => {
                self.start_condition()?;
                self.phase = Phase::Started;
                Ok(if phase == Phase::Idle {
                    code::START
                } else {
                    code::REPEATED_START
                })
            }
            (Control::Transmit, Phase::Started) => {
                let read = self.data & 1 != 0;
                let acked = self.write_byte(self.data)?;
                self.phase = if read { Phase::Reading } else { Phase::Writing };
                Ok(match (read, acked) {
                    (false, true) => code::MT_SLA_ACK,
                    (false, false) => code::MT_SLA_NACK,
                    (true, true) => code::MR_SLA_ACK,
                    (true, false) => code::MR_SLA_NACK,
                })
            }
            (Control::Transmit, Phase::Writing) => {
                if self.write_byte(self.data)? {
                    Ok(code::MT_DATA_ACK)
                } else {
                    Ok(code::MT_DATA_NACK)
                }
            }
            (Control::ReceiveAck, Phase::Reading) => {
                self.data = self.read_byte(true)?;
                Ok(code::MR_DATA_ACK)
            }
            (Control::ReceiveNack, Phase::Reading) => {
                self.data = self.read_byte(false)?;
                Ok(code::MR_DATA_NACK)
            }
            (Control::Stop, _) => {
                self.phase = Phase::Idle;
                self.stop_condition()?;
                Ok(code::NO_INFO)
            }
            (Control::Disable, _) => {
                self.phase = Phase::Idle;
                self.sda_set(true)?;
                self.scl.set_high().map_err(|_| LineFault)?;
                Ok(code::NO_INFO)
            }
            // Command makes no sense in this phase
            _ => Err(LineFault),
        }
    }
}

impl<SDA, SCL, D> TwiPort for BitBangTwi<SDA, SCL, D>
where
    SDA: InputPin + OutputPin,
    SCL: InputPin + OutputPin,
    D: DelayNs,
{
    fn status(&mut self) -> u8 {
        self.status
    }

    fn read_data(&mut self) -> u8 {
        self.data
    }

    fn write_data(&mut self, byte: u8) {
        self.data = byte;
    }

    fn control(&mut self, command: Control) {
        self.status = self.run(command).unwrap_or(code::BUS_ERROR);
        self.flag = command.raises_interrupt();
    }

    fn interrupt_flag(&mut self) -> bool {
        self.flag
    }
}
