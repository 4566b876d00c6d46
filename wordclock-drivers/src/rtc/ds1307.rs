//! DS1307 serial real-time clock
//!
//! Register map constants and a model of the chip's register file. The
//! model answers bus transfers the way the chip does (the first byte of a
//! write sets the register pointer, every data byte advances it) and can be
//! ticked once per second.

use wordclock_core::clock::bcd::{from_bcd, to_bcd, CLOCK_HALT, HOUR_12, HOUR_PM};

/// Fixed 7-bit bus address
pub const ADDRESS: u8 = 0x68;

/// Timekeeping registers
pub mod reg {
    pub const SECONDS: u8 = 0x00;
    pub const MINUTES: u8 = 0x01;
    pub const HOURS: u8 = 0x02;
    pub const DAY: u8 = 0x03;
    pub const DATE: u8 = 0x04;
    pub const MONTH: u8 = 0x05;
    pub const YEAR: u8 = 0x06;
    pub const CONTROL: u8 = 0x07;
    /// First byte of battery-backed RAM
    pub const RAM: u8 = 0x08;
}

/// Control register bits
pub mod control {
    /// Output level when the square wave is off
    pub const OUT: u8 = 0x80;
    /// Square wave enable
    pub const SQWE: u8 = 0x10;
    /// Rate select; both clear for 1 Hz
    pub const RS1: u8 = 0x02;
    pub const RS0: u8 = 0x01;
}

/// Size of the register file, timekeeping plus RAM
pub const REGISTER_COUNT: usize = 64;

/// DS1307 register file
#[derive(Debug, Clone)]
pub struct Ds1307 {
    registers: [u8; REGISTER_COUNT],
    pointer: u8,
    expect_pointer: bool,
}

impl Default for Ds1307 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ds1307 {
    /// Power-on state: oscillator halted, everything else zero
    pub fn new() -> Self {
        let mut registers = [0; REGISTER_COUNT];
        registers[reg::SECONDS as usize] = CLOCK_HALT;
        Self {
            registers,
            pointer: 0,
            expect_pointer: false,
        }
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    /// Seconds, minutes and hours registers
    pub fn time(&self) -> [u8; 3] {
        [self.registers[0], self.registers[1], self.registers[2]]
    }

    pub fn set_register(&mut self, register: u8, value: u8) {
        self.registers[usize::from(register) % REGISTER_COUNT] = value;
    }

    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    /// Check if the oscillator is running
    pub fn is_running(&self) -> bool {
        self.registers[0] & CLOCK_HALT == 0
    }

    /// Check if SQW/OUT is producing the 1 Hz square wave
    pub fn square_wave_1hz(&self) -> bool {
        let ctrl = self.registers[reg::CONTROL as usize];
        ctrl & control::SQWE != 0 && ctrl & (control::RS0 | control::RS1) == 0
    }

    /// The chip was addressed for writing
    pub fn begin_write(&mut self) {
        self.expect_pointer = true;
    }

    /// One data byte of a write transfer
    pub fn write(&mut self, byte: u8) {
        if self.expect_pointer {
            self.pointer = byte % REGISTER_COUNT as u8;
            self.expect_pointer = false;
        } else {
            self.registers[usize::from(self.pointer)] = byte;
            self.advance();
        }
    }

    /// One data byte of a read transfer
    pub fn read(&mut self) -> u8 {
        let byte = self.registers[usize::from(self.pointer)];
        self.advance();
        byte
    }

    fn advance(&mut self) {
        self.pointer = (self.pointer + 1) % REGISTER_COUNT as u8;
    }

    /// Advance the time by one second
    ///
    /// Does nothing while the oscillator is halted. The calendar registers
    /// are not advanced at midnight.
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }
        let [seconds, minutes, hours] = self.time();
        let s = from_bcd(seconds).unwrap_or(0) + 1;
        if s < 60 {
            self.registers[0] = to_bcd(s);
            return;
        }
        self.registers[0] = 0;

        let m = from_bcd(minutes).unwrap_or(0) + 1;
        if m < 60 {
            self.registers[1] = to_bcd(m);
            return;
        }
        self.registers[1] = 0;
        self.registers[2] = next_hour(hours);
    }
}

fn next_hour(hours: u8) -> u8 {
    if hours & HOUR_12 == 0 {
        let h = from_bcd(hours & 0x3F).unwrap_or(0) + 1;
        return to_bcd(h % 24);
    }
    let pm = hours & HOUR_PM != 0;
    match from_bcd(hours & 0x1F).unwrap_or(12) {
        // 11 -> 12 flips AM/PM
        11 => HOUR_12 | if pm { 0 } else { HOUR_PM } | to_bcd(12),
        12 => HOUR_12 | if pm { HOUR_PM } else { 0 } | to_bcd(1),
        h => HOUR_12 | if pm { HOUR_PM } else { 0 } | to_bcd(h + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use wordclock_core::clock::{ClockReading, HourMode, TimeOfDay};

    fn running(time: [u8; 3]) -> Ds1307 {
        let mut rtc = Ds1307::new();
        for (i, byte) in time.iter().enumerate() {
            rtc.set_register(i as u8, *byte);
        }
        rtc
    }

    #[test]
    fn test_halted_at_power_on() {
        let mut rtc = Ds1307::new();
        assert!(!rtc.is_running());
        rtc.tick();
        assert_eq!(rtc.time(), [0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_pointer_then_data() {
        let mut rtc = Ds1307::new();
        rtc.begin_write();
        for byte in [0x00, 0x50, 0x59, 0x65] {
            rtc.write(byte);
        }
        assert_eq!(rtc.time(), [0x50, 0x59, 0x65]);
        assert_eq!(rtc.pointer(), 3);

        rtc.begin_write();
        rtc.write(0x01);
        assert_eq!(rtc.read(), 0x59);
        assert_eq!(rtc.read(), 0x65);
    }

    #[test]
    fn test_pointer_wraps() {
        let mut rtc = Ds1307::new();
        rtc.begin_write();
        rtc.write(0x3F);
        rtc.read();
        assert_eq!(rtc.pointer(), 0);
    }

    #[test]
    fn test_tick_rolls_over_twelve_hour() {
        let mut rtc = running([0x59, 0x59, 0x65]);
        rtc.tick();
        assert_eq!(rtc.time(), [0x00, 0x00, 0x66]);

        let mut rtc = running([0x59, 0x59, 0x51]);
        rtc.tick();
        // 11:59:59 AM -> 12:00:00 PM
        assert_eq!(rtc.time(), [0x00, 0x00, 0x72]);

        let mut rtc = running([0x59, 0x59, 0x72]);
        rtc.tick();
        // 12:59:59 PM -> 1:00:00 PM
        assert_eq!(rtc.time(), [0x00, 0x00, 0x61]);
    }

    #[test]
    fn test_tick_rolls_over_midnight() {
        let mut rtc = running([0x59, 0x59, 0x23]);
        rtc.tick();
        assert_eq!(rtc.time(), [0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_square_wave() {
        let mut rtc = Ds1307::new();
        assert!(!rtc.square_wave_1hz());
        rtc.set_register(reg::CONTROL, control::OUT | control::SQWE);
        assert!(rtc.square_wave_1hz());
        rtc.set_register(reg::CONTROL, control::SQWE | control::RS0);
        assert!(!rtc.square_wave_1hz());
    }

    proptest! {
        #[test]
        fn prop_tick_keeps_valid_time(
            h in 1u8..=12,
            m in 0u8..60,
            s in 0u8..60,
            pm in any::<bool>(),
        ) {
            let time = TimeOfDay::new(h, m, s, HourMode::Twelve { pm }).unwrap();
            let mut rtc = running(ClockReading::encode(time).registers());
            rtc.tick();
            let next = ClockReading::from_registers(rtc.time());
            prop_assert!(next.decode().is_ok());
            prop_assert_eq!(next.seconds(), (s + 1) % 60);
        }
    }
}
