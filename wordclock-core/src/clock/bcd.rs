//! BCD time registers
//!
//! The RTC keeps seconds, minutes and hours as packed BCD. Bit 7 of the
//! seconds register halts the oscillator; bit 6 of the hours register
//! selects 12-hour mode, in which bit 5 is the PM flag.

use core::fmt;

use super::drift;

pub const CLOCK_HALT: u8 = 0x80;
pub const HOUR_12: u8 = 0x40;
pub const HOUR_PM: u8 = 0x20;

/// Encode 0..=99 as packed BCD
pub const fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Decode packed BCD, rejecting nibbles above 9
pub const fn from_bcd(byte: u8) -> Option<u8> {
    let tens = byte >> 4;
    let units = byte & 0x0F;
    if tens > 9 || units > 9 {
        None
    } else {
        Some(tens * 10 + units)
    }
}

/// Time field, for error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Hours,
    Minutes,
    Seconds,
}

/// Invalid time value or register contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BcdError {
    /// Register holds a nibble above 9
    InvalidDigit { field: Field, raw: u8 },
    /// Value outside the range for its field and hour mode
    OutOfRange { field: Field, value: u8 },
    /// Fewer than three register bytes
    ShortRead(usize),
}

impl fmt::Display for BcdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BcdError::InvalidDigit { field, raw } => {
                write!(f, "{:?} register 0x{:02x} is not BCD", field, raw)
            }
            BcdError::OutOfRange { field, value } => {
                write!(f, "{:?} value {} out of range", field, value)
            }
            BcdError::ShortRead(n) => write!(f, "short read: {} bytes", n),
        }
    }
}

/// 12- or 24-hour register format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HourMode {
    TwentyFour,
    Twelve { pm: bool },
}

/// A validated time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeOfDay {
    hours: u8,
    minutes: u8,
    seconds: u8,
    mode: HourMode,
}

impl TimeOfDay {
    /// Hours are 1..=12 in 12-hour mode and 0..=23 otherwise
    pub fn new(hours: u8, minutes: u8, seconds: u8, mode: HourMode) -> Result<Self, BcdError> {
        let hours_ok = match mode {
            HourMode::Twelve { .. } => (1..=12).contains(&hours),
            HourMode::TwentyFour => hours <= 23,
        };
        if !hours_ok {
            return Err(BcdError::OutOfRange {
                field: Field::Hours,
                value: hours,
            });
        }
        if minutes > 59 {
            return Err(BcdError::OutOfRange {
                field: Field::Minutes,
                value: minutes,
            });
        }
        if seconds > 59 {
            return Err(BcdError::OutOfRange {
                field: Field::Seconds,
                value: seconds,
            });
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
            mode,
        })
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn seconds(&self) -> u8 {
        self.seconds
    }

    pub fn mode(&self) -> HourMode {
        self.mode
    }
}

/// Raw seconds, minutes and hours registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockReading {
    seconds: u8,
    minutes: u8,
    hours: u8,
}

impl ClockReading {
    /// Registers in device order: seconds, minutes, hours
    pub const fn from_registers(registers: [u8; 3]) -> Self {
        Self {
            seconds: registers[0],
            minutes: registers[1],
            hours: registers[2],
        }
    }

    /// Take the first three bytes of a read
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BcdError> {
        match bytes {
            [seconds, minutes, hours, ..] => Ok(Self::from_registers([*seconds, *minutes, *hours])),
            _ => Err(BcdError::ShortRead(bytes.len())),
        }
    }

    pub const fn registers(&self) -> [u8; 3] {
        [self.seconds, self.minutes, self.hours]
    }

    /// Pack a time into register form, oscillator running
    pub fn encode(time: TimeOfDay) -> Self {
        let hours = match time.mode {
            HourMode::TwentyFour => to_bcd(time.hours),
            HourMode::Twelve { pm } => HOUR_12 | if pm { HOUR_PM } else { 0 } | to_bcd(time.hours),
        };
        Self {
            seconds: to_bcd(time.seconds),
            minutes: to_bcd(time.minutes),
            hours,
        }
    }

    /// Validate and unpack the registers
    pub fn decode(&self) -> Result<TimeOfDay, BcdError> {
        let field = |field, raw: u8| from_bcd(raw).ok_or(BcdError::InvalidDigit { field, raw });
        let seconds = field(Field::Seconds, self.seconds & !CLOCK_HALT)?;
        let minutes = field(Field::Minutes, self.minutes)?;
        let (hours, mode) = match self.mode() {
            HourMode::TwentyFour => (field(Field::Hours, self.hours & 0x3F)?, HourMode::TwentyFour),
            twelve => (field(Field::Hours, self.hours & 0x1F)?, twelve),
        };
        TimeOfDay::new(hours, minutes, seconds, mode)
    }

    pub fn mode(&self) -> HourMode {
        if self.hours & HOUR_12 != 0 {
            HourMode::Twelve {
                pm: self.hours & HOUR_PM != 0,
            }
        } else {
            HourMode::TwentyFour
        }
    }

    /// Seconds as a number, ignoring the halt flag
    pub fn seconds(&self) -> u8 {
        (self.seconds & 0x0F) + ((self.seconds & 0x70) >> 4) * 10
    }

    pub fn minutes(&self) -> u8 {
        (self.minutes & 0x0F) + ((self.minutes & 0x70) >> 4) * 10
    }

    pub fn hours(&self) -> u8 {
        let tens_mask = match self.mode() {
            HourMode::Twelve { .. } => 0x10,
            HourMode::TwentyFour => 0x30,
        };
        (self.hours & 0x0F) + ((self.hours & tens_mask) >> 4) * 10
    }

    /// Raw seconds register
    pub fn seconds_register(&self) -> u8 {
        self.seconds
    }

    /// Check if the oscillator is stopped
    pub fn is_halted(&self) -> bool {
        self.seconds & CLOCK_HALT != 0
    }

    /// Check if this is exactly hh:m0:00 or hh:m5:00
    pub fn is_five_minute_mark(&self) -> bool {
        self.seconds == 0 && matches!(self.minutes & 0x0F, 0x00 | 0x05)
    }

    /// Seconds away from the nearest 5-second mark, see [`drift::near_5s_diff`]
    pub fn drift_correction(&self) -> i8 {
        drift::near_5s_diff(self.seconds)
    }
}

impl fmt::Display for ClockReading {
    /// `5:59:50 PM` or `17:59:50 (24)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.hours(), self.minutes(), self.seconds())?;
        match self.mode() {
            HourMode::Twelve { pm: true } => f.write_str(" PM"),
            HourMode::Twelve { pm: false } => f.write_str(" AM"),
            HourMode::TwentyFour => f.write_str(" (24)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::format;

    #[test]
    fn test_bcd_helpers() {
        assert_eq!(to_bcd(59), 0x59);
        assert_eq!(from_bcd(0x59), Some(59));
        assert_eq!(from_bcd(0x5A), None);
        assert_eq!(from_bcd(0xA0), None);
    }

    #[test]
    fn test_display_twelve_hour() {
        let reading = ClockReading::from_registers([0x50, 0x59, 0x65]);
        assert_eq!(format!("{}", reading), "5:59:50 PM");
        let reading = ClockReading::from_registers([0x07, 0x03, 0x52]);
        assert_eq!(format!("{}", reading), "12:03:07 AM");
    }

    #[test]
    fn test_display_twenty_four_hour() {
        let reading = ClockReading::from_registers([0x00, 0x05, 0x23]);
        assert_eq!(format!("{}", reading), "23:05:00 (24)");
    }

    #[test]
    fn test_five_minute_mark() {
        assert!(ClockReading::from_registers([0x00, 0x05, 0x12]).is_five_minute_mark());
        assert!(ClockReading::from_registers([0x00, 0x50, 0x12]).is_five_minute_mark());
        assert!(!ClockReading::from_registers([0x01, 0x05, 0x12]).is_five_minute_mark());
        assert!(!ClockReading::from_registers([0x00, 0x04, 0x12]).is_five_minute_mark());
        // Halted clock never matches
        assert!(!ClockReading::from_registers([0x80, 0x00, 0x12]).is_five_minute_mark());
    }

    #[test]
    fn test_halt_flag() {
        let reading = ClockReading::from_registers([0x85, 0x00, 0x00]);
        assert!(reading.is_halted());
        assert_eq!(reading.seconds(), 5);
        assert_eq!(reading.decode().unwrap().seconds(), 5);
    }

    #[test]
    fn test_decode_rejects_bad_registers() {
        let reading = ClockReading::from_registers([0x5A, 0x00, 0x00]);
        assert_eq!(
            reading.decode(),
            Err(BcdError::InvalidDigit {
                field: Field::Seconds,
                raw: 0x5A
            })
        );
        // 12-hour mode with hour 0
        let reading = ClockReading::from_registers([0x00, 0x00, 0x40]);
        assert_eq!(
            reading.decode(),
            Err(BcdError::OutOfRange {
                field: Field::Hours,
                value: 0
            })
        );
        assert_eq!(ClockReading::from_slice(&[0, 0]), Err(BcdError::ShortRead(2)));
    }

    #[test]
    fn test_time_of_day_ranges() {
        assert!(TimeOfDay::new(0, 0, 0, HourMode::TwentyFour).is_ok());
        assert!(TimeOfDay::new(0, 0, 0, HourMode::Twelve { pm: false }).is_err());
        assert!(TimeOfDay::new(13, 0, 0, HourMode::Twelve { pm: true }).is_err());
        assert!(TimeOfDay::new(23, 60, 0, HourMode::TwentyFour).is_err());
    }

    fn any_time() -> impl Strategy<Value = TimeOfDay> {
        prop_oneof![
            (0u8..24, 0u8..60, 0u8..60)
                .prop_map(|(h, m, s)| TimeOfDay::new(h, m, s, HourMode::TwentyFour).unwrap()),
            (1u8..=12, 0u8..60, 0u8..60, any::<bool>()).prop_map(|(h, m, s, pm)| {
                TimeOfDay::new(h, m, s, HourMode::Twelve { pm }).unwrap()
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_encode_decode(time in any_time()) {
            let reading = ClockReading::encode(time);
            prop_assert_eq!(reading.decode(), Ok(time));
            prop_assert_eq!(reading.hours(), time.hours());
            prop_assert_eq!(reading.minutes(), time.minutes());
            prop_assert_eq!(reading.seconds(), time.seconds());
            prop_assert!(!reading.is_halted());
        }
    }
}
