//! Configuration type definitions

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clock controller queue depth
pub const CLOCK_QUEUE_DEPTH: usize = 8;

/// Session manager queue depth
///
/// One session produces at most three engine notifications, plus room for
/// a request from every client.
pub const BUS_QUEUE_DEPTH: usize = 6;

/// Longest operator command line, including the terminator
pub const COMMAND_LINE_LEN: usize = 50;

/// Command interpreter queue depth
///
/// Holds a whole command line, so a line pasted into the console fits
/// even when the interpreter has not run yet.
pub const COMMANDER_QUEUE_DEPTH: usize = COMMAND_LINE_LEN;

/// Bytes written to seed the RTC: register pointer plus eight registers
pub const SEED_LEN: usize = 9;

/// Invalid configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Bus address above 0x7F
    InvalidAddress(u8),
    /// Poll interval outside 3..=255 seconds
    PollInterval(u8),
    /// Zero-length timer or tick rate
    ZeroPeriod,
    /// Seed register not valid BCD
    InvalidSeed { register: u8 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress(addr) => write!(f, "invalid bus address 0x{:02x}", addr),
            ConfigError::PollInterval(s) => write!(f, "poll interval {} s out of range", s),
            ConfigError::ZeroPeriod => f.write_str("timer period must be non-zero"),
            ConfigError::InvalidSeed { register } => {
                write!(f, "seed register {} is not valid BCD", register)
            }
        }
    }
}

/// Initial RTC register contents, written once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RtcSeed {
    /// Seconds, bit 7 is the clock-halt flag
    pub seconds: u8,
    pub minutes: u8,
    /// Hours with the 12-hour (bit 6) and PM (bit 5) flags
    pub hours: u8,
    /// Day of week, 1..=7
    pub day: u8,
    pub date: u8,
    pub month: u8,
    /// Years since 2000
    pub year: u8,
    /// Square-wave control register
    pub control: u8,
}

impl Default for RtcSeed {
    fn default() -> Self {
        Self {
            // 5:59:50 PM, clock running
            seconds: 0x50,
            minutes: 0x59,
            hours: 0x65,
            // Sunday 1 January 2001
            day: 0x07,
            date: 0x01,
            month: 0x01,
            year: 0x01,
            // 1 Hz square wave on SQW/OUT
            control: 0x90,
        }
    }
}

impl RtcSeed {
    /// The bytes of the seeding write, starting with register pointer 0
    pub fn registers(&self) -> [u8; SEED_LEN] {
        [
            0x00,
            self.seconds,
            self.minutes,
            self.hours,
            self.day,
            self.date,
            self.month,
            self.year,
            self.control,
        ]
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            self.seconds & 0x7F,
            self.minutes,
            self.hours & 0x1F,
            self.day,
            self.date,
            self.month,
            self.year,
        ];
        for (i, byte) in checks.iter().enumerate() {
            if byte & 0x0F > 9 || byte >> 4 > 9 {
                return Err(ConfigError::InvalidSeed {
                    register: i as u8,
                });
            }
        }
        Ok(())
    }
}

/// Clock controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClockConfig {
    /// 7-bit RTC bus address
    pub rtc_address: u8,
    /// Seconds between reads once aligned to a 5-second mark
    pub poll_interval_s: u8,
    /// Fast ticks to wait for a read before reporting a timeout
    pub reply_timeout_ticks: u8,
    /// Fast tick rate; also the heartbeat period in ticks
    pub fast_tick_hz: u8,
    /// Registers written at startup
    pub seed: RtcSeed,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            rtc_address: 0x68,
            poll_interval_s: 5,
            reply_timeout_ticks: 30,
            fast_tick_hz: 20,
            seed: RtcSeed::default(),
        }
    }
}

impl ClockConfig {
    /// Check the configuration for values the controller cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rtc_address > 0x7F {
            return Err(ConfigError::InvalidAddress(self.rtc_address));
        }
        // Drift correction moves the countdown by up to two either way
        if self.poll_interval_s < 3 {
            return Err(ConfigError::PollInterval(self.poll_interval_s));
        }
        if self.reply_timeout_ticks == 0 || self.fast_tick_hz == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        self.seed.validate()
    }
}
