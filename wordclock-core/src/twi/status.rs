//! Bus status codes and their meaning
//!
//! The codes are the masked values of the peripheral status register as
//! defined by the two-wire bus standard used by the target's TWI block.

use core::fmt;

/// Raw status codes (already masked with `STATUS_MASK`)
pub mod code {
    // Master, both directions
    pub const START: u8 = 0x08;
    pub const REPEATED_START: u8 = 0x10;
    pub const ARBITRATION_LOST: u8 = 0x38;

    // Master transmitter
    pub const MT_SLA_ACK: u8 = 0x18;
    pub const MT_SLA_NACK: u8 = 0x20;
    pub const MT_DATA_ACK: u8 = 0x28;
    pub const MT_DATA_NACK: u8 = 0x30;

    // Master receiver
    pub const MR_SLA_ACK: u8 = 0x40;
    pub const MR_SLA_NACK: u8 = 0x48;
    pub const MR_DATA_ACK: u8 = 0x50;
    pub const MR_DATA_NACK: u8 = 0x58;

    // Slave receiver
    pub const SR_SLA_ACK: u8 = 0x60;
    pub const SR_ARB_LOST_SLA_ACK: u8 = 0x68;
    pub const SR_GCALL_ACK: u8 = 0x70;
    pub const SR_ARB_LOST_GCALL_ACK: u8 = 0x78;
    pub const SR_DATA_ACK: u8 = 0x80;
    pub const SR_DATA_NACK: u8 = 0x88;
    pub const SR_GCALL_DATA_ACK: u8 = 0x90;
    pub const SR_GCALL_DATA_NACK: u8 = 0x98;
    pub const SR_STOP: u8 = 0xA0;

    // Slave transmitter
    pub const ST_SLA_ACK: u8 = 0xA8;
    pub const ST_ARB_LOST_SLA_ACK: u8 = 0xB0;
    pub const ST_DATA_ACK: u8 = 0xB8;
    pub const ST_DATA_NACK: u8 = 0xC0;
    pub const ST_LAST_DATA: u8 = 0xC8;

    // Miscellaneous
    pub const NO_INFO: u8 = 0xF8;
    pub const BUS_ERROR: u8 = 0x00;
}

/// Coarse meaning of a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusClass {
    /// The bus phase completed as requested
    Success,
    /// The bus phase failed or the peripheral is in an unusable state
    Error,
}

/// One row of the status table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub code: u8,
    pub description: &'static str,
    pub class: StatusClass,
}

const fn entry(code: u8, description: &'static str, class: StatusClass) -> StatusEntry {
    StatusEntry {
        code,
        description,
        class,
    }
}

use StatusClass::{Error, Success};

/// Every status code the peripheral can report
pub static STATUS_TABLE: [StatusEntry; 27] = [
    entry(code::START, "START transmitted", Success),
    entry(code::REPEATED_START, "repeated START transmitted", Success),
    entry(code::MT_SLA_ACK, "SLA+W transmitted, ACK received", Success),
    entry(code::MT_SLA_NACK, "SLA+W transmitted, NACK received", Error),
    entry(code::MT_DATA_ACK, "data transmitted, ACK received", Success),
    entry(code::MT_DATA_NACK, "data transmitted, NACK received", Error),
    entry(code::ARBITRATION_LOST, "arbitration lost", Error),
    entry(code::MR_SLA_ACK, "SLA+R transmitted, ACK received", Success),
    entry(code::MR_SLA_NACK, "SLA+R transmitted, NACK received", Error),
    entry(code::MR_DATA_ACK, "data received, ACK returned", Success),
    entry(code::MR_DATA_NACK, "data received, NACK returned", Success),
    entry(code::SR_SLA_ACK, "own SLA+W received, ACK returned", Success),
    entry(code::SR_ARB_LOST_SLA_ACK, "arbitration lost, own SLA+W received", Error),
    entry(code::SR_GCALL_ACK, "general call received, ACK returned", Success),
    entry(code::SR_ARB_LOST_GCALL_ACK, "arbitration lost, general call received", Error),
    entry(code::SR_DATA_ACK, "slave data received, ACK returned", Success),
    entry(code::SR_DATA_NACK, "slave data received, NACK returned", Error),
    entry(code::SR_GCALL_DATA_ACK, "general call data received, ACK returned", Success),
    entry(code::SR_GCALL_DATA_NACK, "general call data received, NACK returned", Error),
    entry(code::SR_STOP, "STOP or repeated START received while addressed", Success),
    entry(code::ST_SLA_ACK, "own SLA+R received, ACK returned", Success),
    entry(code::ST_ARB_LOST_SLA_ACK, "arbitration lost, own SLA+R received", Error),
    entry(code::ST_DATA_ACK, "slave data transmitted, ACK received", Success),
    entry(code::ST_DATA_NACK, "slave data transmitted, NACK received", Error),
    entry(code::ST_LAST_DATA, "last slave data transmitted, ACK received", Success),
    entry(code::NO_INFO, "no relevant state information", Error),
    entry(code::BUS_ERROR, "bus error, illegal START or STOP", Error),
];

/// Find the table row for a status code
pub fn lookup(status: u8) -> Option<&'static StatusEntry> {
    STATUS_TABLE.iter().find(|e| e.code == status)
}

/// Human-readable description of a status code
pub fn describe(status: u8) -> &'static str {
    lookup(status).map_or("unknown status", |e| e.description)
}

/// Classify a status code; unknown codes are errors
pub fn classify(status: u8) -> StatusClass {
    lookup(status).map_or(StatusClass::Error, |e| e.class)
}

/// Outcome of a transfer request, as seen by its owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferStatus {
    /// Not yet completed
    Pending,
    /// Every byte was transferred
    Ok,
    /// The bus was busy with another session; nothing was sent
    QueueFull,
    /// The transfer was chained behind one that failed and never started
    Skipped,
    /// The peripheral reported an unexpected status code
    Protocol(u8),
}

impl TransferStatus {
    /// Check if the transfer completed successfully
    pub fn is_ok(&self) -> bool {
        matches!(self, TransferStatus::Ok)
    }

    /// Check if the transfer has finished, one way or another
    pub fn is_final(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }

    /// Raw bus status code, for protocol errors
    pub fn protocol_code(&self) -> Option<u8> {
        match self {
            TransferStatus::Protocol(code) => Some(*code),
            _ => None,
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Ok => "ok",
            TransferStatus::QueueFull => "bus busy, request rejected",
            TransferStatus::Skipped => "not started after an earlier error",
            TransferStatus::Protocol(code) => describe(*code),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Protocol(code) => write!(f, "0x{:02x}: {}", code, describe(*code)),
            other => f.write_str(other.description()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in STATUS_TABLE.iter().enumerate() {
            for b in &STATUS_TABLE[i + 1..] {
                assert_ne!(a.code, b.code, "duplicate code {:#x}", a.code);
            }
        }
    }

    #[test]
    fn test_codes_have_clear_low_bits() {
        for e in STATUS_TABLE.iter() {
            assert_eq!(e.code & !wordclock_hal::STATUS_MASK, 0);
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(code::START), StatusClass::Success);
        assert_eq!(classify(code::MR_DATA_NACK), StatusClass::Success);
        assert_eq!(classify(code::MT_SLA_NACK), StatusClass::Error);
        assert_eq!(classify(code::BUS_ERROR), StatusClass::Error);
        // Not a real status code
        assert_eq!(classify(0x07), StatusClass::Error);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(code::MT_SLA_NACK), "SLA+W transmitted, NACK received");
        assert_eq!(describe(0x07), "unknown status");
    }

    #[test]
    fn test_transfer_status_display() {
        assert_eq!(format!("{}", TransferStatus::Ok), "ok");
        assert_eq!(
            format!("{}", TransferStatus::Protocol(code::MR_SLA_NACK)),
            "0x48: SLA+R transmitted, NACK received"
        );
        assert_eq!(TransferStatus::Protocol(0x20).protocol_code(), Some(0x20));
        assert!(!TransferStatus::Pending.is_final());
        assert!(TransferStatus::QueueFull.is_final());
    }
}
