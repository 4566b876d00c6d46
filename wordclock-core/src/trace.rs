//! Operator-visible transfer tracing
//!
//! Tracing is switched by the command interpreter and read by the clock
//! controller when it formats console output. It is separate from `defmt`
//! logging, which goes to the debug probe.

use core::fmt::{self, Write};

use portable_atomic::{AtomicBool, Ordering};

use crate::twi::TransferRequest;

/// Process-wide tracing switch
pub struct TraceFlag(AtomicBool);

impl TraceFlag {
    pub const fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for TraceFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Write one line describing a finished transfer
///
/// `TWI reply2 addr=0xD1(r) n=3/3 status: ok`
pub fn write_transfer<W: Write>(
    out: &mut W,
    label: &str,
    request: &TransferRequest,
) -> fmt::Result {
    let direction = request.direction();
    write!(
        out,
        "TWI {} addr=0x{:02X}({}) n={}/{} status: {}\r\n",
        label,
        request.address().sla(direction),
        direction.tag(),
        request.count(),
        request.requested(),
        request.status(),
    )
}

/// Write bytes as comma-separated hex: `30,04,65`
pub fn write_hex<W: Write>(out: &mut W, bytes: &[u8]) -> fmt::Result {
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.write_char(',')?;
        }
        write!(out, "{:02X}", byte)?;
    }
    Ok(())
}
