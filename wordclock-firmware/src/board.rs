//! Board glue: console sink, bus port type and watchdog hook

use core::fmt;

use embassy_rp::gpio::OutputOpenDrain;
use embassy_rp::watchdog::Watchdog as RpWatchdog;
use embassy_time::{Delay, Duration};

use wordclock_drivers::BitBangTwi;

use crate::channels::CONSOLE_OUT;

/// The RTC bus: GPIO4 (SDA) and GPIO5 (SCL), open drain
pub type Port = BitBangTwi<OutputOpenDrain<'static>, OutputOpenDrain<'static>, Delay>;

/// Hardware watchdog timeout; fed once per second
const WATCHDOG_PERIOD: Duration = Duration::from_secs(3);

/// Console writer feeding the UART transmit task
///
/// Output that does not fit in the pipe is dropped.
pub struct Console;

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut bytes = s.as_bytes();
        while !bytes.is_empty() {
            match CONSOLE_OUT.try_write(bytes) {
                Ok(n) => bytes = &bytes[n..],
                Err(_) => return Err(fmt::Error),
            }
        }
        Ok(())
    }
}

/// RP2040 watchdog fed by the clock controller
pub struct BoardWatchdog(RpWatchdog);

impl BoardWatchdog {
    pub fn start(mut watchdog: RpWatchdog) -> Self {
        watchdog.pause_on_debug(true);
        watchdog.start(WATCHDOG_PERIOD);
        Self(watchdog)
    }
}

impl wordclock_hal::Watchdog for BoardWatchdog {
    fn feed(&mut self) {
        self.0.feed();
    }
}
