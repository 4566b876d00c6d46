//! Wordclock - RTC-synchronised clock firmware
//!
//! Main firmware binary for RP2040 boards with a DS1307 on a two-wire bus.
//! The RTC's 1 Hz square wave paces the clock; the controller reads the
//! RTC every few seconds and steers its reads onto five-second marks.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, OutputOpenDrain, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_rp::watchdog::Watchdog;
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use wordclock_core::config::ClockConfig;
use wordclock_core::Fault;
use wordclock_drivers::BitBangTwi;
use wordclock_hal::TwiConfig;

use crate::board::BoardWatchdog;

mod board;
mod channels;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 64]> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Wordclock firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = ClockConfig::default();
    if let Err(e) = config.validate() {
        error!("Invalid clock config: {}", e);
        cortex_m::peripheral::SCB::sys_reset();
    }
    info!(
        "RTC at {=u8:#x}, read every {} s",
        config.rtc_address, config.poll_interval_s
    );

    // Console UART (GPIO0 TX, GPIO1 RX), 115200 baud default
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 64]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("Console UART initialized");

    // RTC bus: GPIO4 SDA, GPIO5 SCL, external pull-ups
    let sda = OutputOpenDrain::new(p.PIN_4, Level::High);
    let scl = OutputOpenDrain::new(p.PIN_5, Level::High);
    let port = BitBangTwi::new(sda, scl, Delay, TwiConfig::STANDARD);

    // DS1307 SQW/OUT is open drain
    let sqw = Input::new(p.PIN_6, Pull::Up);

    let watchdog = BoardWatchdog::start(Watchdog::new(p.WATCHDOG));

    info!("RTC bus and watchdog initialized");

    // Spawn tasks
    spawner.spawn(tasks::console_tx_task(tx)).unwrap();
    spawner.spawn(tasks::console_rx_task(rx)).unwrap();
    spawner
        .spawn(tasks::dispatcher_task(port, watchdog, config))
        .unwrap();
    spawner.spawn(tasks::tick_task(config.fast_tick_hz)).unwrap();
    spawner.spawn(tasks::square_wave_task(sqw)).unwrap();

    info!("All tasks spawned, firmware running");
}

/// Log a fault and restart the board
pub(crate) fn fatal(fault: Fault) -> ! {
    error!("fatal: {}", fault);
    cortex_m::peripheral::SCB::sys_reset()
}
