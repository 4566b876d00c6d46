//! Fast tick source
//!
//! Posts `Tick20th` to the clock controller at the configured rate and a
//! `Watchdog` event once per second.

use defmt::*;
use embassy_time::{Duration, Ticker};

use wordclock_core::event::Event;

use crate::channels::{post, CLOCK_QUEUE};

/// Tick task - drives the reply timer and the watchdog feed
#[embassy_executor::task]
pub async fn tick_task(rate_hz: u8) {
    info!("Tick task started at {} Hz", rate_hz);

    let rate_hz = rate_hz.max(1);
    let mut ticker = Ticker::every(Duration::from_hz(u64::from(rate_hz)));
    let mut ticks: u8 = 0;

    loop {
        ticker.next().await;
        post(&CLOCK_QUEUE, Event::Tick20th);

        ticks += 1;
        if ticks >= rate_hz {
            ticks = 0;
            post(&CLOCK_QUEUE, Event::Watchdog);
        }
    }
}
