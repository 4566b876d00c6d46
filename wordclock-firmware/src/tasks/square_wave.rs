//! RTC square-wave input
//!
//! The DS1307 drives SQW/OUT at 1 Hz once seeded. Each falling edge is one
//! second, delivered to the clock controller while the gate is open.

use defmt::*;
use embassy_rp::gpio::Input;

use wordclock_core::event::Event;

use crate::channels::{post, CLOCK_QUEUE, GATE};

#[embassy_executor::task]
pub async fn square_wave_task(mut sqw: Input<'static>) {
    info!("Square wave task started");

    loop {
        sqw.wait_for_falling_edge().await;
        if GATE.is_enabled() {
            post(&CLOCK_QUEUE, Event::Tick1s);
        } else {
            trace!("SQW edge while gated");
        }
    }
}
