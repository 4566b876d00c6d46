//! Console UART receive task
//!
//! Feeds every received byte to the command interpreter. A read is only
//! issued once the interpreter's queue has room for a full buffer, so a
//! burst of input waits in the UART ring instead of overflowing the queue.

use defmt::*;
use embassy_rp::uart::BufferedUartRx;
use embassy_time::Timer;
use embedded_io_async::Read;

use wordclock_core::config::COMMANDER_QUEUE_DEPTH;
use wordclock_core::event::{Event, Mailbox};

use crate::channels::{post, COMMANDER_QUEUE};

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 16;

const _: () = assert!(RX_BUF_SIZE <= COMMANDER_QUEUE_DEPTH);

#[embassy_executor::task]
pub async fn console_rx_task(mut rx: BufferedUartRx) {
    info!("Console RX task started");

    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        // This task is the only producer of Char events
        while COMMANDER_QUEUE.len() + RX_BUF_SIZE > COMMANDER_QUEUE.capacity() {
            Timer::after_millis(1).await;
        }

        match rx.read(&mut buf).await {
            Ok(n) => {
                trace!("RX: {} bytes", n);
                for &byte in &buf[..n] {
                    post(&COMMANDER_QUEUE, Event::Char(byte));
                }
            }
            Err(e) => {
                warn!("UART read error: {:?}", e);
            }
        }
    }
}
