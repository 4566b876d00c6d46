//! Console UART transmit task
//!
//! Drains the console pipe the active objects write into.

use defmt::*;
use embassy_rp::uart::BufferedUartTx;
use embedded_io_async::Write;

use crate::channels::CONSOLE_OUT;

#[embassy_executor::task]
pub async fn console_tx_task(mut tx: BufferedUartTx) {
    info!("Console TX task started");

    let mut buf = [0u8; 64];

    loop {
        let n = CONSOLE_OUT.read(&mut buf).await;
        if let Err(e) = tx.write_all(&buf[..n]).await {
            warn!("Console write failed: {:?}", e);
        }
    }
}
