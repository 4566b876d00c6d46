//! Embassy async tasks
//!
//! The dispatcher owns every active object. The other tasks turn timers,
//! pin edges and UART bytes into events and post them.

pub mod console_rx;
pub mod console_tx;
pub mod dispatcher;
pub mod square_wave;
pub mod tick;

pub use console_rx::console_rx_task;
pub use console_tx::console_tx_task;
pub use dispatcher::dispatcher_task;
pub use square_wave::square_wave_task;
pub use tick::tick_task;
