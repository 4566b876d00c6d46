//! Run-to-completion dispatcher
//!
//! Owns the bus engine and all three active objects. Each wake drains every
//! queue in priority order (session manager, clock, commander), servicing
//! the bus between events. The software bus master finishes each phase
//! before returning, so its interrupt is always serviced here.

use defmt::*;
use static_cell::StaticCell;

use wordclock_core::clock::{ClockBuffers, ClockLinks, ClockSync};
use wordclock_core::command::{Commander, CommanderLinks};
use wordclock_core::config::{ClockConfig, SEED_LEN};
use wordclock_core::event::Scheduler;
use wordclock_core::twi::{SessionManager, TwiBus};

use crate::board::{BoardWatchdog, Console, Port};
use crate::channels::{BUS_QUEUE, CLOCK_QUEUE, COMMANDER_QUEUE, GATE, TRACE, WAKE};

static BUS: StaticCell<TwiBus<Port>> = StaticCell::new();

// Transfer buffers, owned by the clock controller's requests
static COMMAND_BUF: StaticCell<[u8; SEED_LEN]> = StaticCell::new();
static POINTER_BUF: StaticCell<[u8; 1]> = StaticCell::new();
static TIME_BUF: StaticCell<[u8; 3]> = StaticCell::new();

#[embassy_executor::task]
pub async fn dispatcher_task(port: Port, watchdog: BoardWatchdog, config: ClockConfig) {
    info!("Dispatcher task started");

    let bus: &'static TwiBus<Port> = BUS.init(TwiBus::new(port, &BUS_QUEUE));
    let mut manager = SessionManager::new(bus, &BUS_QUEUE);

    let links = ClockLinks {
        inbox: &CLOCK_QUEUE,
        bus: &BUS_QUEUE,
        gate: &GATE,
        trace: &TRACE,
    };
    let buffers = ClockBuffers {
        command: COMMAND_BUF.init([0; SEED_LEN]),
        pointer: POINTER_BUF.init([0; 1]),
        time: TIME_BUF.init([0; 3]),
    };
    let mut clock = unwrap!(ClockSync::new(config, links, buffers, Console, watchdog));

    let mut commander = Commander::new(
        CommanderLinks {
            inbox: &COMMANDER_QUEUE,
            clock: &CLOCK_QUEUE,
            trace: &TRACE,
        },
        Console,
    );

    let mut scheduler = Scheduler::new([&mut manager, &mut clock, &mut commander]);
    if let Err(fault) = scheduler.start() {
        crate::fatal(fault);
    }

    loop {
        match scheduler.run_until_idle(bus) {
            Ok(n) => trace!("dispatched {} events", n),
            Err(fault) => crate::fatal(fault),
        }
        WAKE.wait().await;
    }
}
