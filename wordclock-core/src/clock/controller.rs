//! Clock synchronisation controller
//!
//! Seeds the RTC once, then reads it on a countdown of 1 Hz ticks. Each
//! read reports how far the RTC is from a 5-second mark and the countdown
//! is adjusted so later reads land on it.
//!
//! ```text
//!            ┌──────────────┐  seed written  ┌─────────┐
//!  start ──▶ │ SettingClock │ ─────────────▶ │ Running │
//!            └──────────────┘                └─────────┘
//! ```
//!
//! Both states share the watchdog and fast-tick handling.

use core::fmt::{self, Write};

use wordclock_hal::Watchdog;

use super::bcd::ClockReading;
use super::drift;
use super::gate::PeriodicGate;
use crate::config::{ClockConfig, ConfigError, SEED_LEN};
use crate::event::{ActiveObject, Event, Mailbox};
use crate::fault::Fault;
use crate::trace::{self, TraceFlag};
use crate::twi::{
    DeviceAddress, ReplySignal, ReplyTo, RequestError, Session, TransferRequest,
};

/// Bytes of a set-time write: register pointer plus three registers
const SET_TIME_LEN: usize = 4;

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockState {
    /// Writing the seed registers
    SettingClock,
    /// Reading the RTC every few seconds
    Running,
}

/// Error building the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupError {
    Config(ConfigError),
    Request(RequestError),
}

impl From<ConfigError> for SetupError {
    fn from(e: ConfigError) -> Self {
        SetupError::Config(e)
    }
}

impl From<RequestError> for SetupError {
    fn from(e: RequestError) -> Self {
        SetupError::Request(e)
    }
}

/// Queues and flags the controller talks to
#[derive(Clone, Copy)]
pub struct ClockLinks {
    /// The controller's own queue; replies come back here
    pub inbox: &'static dyn Mailbox,
    /// Session manager queue
    pub bus: &'static dyn Mailbox,
    /// 1 Hz delivery gate, opened when running
    pub gate: &'static PeriodicGate,
    pub trace: &'static TraceFlag,
}

/// Transfer buffers, owned by the controller's requests
pub struct ClockBuffers {
    /// Seed and set-time writes, at least 9 bytes
    pub command: &'static mut [u8],
    /// Register pointer write, at least 1 byte
    pub pointer: &'static mut [u8],
    /// Time read, at least 3 bytes
    pub time: &'static mut [u8],
}

/// The clock controller active object
///
/// `W` receives operator-facing lines; `D` is fed on every watchdog event.
pub struct ClockSync<W, D> {
    state: ClockState,
    links: ClockLinks,
    config: ClockConfig,
    out: W,
    watchdog: D,
    // Each request is `None` while it is out on the bus
    command: Option<TransferRequest>,
    pointer: Option<TransferRequest>,
    time: Option<TransferRequest>,
    countdown: u8,
    fast_ticks: u8,
    since_report: u16,
    reply_timer: Option<u8>,
    report_next: bool,
}

impl<W: Write, D: Watchdog> ClockSync<W, D> {
    pub fn new(
        config: ClockConfig,
        links: ClockLinks,
        buffers: ClockBuffers,
        out: W,
        watchdog: D,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let rtc = DeviceAddress::new(config.rtc_address)
            .ok_or(ConfigError::InvalidAddress(config.rtc_address))?;

        let command = TransferRequest::write(
            ReplyTo::new(links.inbox, ReplySignal::Reply),
            rtc,
            buffers.command,
            SEED_LEN,
        )?;
        let pointer = TransferRequest::write(
            ReplyTo::new(links.inbox, ReplySignal::Reply1),
            rtc,
            buffers.pointer,
            1,
        )?;
        let time = TransferRequest::read(
            ReplyTo::new(links.inbox, ReplySignal::Reply2),
            rtc,
            buffers.time,
            3,
        )?;

        Ok(Self {
            state: ClockState::SettingClock,
            links,
            config,
            out,
            watchdog,
            command: Some(command),
            pointer: Some(pointer),
            time: Some(time),
            countdown: config.poll_interval_s,
            fast_ticks: 0,
            since_report: 0,
            reply_timer: None,
            report_next: false,
        })
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Ticks left before the next read
    pub fn countdown(&self) -> u8 {
        self.countdown
    }

    /// Check if a read is in flight and its timer is running
    pub fn awaiting_read(&self) -> bool {
        self.reply_timer.is_some()
    }

    /// Console sink
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    fn tracing(&self) -> bool {
        self.links.trace.is_enabled()
    }

    /// Write one console line; console errors are not the clock's problem
    fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_str("\r\n");
    }

    fn submit(&self, session: Session) -> Result<(), Fault> {
        self.links.bus.post(Event::TwiRequest(session))
    }

    fn trace_transfer(&mut self, label: &str, request: &TransferRequest) {
        if self.tracing() {
            let _ = trace::write_transfer(&mut self.out, label, request);
        }
    }

    // State machine plumbing

    fn transition(&mut self, target: ClockState) -> Result<(), Fault> {
        self.exit();
        debug!("<wordclock> {} -> {}", self.state, target);
        self.state = target;
        self.enter()
    }

    fn enter(&mut self) -> Result<(), Fault> {
        match self.state {
            ClockState::SettingClock => {
                info!("setting clock");
                let Some(mut command) = self.command.take() else {
                    // Still out on the bus; the reply moves us on
                    return Ok(());
                };
                let seed = self.config.seed.registers();
                command.buffer_mut()[..SEED_LEN].copy_from_slice(&seed);
                if let Err(e) = command.set_len(SEED_LEN) {
                    warn!("seed does not fit: {}", e);
                    self.command = Some(command);
                    return Ok(());
                }
                self.submit(Session::single(command))
            }
            ClockState::Running => {
                self.links.gate.set(true);
                self.line(format_args!("Running... RTC SQW interrupts on"));
                Ok(())
            }
        }
    }

    fn exit(&mut self) {
        if self.state == ClockState::SettingClock {
            self.countdown = self.config.poll_interval_s;
        }
    }

    /// Handling shared by every state; returns events it did not consume
    fn common(&mut self, event: Event) -> Result<Option<Event>, Fault> {
        match event {
            Event::Watchdog => {
                self.watchdog.feed();
                Ok(None)
            }
            Event::Tick20th => {
                self.fast_ticks += 1;
                if self.fast_ticks >= self.config.fast_tick_hz {
                    self.fast_ticks = 0;
                    trace!("<wordclock> heartbeat");
                }
                if let Some(ticks) = self.reply_timer {
                    let ticks = ticks.saturating_sub(1);
                    if ticks == 0 {
                        self.reply_timer = None;
                        self.links.inbox.post(Event::ReplyTimeout)?;
                    } else {
                        self.reply_timer = Some(ticks);
                    }
                }
                Ok(None)
            }
            other => Ok(Some(other)),
        }
    }

    fn setting_clock(&mut self, event: Event) -> Result<Option<Event>, Fault> {
        match event {
            Event::TwiReply(request) => {
                let status = request.status();
                self.trace_transfer("seed", &request);
                self.command = Some(request);
                if !status.is_ok() {
                    // Keep going: the RTC may still be running from before
                    self.line(format_args!("RTC seed failed: {}", status));
                }
                self.transition(ClockState::Running)?;
                Ok(None)
            }
            other => Ok(Some(other)),
        }
    }

    fn running(&mut self, event: Event) -> Result<Option<Event>, Fault> {
        match event {
            Event::Tick1s => self.on_second()?,
            Event::TwiReply1(request) => {
                self.trace_transfer("pointer", &request);
                self.pointer = Some(request);
            }
            Event::TwiReply2(request) => self.on_time_read(request)?,
            Event::TwiReply(request) => {
                let status = request.status();
                self.trace_transfer("set", &request);
                self.command = Some(request);
                if !status.is_ok() {
                    self.line(format_args!("set time failed: {}", status));
                }
            }
            Event::SetTime(registers) => self.set_time(registers)?,
            Event::GetTime => {
                self.report_next = true;
                self.countdown = 1;
            }
            Event::ReplyTimeout => {
                self.line(format_args!("RTC read timed out"));
            }
            other => return Ok(Some(other)),
        }
        Ok(None)
    }

    fn on_second(&mut self) -> Result<(), Fault> {
        if self.tracing() {
            self.line(format_args!("WC 1S"));
        }
        self.since_report = self.since_report.saturating_add(1);
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return Ok(());
        }

        let (Some(mut pointer), Some(mut time)) = (self.pointer.take(), self.time.take()) else {
            // Previous read not back yet; try again next second
            debug!("<wordclock> read still in flight");
            self.countdown = 1;
            return Ok(());
        };
        pointer.buffer_mut()[0] = 0x00;
        pointer.reset();
        time.reset();
        self.submit(Session::chained(pointer, time))?;
        self.reply_timer = Some(self.config.reply_timeout_ticks);
        Ok(())
    }

    fn on_time_read(&mut self, request: TransferRequest) -> Result<(), Fault> {
        self.reply_timer = None;
        let status = request.status();
        let reading = if status.is_ok() {
            ClockReading::from_slice(request.bytes()).ok()
        } else {
            None
        };
        self.trace_transfer("time", &request);
        self.time = Some(request);

        let Some(reading) = reading else {
            if !status.is_ok() {
                warn!("time read failed: {}", status);
            }
            self.countdown = self.config.poll_interval_s;
            return Ok(());
        };

        if self.tracing() {
            let _ = self.out.write_str("RTC ");
            let _ = trace::write_hex(&mut self.out, &reading.registers());
            if reading.is_halted() {
                self.line(format_args!(" clock disabled"));
            } else {
                self.line(format_args!(" time={}", reading));
            }
        }

        let five_minutes = reading.is_five_minute_mark();
        if five_minutes {
            self.since_report = 0;
        }
        if self.report_next || (five_minutes && !self.tracing()) {
            self.report_next = false;
            if reading.is_halted() {
                self.line(format_args!("time=clock disabled"));
            } else {
                self.line(format_args!("time={}", reading));
            }
        }

        let diff = reading.drift_correction();
        if diff != 0 {
            let since = self.since_report;
            self.line(format_args!(
                "-- diff = {} at {} interval = {}",
                diff, reading, since
            ));
        }
        self.countdown = drift::next_countdown(self.config.poll_interval_s, diff)?;
        Ok(())
    }

    fn set_time(&mut self, registers: [u8; 3]) -> Result<(), Fault> {
        let Some(mut command) = self.command.take() else {
            self.line(format_args!("set time busy"));
            return Ok(());
        };
        let buf = command.buffer_mut();
        buf[0] = 0x00;
        buf[1..SET_TIME_LEN].copy_from_slice(&registers);
        if let Err(e) = command.set_len(SET_TIME_LEN) {
            warn!("set time does not fit: {}", e);
            self.command = Some(command);
            return Ok(());
        }
        self.submit(Session::single(command))
    }

    /// A request came back in a state that did not expect it
    fn stray(&mut self, event: Event) {
        let (signal, request) = match event {
            Event::TwiReply(r) => (ReplySignal::Reply, r),
            Event::TwiReply1(r) => (ReplySignal::Reply1, r),
            Event::TwiReply2(r) => (ReplySignal::Reply2, r),
            other => {
                trace!("<wordclock> ignoring {}", other.name());
                return;
            }
        };
        warn!("<wordclock> unexpected {} in {}", signal, self.state);
        self.trace_transfer("stray", &request);
        let slot = match signal {
            ReplySignal::Reply => &mut self.command,
            ReplySignal::Reply1 => &mut self.pointer,
            ReplySignal::Reply2 => &mut self.time,
        };
        *slot = Some(request);
    }
}

impl<W: Write, D: Watchdog> ActiveObject for ClockSync<W, D> {
    fn name(&self) -> &'static str {
        "<wordclock>"
    }

    fn inbox(&self) -> &'static dyn Mailbox {
        self.links.inbox
    }

    fn start(&mut self) -> Result<(), Fault> {
        self.state = ClockState::SettingClock;
        self.links.gate.set(false);
        self.enter()
    }

    fn dispatch(&mut self, event: Event) -> Result<(), Fault> {
        let Some(event) = self.common(event)? else {
            return Ok(());
        };
        let unhandled = match self.state {
            ClockState::SettingClock => self.setting_clock(event)?,
            ClockState::Running => self.running(event)?,
        };
        if let Some(event) = unhandled {
            self.stray(event);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use crate::twi::TransferStatus;
    use std::boxed::Box;
    use std::string::String;
    use std::vec;

    struct CountingWatchdog(u32);

    impl Watchdog for CountingWatchdog {
        fn feed(&mut self) {
            self.0 += 1;
        }
    }

    struct Rig {
        clock: ClockSync<String, CountingWatchdog>,
        inbox: &'static EventQueue<8>,
        bus: &'static EventQueue<8>,
        gate: &'static PeriodicGate,
        trace: &'static TraceFlag,
    }

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    fn buf(len: usize) -> &'static mut [u8] {
        Box::leak(vec![0u8; len].into_boxed_slice())
    }

    fn rig() -> Rig {
        let inbox = leak(EventQueue::new("<wordclock>"));
        let bus = leak(EventQueue::new("<twi>"));
        let gate = leak(PeriodicGate::new());
        let trace = leak(TraceFlag::new(false));
        let clock = ClockSync::new(
            ClockConfig::default(),
            ClockLinks {
                inbox,
                bus,
                gate,
                trace,
            },
            ClockBuffers {
                command: buf(9),
                pointer: buf(1),
                time: buf(3),
            },
            String::new(),
            CountingWatchdog(0),
        )
        .unwrap();
        Rig {
            clock,
            inbox,
            bus,
            gate,
            trace,
        }
    }

    /// Pull the next session off the bus queue
    fn take_session(bus: &EventQueue<8>) -> Session {
        match bus.fetch() {
            Some(Event::TwiRequest(session)) => session,
            other => panic!("expected a bus request, got {:?}", other),
        }
    }

    /// Complete a request as the bus would, filling read data
    fn complete(mut request: TransferRequest, data: &[u8], status: TransferStatus) -> Event {
        for &byte in data {
            request.store_incoming(byte);
        }
        while request.next_outgoing().is_some() {
            request.ack_outgoing();
        }
        request.finish(status);
        request.reply_to().signal.into_event(request)
    }

    fn boot(rig: &mut Rig) {
        rig.clock.start().unwrap();
        let (seed, _) = take_session(rig.bus).into_slots();
        rig.clock
            .dispatch(complete(seed, &[], TransferStatus::Ok))
            .unwrap();
    }

    /// Run seconds until a read goes out, answer it with `registers`
    fn read_cycle(rig: &mut Rig, registers: [u8; 3]) {
        while rig.bus.is_empty() {
            rig.clock.dispatch(Event::Tick1s).unwrap();
        }
        let (pointer, time) = take_session(rig.bus).into_slots();
        let time = time.unwrap();
        rig.clock
            .dispatch(complete(pointer, &[], TransferStatus::Ok))
            .unwrap();
        rig.clock
            .dispatch(complete(time, &registers, TransferStatus::Ok))
            .unwrap();
    }

    #[test]
    fn test_cold_boot_seeds_then_runs() {
        let mut rig = rig();
        rig.clock.start().unwrap();
        assert_eq!(rig.clock.state(), ClockState::SettingClock);
        assert!(!rig.gate.is_enabled());

        let (seed, second) = take_session(rig.bus).into_slots();
        assert!(second.is_none());
        assert_eq!(seed.requested(), 9);

        rig.clock
            .dispatch(complete(seed, &[], TransferStatus::Ok))
            .unwrap();
        assert_eq!(rig.clock.state(), ClockState::Running);
        assert!(rig.gate.is_enabled());
        assert_eq!(rig.clock.countdown(), 5);
        assert!(rig.clock.output().contains("Running... RTC SQW interrupts on\r\n"));
    }

    #[test]
    fn test_seed_failure_still_runs() {
        let mut rig = rig();
        rig.clock.start().unwrap();
        let (seed, _) = take_session(rig.bus).into_slots();
        rig.clock
            .dispatch(complete(seed, &[], TransferStatus::Protocol(0x20)))
            .unwrap();
        assert_eq!(rig.clock.state(), ClockState::Running);
        assert!(rig.clock.output().contains("RTC seed failed: 0x20"));
    }

    #[test]
    fn test_read_every_fifth_second() {
        let mut rig = rig();
        boot(&mut rig);
        for _ in 0..4 {
            rig.clock.dispatch(Event::Tick1s).unwrap();
            assert!(rig.bus.is_empty());
        }
        rig.clock.dispatch(Event::Tick1s).unwrap();
        let (pointer, time) = take_session(rig.bus).into_slots();
        assert_eq!(pointer.requested(), 1);
        assert_eq!(pointer.bytes(), &[] as &[u8]);
        assert_eq!(time.unwrap().requested(), 3);
        assert!(rig.clock.awaiting_read());
    }

    #[test]
    fn test_on_the_mark_keeps_interval() {
        let mut rig = rig();
        boot(&mut rig);
        read_cycle(&mut rig, [0x00, 0x01, 0x12]);
        assert_eq!(rig.clock.countdown(), 5);
        assert!(!rig.clock.awaiting_read());
    }

    #[test]
    fn test_two_seconds_early_shortens_countdown() {
        let mut rig = rig();
        boot(&mut rig);
        read_cycle(&mut rig, [0x58, 0x01, 0x12]);
        assert_eq!(rig.clock.countdown(), 3);
        assert!(rig
            .clock
            .output()
            .contains("-- diff = 2 at 12:01:58 (24) interval = 5\r\n"));
    }

    #[test]
    fn test_five_minute_mark_is_reported() {
        let mut rig = rig();
        boot(&mut rig);
        read_cycle(&mut rig, [0x00, 0x05, 0x66]);
        assert!(rig.clock.output().ends_with("time=6:05:00 PM\r\n"));

        // Not on a five-minute mark: nothing printed
        let before = rig.clock.output().len();
        read_cycle(&mut rig, [0x05, 0x05, 0x66]);
        assert_eq!(rig.clock.output().len(), before);
    }

    #[test]
    fn test_get_time_forces_report() {
        let mut rig = rig();
        boot(&mut rig);
        rig.clock.dispatch(Event::GetTime).unwrap();
        assert_eq!(rig.clock.countdown(), 1);
        read_cycle(&mut rig, [0x85, 0x02, 0x12]);
        assert!(rig.clock.output().ends_with("time=clock disabled\r\n"));
    }

    #[test]
    fn test_failed_read_waits_full_interval() {
        let mut rig = rig();
        boot(&mut rig);
        while rig.bus.is_empty() {
            rig.clock.dispatch(Event::Tick1s).unwrap();
        }
        let (pointer, time) = take_session(rig.bus).into_slots();
        rig.clock
            .dispatch(complete(pointer, &[], TransferStatus::Protocol(0x20)))
            .unwrap();
        rig.clock
            .dispatch(complete(time.unwrap(), &[], TransferStatus::Skipped))
            .unwrap();
        assert_eq!(rig.clock.countdown(), 5);
    }

    #[test]
    fn test_second_tick_while_read_in_flight() {
        let mut rig = rig();
        boot(&mut rig);
        rig.clock.dispatch(Event::GetTime).unwrap();
        rig.clock.dispatch(Event::Tick1s).unwrap();
        let _outstanding = take_session(rig.bus);
        rig.clock.dispatch(Event::GetTime).unwrap();
        rig.clock.dispatch(Event::Tick1s).unwrap();
        assert!(rig.bus.is_empty());
        assert_eq!(rig.clock.countdown(), 1);
    }

    #[test]
    fn test_reply_timeout() {
        let mut rig = rig();
        boot(&mut rig);
        rig.clock.dispatch(Event::GetTime).unwrap();
        rig.clock.dispatch(Event::Tick1s).unwrap();
        for _ in 0..30 {
            rig.clock.dispatch(Event::Tick20th).unwrap();
        }
        assert!(matches!(rig.inbox.fetch(), Some(Event::ReplyTimeout)));
        rig.clock.dispatch(Event::ReplyTimeout).unwrap();
        assert!(rig.clock.output().ends_with("RTC read timed out\r\n"));
    }

    #[test]
    fn test_set_time_writes_registers() {
        let mut rig = rig();
        boot(&mut rig);
        rig.clock.dispatch(Event::SetTime([0x30, 0x15, 0x49])).unwrap();
        let (mut write, _) = take_session(rig.bus).into_slots();
        assert_eq!(write.requested(), 4);
        let mut sent = [0u8; 4];
        for byte in sent.iter_mut() {
            *byte = write.next_outgoing().unwrap();
            write.ack_outgoing();
        }
        assert_eq!(sent, [0x00, 0x30, 0x15, 0x49]);
        assert_eq!(write.reply_to().signal, ReplySignal::Reply);
    }

    #[test]
    fn test_watchdog_is_fed() {
        let mut rig = rig();
        rig.clock.dispatch(Event::Watchdog).unwrap();
        rig.clock.dispatch(Event::Watchdog).unwrap();
        assert_eq!(rig.clock.watchdog.0, 2);
    }

    #[test]
    fn test_tracing_adds_transfer_lines() {
        let mut rig = rig();
        boot(&mut rig);
        rig.trace.set(true);
        read_cycle(&mut rig, [0x00, 0x00, 0x12]);
        let out = rig.clock.output();
        assert!(out.contains("WC 1S\r\n"));
        assert!(out.contains("TWI time addr=0xD1(r) n=3/3 status: ok\r\n"));
        assert!(out.contains("RTC 00,00,12 time=12:00:00 (24)\r\n"));
    }
}
