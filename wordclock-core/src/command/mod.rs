//! Operator command interpreter
//!
//! Collects console characters into a line and runs it when a terminator
//! arrives. Commands are one word, case-insensitive:
//!
//! | Command | Action |
//! |---|---|
//! | `TRON` / `TROFF` | Turn transfer tracing on or off |
//! | `SET hh:mm:ss AM` | Set the RTC (12-hour, `AM` or `PM`) |
//! | `GET` | Read and print the time on the next second |
//! | `RESET` | Restart through the watchdog |

use core::fmt::{self, Write};

use heapless::Vec;

use crate::clock::{BcdError, ClockReading, HourMode, TimeOfDay};
use crate::config::COMMAND_LINE_LEN;
use crate::event::{ActiveObject, Event, Mailbox};
use crate::fault::Fault;
use crate::trace::TraceFlag;

const ESC: u8 = 0x1B;

/// A parsed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    TraceOn,
    TraceOff,
    Set(TimeOfDay),
    Get,
    Reset,
}

/// Why a line was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// First word is not a command
    Unknown,
    /// Command takes no arguments
    UnexpectedArgument,
    /// `SET` argument is not `hh:mm:ss AM` or `hh:mm:ss PM`
    TimeSyntax,
    /// `SET` fields out of range
    Time(BcdError),
}

impl From<BcdError> for CommandError {
    fn from(e: BcdError) -> Self {
        CommandError::Time(e)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown => f.write_str("unknown command"),
            CommandError::UnexpectedArgument => f.write_str("command takes no arguments"),
            CommandError::TimeSyntax => f.write_str("expected hh:mm:ss AM|PM"),
            CommandError::Time(e) => write!(f, "bad time: {}", e),
        }
    }
}

fn digits(pair: &[u8]) -> Option<u8> {
    match pair {
        [tens @ b'0'..=b'9', units @ b'0'..=b'9'] => Some((tens - b'0') * 10 + (units - b'0')),
        _ => None,
    }
}

/// Parse `hh:mm:ss AM` with fixed-width fields
pub fn parse_time(arg: &str) -> Result<TimeOfDay, CommandError> {
    let b = arg.as_bytes();
    if b.len() != 11 || b[2] != b':' || b[5] != b':' || b[8] != b' ' {
        return Err(CommandError::TimeSyntax);
    }
    let hours = digits(&b[0..2]).ok_or(CommandError::TimeSyntax)?;
    let minutes = digits(&b[3..5]).ok_or(CommandError::TimeSyntax)?;
    let seconds = digits(&b[6..8]).ok_or(CommandError::TimeSyntax)?;
    let marker = &b[9..11];
    let pm = if marker.eq_ignore_ascii_case(b"PM") {
        true
    } else if marker.eq_ignore_ascii_case(b"AM") {
        false
    } else {
        return Err(CommandError::TimeSyntax);
    };
    Ok(TimeOfDay::new(hours, minutes, seconds, HourMode::Twelve { pm })?)
}

/// Parse one command line
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, arg) = match line.split_once(' ') {
        Some((word, arg)) => (word, arg.trim()),
        None => (line, ""),
    };
    let bare = |command| {
        if arg.is_empty() {
            Ok(command)
        } else {
            Err(CommandError::UnexpectedArgument)
        }
    };

    if word.eq_ignore_ascii_case("TRON") {
        bare(Command::TraceOn)
    } else if word.eq_ignore_ascii_case("TROFF") {
        bare(Command::TraceOff)
    } else if word.eq_ignore_ascii_case("GET") {
        bare(Command::Get)
    } else if word.eq_ignore_ascii_case("RESET") {
        bare(Command::Reset)
    } else if word.eq_ignore_ascii_case("SET") {
        parse_time(arg).map(Command::Set)
    } else {
        Err(CommandError::Unknown)
    }
}

/// Queues and flags the interpreter talks to
#[derive(Clone, Copy)]
pub struct CommanderLinks {
    pub inbox: &'static dyn Mailbox,
    /// Clock controller queue, for set and get requests
    pub clock: &'static dyn Mailbox,
    pub trace: &'static TraceFlag,
}

/// Command interpreter active object
pub struct Commander<W> {
    links: CommanderLinks,
    out: W,
    line: Vec<u8, COMMAND_LINE_LEN>,
}

impl<W: Write> Commander<W> {
    pub fn new(links: CommanderLinks, out: W) -> Self {
        Self {
            links,
            out,
            line: Vec::new(),
        }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// Bytes collected so far
    pub fn pending(&self) -> &[u8] {
        &self.line
    }

    fn say(&mut self, text: &str) {
        let _ = self.out.write_str(text);
        let _ = self.out.write_str("\r\n");
    }

    fn on_char(&mut self, c: u8) -> Result<(), Fault> {
        match c {
            b'\r' | b'\n' | 0 => self.process(),
            ESC => {
                self.line.clear();
                Ok(())
            }
            _ => {
                // Never fails: a full line is processed below
                let _ = self.line.push(c);
                if self.line.len() >= COMMAND_LINE_LEN - 1 {
                    self.process()
                } else {
                    Ok(())
                }
            }
        }
    }

    fn process(&mut self) -> Result<(), Fault> {
        if self.line.is_empty() {
            return Ok(());
        }
        let line = core::mem::take(&mut self.line);
        let text = core::str::from_utf8(&line).unwrap_or("");
        let _ = write!(self.out, "Processing: \"{}\"\r\n", text);

        match parse_line(text) {
            Ok(command) => self.run(command),
            Err(CommandError::Unknown) => {
                self.say("unknown command");
                Ok(())
            }
            Err(e) => {
                let _ = write!(self.out, "{}\r\n", e);
                Ok(())
            }
        }
    }

    fn run(&mut self, command: Command) -> Result<(), Fault> {
        debug!("command {}", command);
        match command {
            Command::TraceOn => {
                self.say("Turning tracing on");
                self.links.trace.set(true);
            }
            Command::TraceOff => {
                self.say("Turning tracing off");
                self.links.trace.set(false);
            }
            Command::Set(time) => {
                self.say("Set time...");
                let registers = ClockReading::encode(time).registers();
                self.links.clock.post(Event::SetTime(registers))?;
            }
            Command::Get => {
                self.say("Get time...");
                self.links.clock.post(Event::GetTime)?;
            }
            Command::Reset => {
                self.say("Reset via watchdog...");
                return Err(Fault::ResetRequested);
            }
        }
        Ok(())
    }
}

impl<W: Write> ActiveObject for Commander<W> {
    fn name(&self) -> &'static str {
        "<commander>"
    }

    fn inbox(&self) -> &'static dyn Mailbox {
        self.links.inbox
    }

    fn start(&mut self) -> Result<(), Fault> {
        self.line.clear();
        self.say("commander ready");
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<(), Fault> {
        match event {
            Event::Char(c) => self.on_char(c),
            other => {
                trace!("<commander> ignoring {}", other.name());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use std::boxed::Box;
    use std::string::String;

    fn commander() -> (Commander<String>, &'static EventQueue<8>, &'static TraceFlag) {
        let inbox: &'static EventQueue<8> = Box::leak(Box::new(EventQueue::new("<commander>")));
        let clock: &'static EventQueue<8> = Box::leak(Box::new(EventQueue::new("<wordclock>")));
        let trace: &'static TraceFlag = Box::leak(Box::new(TraceFlag::new(false)));
        let links = CommanderLinks {
            inbox,
            clock,
            trace,
        };
        (Commander::new(links, String::new()), clock, trace)
    }

    fn type_line(commander: &mut Commander<String>, text: &str) -> Result<(), Fault> {
        for c in text.bytes() {
            commander.dispatch(Event::Char(c))?;
        }
        commander.dispatch(Event::Char(b'\r'))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("tron"), Ok(Command::TraceOn));
        assert_eq!(parse_line("TrOfF"), Ok(Command::TraceOff));
        assert_eq!(parse_line(" get "), Ok(Command::Get));
        assert_eq!(parse_line("reset now"), Err(CommandError::UnexpectedArgument));
        assert_eq!(parse_line("hello"), Err(CommandError::Unknown));
    }

    #[test]
    fn test_parse_set_time() {
        let expected = TimeOfDay::new(9, 30, 15, HourMode::Twelve { pm: true }).unwrap();
        assert_eq!(parse_line("SET 09:30:15 PM"), Ok(Command::Set(expected)));
        assert_eq!(parse_line("set 09:30:15 pm"), Ok(Command::Set(expected)));
    }

    #[test]
    fn test_set_time_is_strict() {
        assert_eq!(parse_time("9:30:15 PM"), Err(CommandError::TimeSyntax));
        assert_eq!(parse_time("09-30-15 PM"), Err(CommandError::TimeSyntax));
        assert_eq!(parse_time("09:30:15 XM"), Err(CommandError::TimeSyntax));
        assert_eq!(parse_time("09:3a:15 AM"), Err(CommandError::TimeSyntax));
        assert!(matches!(parse_time("00:30:15 AM"), Err(CommandError::Time(_))));
        assert!(matches!(parse_time("13:30:15 AM"), Err(CommandError::Time(_))));
        assert!(matches!(parse_time("12:60:15 AM"), Err(CommandError::Time(_))));
    }

    #[test]
    fn test_set_posts_bcd_registers() {
        let (mut commander, clock, _) = commander();
        type_line(&mut commander, "SET 11:45:00 PM").unwrap();
        match clock.fetch() {
            Some(Event::SetTime(registers)) => assert_eq!(registers, [0x00, 0x45, 0x71]),
            other => panic!("expected SetTime, got {:?}", other),
        }
        assert!(commander
            .output()
            .starts_with("Processing: \"SET 11:45:00 PM\"\r\nSet time...\r\n"));
    }

    #[test]
    fn test_trace_toggle() {
        let (mut commander, _, trace) = commander();
        type_line(&mut commander, "TRON").unwrap();
        assert!(trace.is_enabled());
        type_line(&mut commander, "troff").unwrap();
        assert!(!trace.is_enabled());
    }

    #[test]
    fn test_escape_clears_line() {
        let (mut commander, clock, _) = commander();
        for c in b"garbage" {
            commander.dispatch(Event::Char(*c)).unwrap();
        }
        commander.dispatch(Event::Char(0x1B)).unwrap();
        assert!(commander.pending().is_empty());
        type_line(&mut commander, "GET").unwrap();
        assert!(matches!(clock.fetch(), Some(Event::GetTime)));
    }

    #[test]
    fn test_empty_lines_are_ignored() {
        let (mut commander, _, _) = commander();
        commander.dispatch(Event::Char(b'\r')).unwrap();
        commander.dispatch(Event::Char(b'\n')).unwrap();
        assert!(commander.output().is_empty());
    }

    #[test]
    fn test_full_buffer_is_processed() {
        let (mut commander, _, _) = commander();
        for _ in 0..COMMAND_LINE_LEN - 1 {
            commander.dispatch(Event::Char(b'x')).unwrap();
        }
        assert!(commander.pending().is_empty());
        assert!(commander.output().ends_with("unknown command\r\n"));
    }

    #[test]
    fn test_reset_is_fatal() {
        let (mut commander, _, _) = commander();
        assert_eq!(
            type_line(&mut commander, "reset"),
            Err(Fault::ResetRequested)
        );
    }
}
