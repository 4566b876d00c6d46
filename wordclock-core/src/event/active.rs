//! Active objects and the run-to-completion scheduler

use super::queue::Mailbox;
use super::signals::Event;
use crate::fault::Fault;

/// A state machine with its own event queue
pub trait ActiveObject {
    /// Name for logs
    fn name(&self) -> &'static str;

    /// The queue this object consumes
    fn inbox(&self) -> &'static dyn Mailbox;

    /// Run the initial transition
    fn start(&mut self) -> Result<(), Fault> {
        Ok(())
    }

    /// Handle one event to completion
    fn dispatch(&mut self, event: Event) -> Result<(), Fault>;
}

/// Source of hardware interrupts that must be serviced between events
///
/// On a board with a real bus interrupt the handler does this work itself;
/// polled ports and host tests call it from the main loop instead.
pub trait InterruptSource {
    /// Service one pending interrupt, returning whether there was one
    fn service_pending(&self) -> Result<bool, Fault>;
}

/// Cooperative scheduler over a fixed set of active objects
///
/// Objects are listed highest priority first. Each step dispatches a single
/// event to the first object with a non-empty queue.
pub struct Scheduler<'a, const N: usize> {
    actors: [&'a mut dyn ActiveObject; N],
}

impl<'a, const N: usize> Scheduler<'a, N> {
    /// Create a scheduler, highest priority first
    pub fn new(actors: [&'a mut dyn ActiveObject; N]) -> Self {
        Self { actors }
    }

    /// Run every object's initial transition, in priority order
    pub fn start(&mut self) -> Result<(), Fault> {
        for actor in self.actors.iter_mut() {
            debug!("starting {}", actor.name());
            actor.start()?;
        }
        Ok(())
    }

    /// Dispatch one event
    ///
    /// Returns `Ok(false)` when every queue is empty.
    pub fn step(&mut self) -> Result<bool, Fault> {
        for actor in self.actors.iter_mut() {
            if let Some(event) = actor.inbox().fetch() {
                trace!("{} <- {}", actor.name(), event.name());
                actor.dispatch(event)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Dispatch events and service interrupts until both run dry
    ///
    /// Pending interrupts are always serviced before the next event, the
    /// way a hardware interrupt would preempt the main loop. Returns the
    /// number of events dispatched.
    pub fn run_until_idle(&mut self, irq: &dyn InterruptSource) -> Result<usize, Fault> {
        let mut dispatched = 0;
        loop {
            while irq.service_pending()? {}
            if !self.step()? {
                return Ok(dispatched);
            }
            dispatched += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventQueue;
    use std::boxed::Box;
    use std::vec::Vec;

    struct Recorder {
        name: &'static str,
        inbox: &'static EventQueue<4>,
        seen: Vec<&'static str>,
    }

    impl ActiveObject for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn inbox(&self) -> &'static dyn Mailbox {
            self.inbox
        }

        fn dispatch(&mut self, event: Event) -> Result<(), Fault> {
            self.seen.push(event.name());
            Ok(())
        }
    }

    struct NoInterrupts;

    impl InterruptSource for NoInterrupts {
        fn service_pending(&self) -> Result<bool, Fault> {
            Ok(false)
        }
    }

    fn recorder(name: &'static str) -> Recorder {
        Recorder {
            name,
            inbox: Box::leak(Box::new(EventQueue::new(name))),
            seen: Vec::new(),
        }
    }

    #[test]
    fn test_priority_order() {
        let mut high = recorder("high");
        let mut low = recorder("low");
        low.inbox.post(Event::Tick1s).unwrap();
        high.inbox.post(Event::Tick20th).unwrap();

        let mut scheduler = Scheduler::new([&mut high, &mut low]);
        assert!(scheduler.step().unwrap());
        assert!(scheduler.step().unwrap());
        assert!(!scheduler.step().unwrap());
        drop(scheduler);

        assert_eq!(high.seen, ["TICK_20TH"]);
        assert_eq!(low.seen, ["TICK_1S"]);
    }

    #[test]
    fn test_run_until_idle_counts_events() {
        let mut only = recorder("only");
        only.inbox.post(Event::Watchdog).unwrap();
        only.inbox.post(Event::GetTime).unwrap();

        let mut scheduler = Scheduler::new([&mut only]);
        assert_eq!(scheduler.run_until_idle(&NoInterrupts).unwrap(), 2);
    }
}
