//! Interrupt-safe event queues
//!
//! A queue is a fixed-capacity deque behind a critical-section mutex, so it
//! can be posted to from interrupt handlers and drained from the main loop.
//! A full queue is reported to the poster as a [`Fault`]; events are never
//! dropped silently.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use super::signals::Event;
use crate::fault::Fault;

/// Something events can be posted to
///
/// Requests carry a `&'static dyn Mailbox` naming who gets the completion,
/// so queues of different depths can own requests.
pub trait Mailbox: Sync {
    /// Queue name, used in overflow reports
    fn name(&self) -> &'static str;

    /// Append an event without blocking
    ///
    /// Safe to call from interrupt context.
    fn post(&self, event: Event) -> Result<(), Fault>;

    /// Take the oldest event, if any
    fn fetch(&self) -> Option<Event>;

    /// Number of events waiting
    fn len(&self) -> usize;

    /// Check if no events are waiting
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named fixed-capacity event queue
pub struct EventQueue<const N: usize> {
    name: &'static str,
    events: Mutex<RefCell<Deque<Event, N>>>,
}

impl<const N: usize> EventQueue<N> {
    /// Create an empty queue
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            events: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Maximum number of events the queue holds
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Discard every waiting event
    pub fn clear(&self) {
        critical_section::with(|cs| self.events.borrow_ref_mut(cs).clear());
    }
}

impl<const N: usize> Mailbox for EventQueue<N> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn post(&self, event: Event) -> Result<(), Fault> {
        critical_section::with(|cs| {
            self.events
                .borrow_ref_mut(cs)
                .push_back(event)
                .map_err(|_| Fault::QueueOverflow { queue: self.name })
        })
    }

    fn fetch(&self) -> Option<Event> {
        critical_section::with(|cs| self.events.borrow_ref_mut(cs).pop_front())
    }

    fn len(&self) -> usize {
        critical_section::with(|cs| self.events.borrow_ref(cs).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue: EventQueue<4> = EventQueue::new("test");
        queue.post(Event::Tick1s).unwrap();
        queue.post(Event::Char(b'a')).unwrap();

        assert_eq!(queue.len(), 2);
        assert!(matches!(queue.fetch(), Some(Event::Tick1s)));
        assert!(matches!(queue.fetch(), Some(Event::Char(b'a'))));
        assert!(queue.fetch().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_is_reported_not_dropped() {
        let queue: EventQueue<2> = EventQueue::new("tiny");
        queue.post(Event::Tick20th).unwrap();
        queue.post(Event::Tick20th).unwrap();

        let result = queue.post(Event::Tick1s);
        assert_eq!(result, Err(Fault::QueueOverflow { queue: "tiny" }));

        // Earlier events are untouched
        assert_eq!(queue.len(), 2);
        assert!(matches!(queue.fetch(), Some(Event::Tick20th)));
    }

    #[test]
    fn test_clear() {
        let queue: EventQueue<4> = EventQueue::new("test");
        queue.post(Event::Watchdog).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.capacity(), 4);
    }
}
