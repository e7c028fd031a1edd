//! Deferred-work signals between callback contexts and the main loop.
//!
//! Producers:
//! - the flush one-shot timer (`FlushDue`), from the esp_timer task
//! - the stream's RX write hook (`RxReady`), from the main loop
//!
//! The main loop is the only consumer.  Each [`Event`] is one bit in a
//! shared word: raising it is a single `fetch_or`, so any number of
//! producers on either core can signal at once and a raised event is
//! never lost.  Raising an already pending event coalesces with it.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ esp_timer cb │────▶│ pending bits │────▶│  Main Loop   │
//! │ RX write hook│────▶│ (fetch_or)   │     │  (swap to 0) │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// The stream's one-shot flush timer fired.
    FlushDue = 1 << 0,
    /// New bytes were appended to the RX accumulator.
    RxReady  = 1 << 1,
}

impl Event {
    /// Delivery order within one drain.
    const ALL: [Event; 2] = [Event::FlushDue, Event::RxReady];

    const fn bit(self) -> u8 {
        self as u8
    }
}

static PENDING: AtomicU8 = AtomicU8::new(0);

/// Raise `event`.  Safe from any task or core.
pub fn push_event(event: Event) {
    PENDING.fetch_or(event.bit(), Ordering::Release);
}

/// Hand every event pending right now to `handler`, each at most once.
///
/// Events raised while the handler runs are left for the next call, so a
/// handler that re-raises its own event cannot spin the loop.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    let bits = PENDING.swap(0, Ordering::Acquire);
    for event in Event::ALL {
        if bits & event.bit() != 0 {
            handler(event);
        }
    }
}

/// Serialises tests that touch the process-wide pending word.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drained() -> Vec<Event> {
        let mut seen = Vec::new();
        drain_events(|e| seen.push(e));
        seen
    }

    #[test]
    fn raised_events_are_delivered_once() {
        let _g = test_guard();
        drained();

        push_event(Event::RxReady);
        push_event(Event::FlushDue);
        assert_eq!(drained(), vec![Event::FlushDue, Event::RxReady]);
        assert!(drained().is_empty());
    }

    #[test]
    fn rx_flood_cannot_displace_flush_due() {
        let _g = test_guard();
        drained();

        push_event(Event::FlushDue);
        for _ in 0..1_000 {
            push_event(Event::RxReady);
        }
        assert_eq!(drained(), vec![Event::FlushDue, Event::RxReady]);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let _g = test_guard();
        drained();

        let timer = std::thread::spawn(|| {
            for _ in 0..10_000 {
                push_event(Event::FlushDue);
            }
        });
        let hook = std::thread::spawn(|| {
            for _ in 0..10_000 {
                push_event(Event::RxReady);
            }
        });
        timer.join().unwrap();
        hook.join().unwrap();

        assert_eq!(drained(), vec![Event::FlushDue, Event::RxReady]);
    }

    #[test]
    fn events_raised_by_the_handler_wait_for_the_next_drain() {
        let _g = test_guard();
        drained();

        push_event(Event::FlushDue);
        let mut calls = 0;
        drain_events(|e| {
            calls += 1;
            push_event(e);
        });
        assert_eq!(calls, 1);
        assert_eq!(drained(), vec![Event::FlushDue]);
    }
}
