//!
//! Events
//!
//! A signaled flag threads can block on. Two reset modes:
//!
//! - **manual-reset**: `set` leaves the event signaled until `reset`; every
//!   current and future waiter succeeds in the meantime
//! - **auto-reset**: a successful `wait` consumes the signal, so each `set`
//!   lets exactly one waiter through; which one is unspecified
//!
//! `check` reads the state without consuming it. `wait(0)` polls through the
//! regular wait path and does consume an auto-reset signal.
//!
//! Failures from the native layer come back as `false`, never as panics.
//!

use crate::sync_object::SyncObject;
use crate::sys::RawSignal;

pub struct Event {
    sync: SyncObject,
    manual_reset: bool,
}

impl Event {
    pub fn new(manual_reset: bool) -> Self {
        Self {
            sync: SyncObject::new(manual_reset),
            manual_reset,
        }
    }

    pub fn manual() -> Self {
        Self::new(true)
    }

    pub fn auto() -> Self {
        Self::new(false)
    }

    pub fn is_manual_reset(&self) -> bool {
        self.manual_reset
    }

    pub fn is_usable(&self) -> bool {
        self.sync.is_usable()
    }

    pub fn sync_object(&self) -> &SyncObject {
        &self.sync
    }

    /// Signals the event and wakes at least one waiter.
    pub fn set(&self) -> bool {
        self.sync.signal().is_some_and(|signal| signal.set())
    }

    /// Clears the event; returns whether it was signaled.
    pub fn reset(&self) -> bool {
        self.sync.signal().is_some_and(|signal| signal.reset())
    }

    pub fn check(&self) -> bool {
        self.sync.signal().is_some_and(|signal| signal.check())
    }

    pub fn wait(&self, timeout_ms: u32) -> bool {
        self.sync.wait(timeout_ms)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("manual_reset", &self.manual_reset)
            .field("usable", &self.is_usable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};
    use strand_core::WAIT_INFINITE;

    #[test]
    fn test_event_starts_unsignaled() {
        let event = Event::auto();
        assert!(event.is_usable());
        assert!(!event.check());
        assert!(!event.wait(0));
    }

    #[test]
    fn test_manual_reset_stays_signaled() {
        let event = Event::manual();
        assert!(event.set());
        assert!(event.wait(0));
        assert!(event.wait(0));
        assert!(event.check());

        assert!(event.reset());
        assert!(!event.check());
        assert!(!event.wait(0));
        assert!(!event.reset());
    }

    #[test]
    fn test_auto_reset_consumed_by_wait() {
        let event = Event::auto();
        event.set();
        assert!(event.check());
        assert!(event.check(), "check must not consume the signal");
        assert!(event.wait(0));
        assert!(!event.wait(0));
        assert!(!event.check());
    }

    #[test]
    fn test_set_before_wait_is_not_lost() {
        let event = Arc::new(Event::auto());
        event.set();
        let e = Arc::clone(&event);
        let handle = thread::spawn(move || e.wait(WAIT_INFINITE));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_wait_times_out() {
        let event = Event::manual();
        let start = Instant::now();
        assert!(!event.wait(30));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_set_wakes_blocked_waiter() {
        let event = Arc::new(Event::auto());
        let woke = Arc::new(AtomicUsize::new(0));

        let handle = {
            let event = Arc::clone(&event);
            let woke = Arc::clone(&woke);
            thread::spawn(move || {
                if event.wait(5_000) {
                    woke.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert_eq!(woke.load(Ordering::SeqCst), 0);
        event.set();
        handle.join().unwrap();
        assert_eq!(woke.load(Ordering::SeqCst), 1);
    }
}
