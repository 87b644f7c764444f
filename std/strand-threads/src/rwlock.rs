//!
//! Blocking Reader/Writer Lock
//!
//! Built from a `FastMutex` guarding three counters and two events:
//!
//! - `can_read` (manual-reset): opened when the last writer leaves and
//!   readers are queued, closed whenever a writer arrives
//! - `can_write` (auto-reset): hands the lock to exactly one queued writer,
//!   either from the last departing reader or from the previous writer
//!
//! `writers` counts the active writer plus every queued one. A reader that
//! finds `writers != 0` queues as a pending reader, so once a writer is
//! waiting, newly arriving readers line up behind it instead of cutting in.
//! Waiting writers are not served in FIFO order.
//!
//! The lock is not reentrant: a thread holding it for write that asks for
//! read (or write) again blocks forever.
//!
//! Usage:
//! ```rust,ignore
//! let lock = RWLock::new();
//! {
//!     let _r = lock.read();
//!     // shared section
//! }
//! lock.lock_for_write();
//! // exclusive section
//! lock.unlock_write();
//! ```
//!

use std::sync::atomic::{AtomicU32, Ordering};

use strand_core::WAIT_INFINITE;

use crate::event::Event;
use crate::mutex::FastMutex;

pub struct RWLock {
    mutex: FastMutex,
    can_write: Event,
    can_read: Event,
    // Only touched with `mutex` held.
    active_readers: AtomicU32,
    writers: AtomicU32,
    pending_readers: AtomicU32,
}

impl RWLock {
    pub fn new() -> Self {
        Self {
            mutex: FastMutex::new(),
            can_write: Event::auto(),
            can_read: Event::manual(),
            active_readers: AtomicU32::new(0),
            writers: AtomicU32::new(0),
            pending_readers: AtomicU32::new(0),
        }
    }

    pub fn lock_for_read(&self) {
        self.mutex.lock();
        if self.writers.load(Ordering::Relaxed) != 0 {
            self.wait_for_read();
        }
        self.active_readers.fetch_add(1, Ordering::Relaxed);
        self.mutex.unlock();
    }

    /// Called with `mutex` held; returns with it held and no writers left.
    fn wait_for_read(&self) {
        self.pending_readers.fetch_add(1, Ordering::Relaxed);
        loop {
            self.mutex.unlock();
            self.can_read.wait(WAIT_INFINITE);
            self.mutex.lock();
            if self.writers.load(Ordering::Relaxed) == 0 {
                break;
            }
        }
        self.pending_readers.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn unlock_read(&self) {
        self.mutex.lock();
        let readers = self.active_readers.load(Ordering::Relaxed);
        if readers == 0 {
            self.mutex.unlock();
            panic!("unlock_read on an RWLock with no active readers");
        }
        self.active_readers.store(readers - 1, Ordering::Relaxed);
        if readers == 1 && self.writers.load(Ordering::Relaxed) != 0 {
            self.can_write.set();
        }
        self.mutex.unlock();
    }

    pub fn lock_for_write(&self) {
        self.mutex.lock();
        let must_wait = self.writers.load(Ordering::Relaxed) != 0
            || self.active_readers.load(Ordering::Relaxed) != 0;
        self.writers.fetch_add(1, Ordering::Relaxed);
        self.can_read.reset();
        self.mutex.unlock();

        if must_wait {
            self.can_write.wait(WAIT_INFINITE);
        }
    }

    pub fn unlock_write(&self) {
        self.mutex.lock();
        let writers = self.writers.load(Ordering::Relaxed);
        if writers == 0 {
            self.mutex.unlock();
            panic!("unlock_write on an RWLock with no writer");
        }
        self.writers.store(writers - 1, Ordering::Relaxed);
        if writers == 1 {
            if self.pending_readers.load(Ordering::Relaxed) != 0 {
                self.can_read.set();
            }
        } else {
            self.can_write.set();
        }
        self.mutex.unlock();
    }

    pub fn read(&self) -> ReadGuard<'_> {
        self.lock_for_read();
        ReadGuard { lock: self }
    }

    pub fn write(&self) -> WriteGuard<'_> {
        self.lock_for_write();
        WriteGuard { lock: self }
    }

    pub fn active_readers(&self) -> u32 {
        self.counter(&self.active_readers)
    }

    /// The active writer plus every queued one.
    pub fn writers(&self) -> u32 {
        self.counter(&self.writers)
    }

    pub fn pending_readers(&self) -> u32 {
        self.counter(&self.pending_readers)
    }

    fn counter(&self, counter: &AtomicU32) -> u32 {
        let _guard = self.mutex.guard();
        counter.load(Ordering::Relaxed)
    }
}

impl Default for RWLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ReadGuard<'a> {
    lock: &'a RWLock,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

pub struct WriteGuard<'a> {
    lock: &'a RWLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}
