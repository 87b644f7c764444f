//!
//! Spinning Reader/Writer Lock
//!
//! A reader/writer lock built only from atomics, for critical sections so
//! short that a context switch would cost more than busy-waiting. Nothing in
//! here blocks in the kernel; waiters spin with an exponential back-off and,
//! past `spin_limit` rounds, yield the core between polls.
//!
//! ## Writer flag
//!
//! A writer first wins the writer flag (compare-exchange `0 -> 1`), then
//! waits for the reader count to drain. Readers increment the count and back
//! out again if they see the flag, so a stream of new readers cannot starve
//! a writer that has already claimed the flag. Writers racing each other get
//! no ordering guarantee, and neither do readers racing a writer for the
//! flag.
//!
//! Neither side is reentrant.
//!

use std::hint;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::sys::{Native, Platform};
use crate::thread::current_thread_id;

#[derive(Debug, Default)]
pub struct SpinRWLock {
    readers: AtomicU32,
    writer: AtomicU32,
    writer_id: AtomicU64,
}

impl SpinRWLock {
    pub const fn new() -> Self {
        Self {
            readers: AtomicU32::new(0),
            writer: AtomicU32::new(0),
            writer_id: AtomicU64::new(0),
        }
    }

    pub fn lock_for_read(&self) {
        let mut backoff = Backoff::new();
        loop {
            while self.writer.load(Ordering::Relaxed) != 0 {
                backoff.snooze();
            }
            if self.try_lock_for_read() {
                return;
            }
        }
    }

    pub fn try_lock_for_read(&self) -> bool {
        self.readers.fetch_add(1, Ordering::SeqCst);
        if self.writer.load(Ordering::SeqCst) == 0 {
            return true;
        }
        self.readers.fetch_sub(1, Ordering::SeqCst);
        false
    }

    pub fn unlock_read(&self) {
        let prior = self.readers.fetch_sub(1, Ordering::Release);
        assert!(prior > 0, "unlock_read on a SpinRWLock with no readers");
    }

    pub fn lock_for_write(&self) {
        self.lock_for_write_as(current_thread_id());
    }

    pub fn lock_for_write_as(&self, thread_id: u64) {
        let mut backoff = Backoff::new();
        while self
            .writer
            .compare_exchange_weak(0, 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }

        let mut backoff = Backoff::new();
        while self.readers.load(Ordering::SeqCst) != 0 {
            backoff.snooze();
        }
        self.writer_id.store(thread_id, Ordering::Relaxed);
    }

    pub fn try_lock_for_write(&self) -> bool {
        if self.readers.load(Ordering::Relaxed) != 0
            || self
                .writer
                .compare_exchange(0, 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_err()
        {
            return false;
        }
        if self.readers.load(Ordering::SeqCst) != 0 {
            self.writer.store(0, Ordering::Release);
            return false;
        }
        self.writer_id.store(current_thread_id(), Ordering::Relaxed);
        true
    }

    pub fn unlock_write(&self) {
        assert!(
            self.writer.load(Ordering::Acquire) != 0,
            "unlock_write on a SpinRWLock with no writer"
        );
        // Cleared while the flag is still ours so the next writer's id survives.
        self.writer_id.store(0, Ordering::Relaxed);
        let released = self
            .writer
            .compare_exchange(1, 0, Ordering::Release, Ordering::Relaxed)
            .is_ok();
        assert!(released, "unlock_write on a SpinRWLock with no writer");
    }

    pub fn read(&self) -> SpinReadGuard<'_> {
        self.lock_for_read();
        SpinReadGuard { lock: self }
    }

    pub fn write(&self) -> SpinWriteGuard<'_> {
        self.lock_for_write();
        SpinWriteGuard { lock: self }
    }

    pub fn readers(&self) -> u32 {
        self.readers.load(Ordering::Relaxed)
    }

    pub fn is_write_locked(&self) -> bool {
        self.writer.load(Ordering::Relaxed) != 0
    }

    /// Id recorded by the current writer, `0` when there is none.
    pub fn writer_id(&self) -> u64 {
        self.writer_id.load(Ordering::Relaxed)
    }
}

pub struct SpinReadGuard<'a> {
    lock: &'a SpinRWLock,
}

impl Drop for SpinReadGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

pub struct SpinWriteGuard<'a> {
    lock: &'a SpinRWLock,
}

impl Drop for SpinWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

/// Exponential spin, then yield once `spin_limit` rounds have passed.
struct Backoff {
    step: u32,
    limit: u32,
}

impl Backoff {
    fn new() -> Self {
        Self {
            step: 0,
            limit: strand_core::config::get().spin_limit,
        }
    }

    fn snooze(&mut self) {
        if self.step < self.limit {
            for _ in 0..(1u32 << self.step.min(6)) {
                hint::spin_loop();
            }
            self.step += 1;
        } else {
            Native::yield_now();
        }
    }
}
