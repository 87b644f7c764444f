//!
//! FastMutex
//!
//! A low-overhead lock for short critical sections where the common case is
//! uncontended. Acquisition is one compare-exchange of the owner slot from
//! `0` (free) to the caller's thread id. On contention the caller sleeps for
//! `spin_sleep_ms` (or yields when it is `0`) between attempts instead of
//! pegging a core.
//!
//! ## Reentrancy
//!
//! The lock is reentrant. A thread that already owns it takes the fast path
//! (no atomic read-modify-write) and bumps `depth`; every `lock` must be
//! paired with an `unlock`, and the owner slot is cleared only when the depth
//! returns to zero.
//!
//! `unlock` does not check who is calling. Unlocking a mutex the caller does
//! not hold corrupts it; unlocking one that nobody holds panics.
//!
//! Usage:
//! ```rust,ignore
//! let m = FastMutex::new();
//! {
//!     let _guard = m.guard();
//!     // critical section
//! }
//! ```
//!

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::sys::{Native, Platform};
use crate::thread::current_thread_id;

const FREE: u64 = 0;

#[derive(Debug, Default)]
pub struct FastMutex {
    owner: AtomicU64,
    depth: AtomicU32,
}

impl FastMutex {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(FREE),
            depth: AtomicU32::new(0),
        }
    }

    pub fn try_lock(&self) -> bool {
        self.try_lock_as(current_thread_id())
    }

    #[inline]
    pub fn try_lock_as(&self, thread_id: u64) -> bool {
        assert_ne!(thread_id, FREE, "thread id 0 marks a free FastMutex");

        if self.owner.load(Ordering::Relaxed) != thread_id
            && self
                .owner
                .compare_exchange(FREE, thread_id, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
        {
            return false;
        }

        self.depth.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn lock(&self) {
        self.lock_as(current_thread_id(), strand_core::config::get().spin_sleep_ms);
    }

    pub fn lock_as(&self, thread_id: u64, spin_sleep_ms: u32) {
        while !self.try_lock_as(thread_id) {
            if spin_sleep_ms == 0 {
                Native::yield_now();
            } else {
                Native::sleep_ms(spin_sleep_ms);
            }
        }
    }

    pub fn unlock(&self) {
        let depth = self.depth.load(Ordering::Relaxed);
        assert!(depth > 0, "unlock of a FastMutex that is not held");

        self.depth.store(depth - 1, Ordering::Relaxed);
        if depth == 1 {
            self.owner.store(FREE, Ordering::Release);
        }
    }

    pub fn guard(&self) -> FastMutexGuard<'_> {
        self.lock();
        FastMutexGuard { mutex: self }
    }

    pub fn owner_id(&self) -> u64 {
        self.owner.load(Ordering::Relaxed)
    }

    /// Only meaningful when read by the owning thread.
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_locked(&self) -> bool {
        self.owner_id() != FREE
    }

    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner_id() == current_thread_id()
    }
}

pub struct FastMutexGuard<'a> {
    mutex: &'a FastMutex,
}

impl Drop for FastMutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::UnsafeCell;
    use std::sync::Arc;
    use std::thread;

    struct Shared {
        mutex: FastMutex,
        counter: UnsafeCell<u64>,
    }

    unsafe impl Sync for Shared {}

    #[test]
    fn test_mutex_basic() {
        let m = FastMutex::new();
        assert!(!m.is_locked());

        m.lock();
        assert!(m.is_locked());
        assert!(m.is_owned_by_current_thread());
        assert_eq!(m.depth(), 1);

        m.unlock();
        assert!(!m.is_locked());
        assert_eq!(m.owner_id(), 0);
    }

    #[test]
    fn test_mutex_reentrant() {
        let m = FastMutex::new();
        m.lock();
        m.lock();
        assert!(m.try_lock());
        assert_eq!(m.depth(), 3);

        m.unlock();
        m.unlock();
        assert!(m.is_locked());
        m.unlock();
        assert!(!m.is_locked());
    }

    #[test]
    fn test_try_lock_fails_for_other_thread() {
        let m = Arc::new(FastMutex::new());
        m.lock();

        let other = Arc::clone(&m);
        let acquired = thread::spawn(move || other.try_lock()).join().unwrap();
        assert!(!acquired);

        m.unlock();
        let other = Arc::clone(&m);
        let acquired = thread::spawn(move || {
            let ok = other.try_lock();
            if ok {
                other.unlock();
            }
            ok
        })
        .join()
        .unwrap();
        assert!(acquired);
    }

    #[test]
    fn test_explicit_thread_ids() {
        let m = FastMutex::new();
        assert!(m.try_lock_as(7));
        assert!(!m.try_lock_as(8));
        assert!(m.try_lock_as(7));
        assert_eq!(m.owner_id(), 7);
        m.unlock();
        m.unlock();
        m.lock_as(8, 1);
        assert_eq!(m.owner_id(), 8);
        m.unlock();
    }

    #[test]
    #[should_panic(expected = "not held")]
    fn test_unlock_unheld_panics() {
        let m = FastMutex::new();
        m.unlock();
    }

    #[test]
    fn test_mutex_concurrent() {
        let shared = Arc::new(Shared {
            mutex: FastMutex::new(),
            counter: UnsafeCell::new(0),
        });

        let handles: Vec<_> = (0..4).map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    let _guard = shared.mutex.guard();
                    unsafe { *shared.counter.get() += 1; }
                }
            })
        }).collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(unsafe { *shared.counter.get() }, 4_000);
    }
}
