//!
//! strand-threads - Thread and Synchronization Primitives
//!
//! The primitive layer a scheduler or thread pool is built on. It provides
//! the same observable semantics over pthreads and Win32.
//!
//! ## Atomics
//!
//! - `Interlocked` on `AtomicI32`/`AtomicI64` - increment, decrement,
//!   exchange, exchange-add, compare-exchange, assign-if
//! - `ffi` - the same operations over raw addresses for C callers
//!
//! ## Waiting and Locking
//!
//! - `Event` - manual- or auto-reset signal over a native `SyncObject`
//! - `FastMutex` - reentrant lock that sleeps between attempts
//! - `RWLock` - blocking reader/writer lock with writer preference
//! - `SpinRWLock` - busy-waiting reader/writer lock for tiny sections
//!
//! ## Threads
//!
//! - `Thread` - start with an init handshake, join with timeout, naming,
//!   priority, cooperative `stop`, `unsafe` forced `terminate`
//! - `Thread::current()` and `declare_main_thread()` / `is_main_thread()`
//!
//! Every blocking call takes a millisecond timeout where it can fail;
//! `WAIT_INFINITE` blocks until the condition holds.
//!

pub mod atomic;
pub mod event;
pub mod ffi;
pub mod mutex;
pub mod rwlock;
pub mod spin_rwlock;
pub mod sync_object;
pub mod thread;

mod sys;

pub use atomic::Interlocked;
pub use event::Event;
pub use mutex::{FastMutex, FastMutexGuard};
pub use rwlock::{RWLock, ReadGuard, WriteGuard};
pub use spin_rwlock::{SpinRWLock, SpinReadGuard, SpinWriteGuard};
pub use sync_object::SyncObject;
pub use thread::{
    Thread, ThreadBody, ThreadHandle, ThreadState, current_thread_id, declare_main_thread,
    is_main_thread, main_thread_id, sleep, yield_now,
};

pub use strand_core::{Result, SyncConfig, SyncError, WAIT_INFINITE};
