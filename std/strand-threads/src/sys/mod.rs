//!
//! Native Platform Layer
//!
//! The primitive-level contracts live once in the parent modules; this layer
//! only fills in native calls. Two traits form the seam:
//!
//! - `Platform` - spawning and joining, thread identity, sleeping, naming,
//!   priority, suspension and forced termination
//! - `RawSignal` - the wait object under `SyncObject` (a signaled flag with
//!   manual- or auto-reset semantics and timed waits)
//!
//! Implementations are picked at build time:
//!
//! | target      | `Platform`        | `RawSignal`                         |
//! |-------------|-------------------|-------------------------------------|
//! | Unix        | `unix::Pthreads`  | `condvar::CondvarSignal`            |
//! | Windows     | `windows::Win32`  | `windows::EventHandle`              |
//!

use std::io;

use strand_core::Result;

#[cfg(not(windows))]
mod condvar;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(not(windows))]
pub use condvar::CondvarSignal as NativeSignal;
#[cfg(unix)]
pub use unix::Pthreads as Native;
#[cfg(windows)]
pub use windows::{EventHandle as NativeSignal, Win32 as Native};

pub type NativeThread = <Native as Platform>::Thread;

/// Code run on a freshly spawned native thread.
pub type Entry = Box<dyn FnOnce() + Send + 'static>;

pub trait Platform {
    /// Owned by the OS; valid until the owning `Thread` is joined or dropped.
    type Handle: Copy + Send + Sync + 'static;
    /// A joinable native thread. Dropping it without `join` detaches it.
    type Thread: Send + Sync + 'static;

    /// Starts `entry` on a new native thread named `name` (empty = unnamed).
    fn spawn(name: &str, stack_size: usize, entry: Entry) -> io::Result<Self::Thread>;
    fn handle(thread: &Self::Thread) -> Self::Handle;
    /// Blocks until the native thread has exited and releases it.
    fn join(thread: Self::Thread);

    /// Non-zero, unique among live threads.
    fn current_thread_id() -> u64;
    fn sleep_ms(ms: u32);
    fn yield_now();

    fn set_name(handle: Self::Handle, name: &str) -> bool;
    fn get_priority(handle: Self::Handle) -> Option<i32>;
    fn set_priority(handle: Self::Handle, priority: i32) -> bool;

    /// Returns the previous suspend count.
    fn suspend(handle: Self::Handle) -> Result<u32>;
    fn resume(handle: Self::Handle) -> Result<u32>;

    /// Returns `true` when the thread is gone on return, `false` when it
    /// ends later, at its next cancellation point.
    ///
    /// # Safety
    ///
    /// The target thread is stopped wherever it happens to be. Locks it holds
    /// stay held and its stack is not unwound cleanly.
    unsafe fn terminate(handle: Self::Handle, exit_code: i32) -> Result<bool>;
}

pub trait RawSignal: Send + Sync + Sized {
    /// `None` when the native object could not be created.
    fn new(manual_reset: bool) -> Option<Self>;
    fn set(&self) -> bool;
    /// Clears the signal and reports whether it was set.
    fn reset(&self) -> bool;
    /// Reads the signaled state without consuming it.
    fn check(&self) -> bool;
    /// Blocks until signaled or `timeout_ms` elapses. A successful wait on an
    /// auto-reset signal consumes it.
    fn wait(&self, timeout_ms: u32) -> bool;
}
