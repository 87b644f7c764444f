//!
//! Thread Lifecycle
//!
//! A `Thread` owns one native thread running a `ThreadBody`:
//!
//! ```text
//!   Created ──start──> Starting ──init ok──> Running ──run returns──> Exited
//!                          │                    │
//!                          └──init fails──> Exited
//!                                               └──terminate──> Terminated
//! ```
//!
//! ## Start handshake
//!
//! `start` hands the new thread a one-shot startup block (a manual-reset
//! completion event plus a success flag). The trampoline registers the
//! thread as current, runs `init`, publishes the outcome, and only on success
//! goes on to `run`, records the result, then calls `on_exit` and `cleanup`
//! in that order. `start` blocks on the completion event, so when it returns
//! `init` has finished and its outcome is known.
//!
//! ## Stopping a thread
//!
//! `stop` is cooperative: it raises a flag the body reads through
//! `Thread::current()`, and it cuts short any `Thread::sleep` the body is in.
//! `terminate` is the forced path and is `unsafe`: the target is killed
//! wherever it is and any locks it holds stay held forever. `Terminated`
//! means the kill was requested. On pthreads it lands at the target's next
//! cancellation point, so `join` keeps waiting until the thread is really
//! gone. Prefer `stop` for every new call site.
//!
//! On pthreads the body runs under a C entry point with no panic boundary,
//! so a panic escaping a `ThreadBody` aborts the process.
//!
//! ## Process-wide identity
//!
//! The current-thread registry is a thread-local slot filled once by the
//! trampoline and emptied when the thread exits; threads not started through
//! this module see `None`. The main-thread marker is set once with
//! `declare_main_thread`, normally first thing in `main`.
//!

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use strand_core::config::THREAD_NAME_CAPACITY;
use strand_core::{Result, SyncError, WAIT_INFINITE};
use tracing::{debug, warn};

use crate::event::Event;
use crate::sys::{Native, NativeThread, Platform};

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
    static CURRENT: RefCell<Option<ThreadHandle>> = const { RefCell::new(None) };
    static EXIT_NOTICE: RefCell<Option<ExitNotice>> = const { RefCell::new(None) };
}

static MAIN_THREAD_ID: OnceLock<u64> = OnceLock::new();

/// Numeric id of the calling native thread. Never `0`.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(Native::current_thread_id());
        }
        id.get()
    })
}

pub fn sleep(ms: u32) {
    Native::sleep_ms(ms);
}

pub fn yield_now() {
    Native::yield_now();
}

/// Marks the calling thread as the main thread. Only the first call succeeds.
pub fn declare_main_thread() -> Result<()> {
    let id = current_thread_id();
    MAIN_THREAD_ID.set(id).map_err(|_| SyncError::MainThreadAlreadyDeclared {
        id: MAIN_THREAD_ID.get().copied().unwrap_or(id),
    })
}

pub fn main_thread_id() -> Option<u64> {
    MAIN_THREAD_ID.get().copied()
}

pub fn is_main_thread() -> bool {
    main_thread_id() == Some(current_thread_id())
}

/// Code that runs on a `Thread`. Only `run` is required.
pub trait ThreadBody: Send + 'static {
    fn init(&mut self) -> bool {
        true
    }

    fn run(&mut self) -> i32;

    fn on_exit(&mut self) {}

    fn cleanup(&mut self) {}
}

struct FnBody<F>(Option<F>);

impl<F> ThreadBody for FnBody<F>
where
    F: FnOnce() -> i32 + Send + 'static,
{
    fn run(&mut self) -> i32 {
        self.0.take().map_or(0, |f| f())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    Created = 0,
    Starting = 1,
    Running = 2,
    Exited = 3,
    Terminated = 4,
}

impl ThreadState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ThreadState::Created,
            1 => ThreadState::Starting,
            2 => ThreadState::Running,
            3 => ThreadState::Exited,
            _ => ThreadState::Terminated,
        }
    }
}

/// Name kept in a fixed inline buffer, truncated on a char boundary.
#[derive(Clone, Copy)]
struct ThreadName {
    bytes: [u8; THREAD_NAME_CAPACITY],
    len: usize,
}

impl ThreadName {
    const EMPTY: ThreadName = ThreadName {
        bytes: [0; THREAD_NAME_CAPACITY],
        len: 0,
    };

    fn new(name: &str, max_len: usize) -> Self {
        let mut out = Self::EMPTY;
        let limit = max_len.min(THREAD_NAME_CAPACITY);
        for ch in name.chars().filter(|&c| c != '\0') {
            let width = ch.len_utf8();
            if out.len + width > limit {
                break;
            }
            ch.encode_utf8(&mut out.bytes[out.len..out.len + width]);
            out.len += width;
        }
        out
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }
}

struct Shared {
    name: Mutex<ThreadName>,
    id: AtomicU64,
    state: AtomicU8,
    result: Mutex<Option<i32>>,
    stop: Event,
    stop_code: AtomicI32,
    exited: Event,
}

impl Shared {
    fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ThreadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Moves `from` states to `to`; returns the state replaced.
    fn transition(&self, from: &[ThreadState], to: ThreadState) -> Option<ThreadState> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                from.contains(&ThreadState::from_u8(current)).then_some(to as u8)
            })
            .ok()
            .map(ThreadState::from_u8)
    }

    /// Called once the native thread is on its way out.
    fn finish(&self) {
        self.transition(&[ThreadState::Starting, ThreadState::Running], ThreadState::Exited);
        self.exited.set();
    }

    fn name(&self) -> String {
        self.name.lock().as_str().to_string()
    }
}

/// Cheap reference to a running `Thread`, as seen from inside it.
#[derive(Clone)]
pub struct ThreadHandle {
    shared: Arc<Shared>,
}

impl ThreadHandle {
    pub fn id(&self) -> u64 {
        self.shared.id.load(Ordering::Acquire)
    }

    pub fn name(&self) -> String {
        self.shared.name()
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop.check()
    }

    /// Exit code passed to `Thread::stop`; meaningful once a stop is requested.
    pub fn stop_code(&self) -> i32 {
        self.shared.stop_code.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}

/// One-shot block handed to the trampoline.
struct Startup {
    complete: Event,
    success: AtomicBool,
}

/// Parked in thread-local storage by the trampoline. Thread-local
/// destructors run on every way out of a native thread, cancellation
/// included, so this is where the thread reports that it is gone.
struct ExitNotice {
    shared: Arc<Shared>,
    startup: Arc<Startup>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        // Unblocks `start` if the thread died before `init` reported.
        self.startup.complete.set();
        self.shared.finish();
    }
}

pub struct Thread {
    shared: Arc<Shared>,
    body: Mutex<Option<Box<dyn ThreadBody>>>,
    native: Mutex<Option<NativeThread>>,
}

impl Thread {
    pub fn new(body: impl ThreadBody) -> Self {
        let body: Box<dyn ThreadBody> = Box::new(body);
        Self {
            shared: Arc::new(Shared {
                name: Mutex::new(ThreadName::EMPTY),
                id: AtomicU64::new(0),
                state: AtomicU8::new(ThreadState::Created as u8),
                result: Mutex::new(None),
                stop: Event::manual(),
                stop_code: AtomicI32::new(0),
                exited: Event::manual(),
            }),
            body: Mutex::new(Some(body)),
            native: Mutex::new(None),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        Self::new(FnBody(Some(f)))
    }

    /// The `Thread` whose trampoline is running on the calling native thread.
    pub fn current() -> Option<ThreadHandle> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Sleeps the calling thread. A thread started here wakes early when a
    /// stop is requested; returns `true` in that case.
    pub fn sleep(ms: u32) -> bool {
        match Self::current() {
            Some(current) => current.shared.stop.wait(ms),
            None => {
                Native::sleep_ms(ms);
                false
            }
        }
    }

    pub fn yield_now() {
        Native::yield_now();
    }

    /// Spawns the native thread and waits for `init` to finish. A
    /// `stack_size` of `0` uses the configured default.
    ///
    /// # Panics
    ///
    /// If the thread was already started.
    pub fn start(&self, stack_size: usize) -> Result<()> {
        let body = self.body.lock().take();
        let Some(body) = body else {
            panic!("Thread::start called on a thread that was already started");
        };

        let stack_size = if stack_size == 0 {
            strand_core::config::get().default_stack_size
        } else {
            stack_size
        };
        let name = self.shared.name();

        let startup = Arc::new(Startup {
            complete: Event::manual(),
            success: AtomicBool::new(false),
        });

        self.shared.set_state(ThreadState::Starting);
        let shared = Arc::clone(&self.shared);
        let thread_startup = Arc::clone(&startup);
        let entry = Box::new(move || trampoline(shared, body, thread_startup));
        let native = Native::spawn(&name, stack_size, entry).map_err(|e| {
            self.shared.set_state(ThreadState::Created);
            SyncError::Spawn(e)
        })?;
        *self.native.lock() = Some(native);

        startup.complete.wait(WAIT_INFINITE);
        if startup.success.load(Ordering::Acquire) {
            debug!(name = %name, id = self.shared.id.load(Ordering::Acquire), "thread started");
            Ok(())
        } else {
            warn!(name = %name, "thread init failed");
            self.join(WAIT_INFINITE);
            Err(SyncError::InitFailed { name })
        }
    }

    /// Waits up to `timeout_ms` for the native thread to exit. Returns
    /// `false` on timeout or if the thread was never started. A terminated
    /// thread counts as exited only once it is actually gone.
    pub fn join(&self, timeout_ms: u32) -> bool {
        if self.shared.state() == ThreadState::Created {
            return false;
        }
        if !self.shared.exited.wait(timeout_ms) {
            return false;
        }

        if let Some(native) = self.native.lock().take() {
            Native::join(native);
            debug!(name = %self.shared.name(), result = ?self.result(), "thread joined");
        }
        true
    }

    /// Cooperative cancellation: raises the stop flag and wakes the body
    /// out of `Thread::sleep`. The body decides when to return.
    pub fn stop(&self, exit_code: i32) {
        self.shared.stop_code.store(exit_code, Ordering::Release);
        self.shared.stop.set();
    }

    /// Requests that the native thread be killed and records `exit_code`
    /// as its result. Returns once the request is delivered; the state reads
    /// `Terminated` from then on. `join` still waits for the thread to be
    /// gone, which on Windows is immediate and on pthreads happens at the
    /// target's next cancellation point (the free `sleep`, blocking I/O).
    /// Waits on this crate's events are not cancellation points. A body
    /// that never reaches one keeps running until it does.
    ///
    /// # Safety
    ///
    /// The target is stopped wherever it happens to be. Every lock it holds
    /// (`FastMutex`, `RWLock`, `SpinRWLock`, anything else) stays held and
    /// its `on_exit`/`cleanup` hooks never run. On Windows destructors on
    /// its stack do not run either. Only use this when the process is going
    /// down anyway.
    pub unsafe fn terminate(&self, exit_code: i32) -> Result<()> {
        let native = self.native.lock();
        let Some(handle) = native.as_ref().map(Native::handle) else {
            return Err(SyncError::NotStarted);
        };

        let previous = {
            let mut result = self.shared.result.lock();
            if result.is_some() {
                return Ok(());
            }
            let Some(previous) = self.shared.transition(
                &[ThreadState::Starting, ThreadState::Running],
                ThreadState::Terminated,
            ) else {
                return Ok(());
            };
            *result = Some(exit_code);
            previous
        };

        match unsafe { Native::terminate(handle, exit_code) } {
            Ok(gone) => {
                if gone {
                    self.shared.exited.set();
                }
                debug!(name = %self.shared.name(), exit_code, gone, "thread terminated");
                Ok(())
            }
            Err(e) => {
                *self.shared.result.lock() = None;
                self.shared.set_state(previous);
                Err(e)
            }
        }
    }

    pub fn name(&self) -> String {
        self.shared.name()
    }

    /// Stores at most `max_name_len` bytes of `name` and applies it to the
    /// native thread if one is running.
    pub fn set_name(&self, name: &str) {
        let max_len = strand_core::config::get().max_name_len;
        let stored = ThreadName::new(name, max_len);
        *self.shared.name.lock() = stored;

        if let Some(native) = self.native.lock().as_ref() {
            if !Native::set_name(Native::handle(native), stored.as_str()) {
                debug!(name = stored.as_str(), "native thread name not applied");
            }
        }
    }

    /// `None` until the thread has started.
    pub fn id(&self) -> Option<u64> {
        match self.shared.id.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    pub fn state(&self) -> ThreadState {
        self.shared.state()
    }

    /// The value returned from `run`, or the code given to `terminate`.
    pub fn result(&self) -> Option<i32> {
        *self.shared.result.lock()
    }

    /// Started, and no result recorded yet.
    pub fn is_alive(&self) -> bool {
        matches!(self.state(), ThreadState::Starting | ThreadState::Running)
            && self.result().is_none()
    }

    /// Same as `is_alive`: a suspended thread still counts as running.
    pub fn is_thread_running(&self) -> bool {
        self.is_alive()
    }

    pub fn get_priority(&self) -> Option<i32> {
        let native = self.native.lock();
        native.as_ref().and_then(|n| Native::get_priority(Native::handle(n)))
    }

    pub fn set_priority(&self, priority: i32) -> bool {
        let native = self.native.lock();
        let Some(n) = native.as_ref() else {
            return false;
        };
        let ok = Native::set_priority(Native::handle(n), priority);
        if !ok {
            warn!(name = %self.shared.name(), priority, "failed to set thread priority");
        }
        ok
    }

    /// Returns the previous suspend count. Not available on pthreads.
    pub fn suspend(&self) -> Result<u32> {
        let native = self.native.lock();
        let n = native.as_ref().ok_or(SyncError::NotStarted)?;
        Native::suspend(Native::handle(n))
    }

    pub fn resume(&self) -> Result<u32> {
        let native = self.native.lock();
        let n = native.as_ref().ok_or(SyncError::NotStarted)?;
        Native::resume(Native::handle(n))
    }

    pub fn handle(&self) -> ThreadHandle {
        ThreadHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("state", &self.state())
            .field("result", &self.result())
            .finish()
    }
}

fn trampoline(shared: Arc<Shared>, mut body: Box<dyn ThreadBody>, startup: Arc<Startup>) {
    shared.id.store(current_thread_id(), Ordering::Release);
    CURRENT.with(|current| {
        *current.borrow_mut() = Some(ThreadHandle {
            shared: Arc::clone(&shared),
        });
    });
    EXIT_NOTICE.with(|notice| {
        *notice.borrow_mut() = Some(ExitNotice {
            shared: Arc::clone(&shared),
            startup: Arc::clone(&startup),
        });
    });

    let ok = body.init();
    if ok {
        shared.transition(&[ThreadState::Starting], ThreadState::Running);
    }
    startup.success.store(ok, Ordering::Release);
    startup.complete.set();
    if !ok {
        return;
    }

    let result = body.run();
    {
        // A terminate that got in first owns the result.
        let mut slot = shared.result.lock();
        if slot.is_none() {
            *slot = Some(result);
        }
    }
    debug!(name = %shared.name(), result, "thread run returned");
    body.on_exit();
    body.cleanup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct Recorder {
        calls: Arc<Mutex<Vec<&'static str>>>,
        init_ok: bool,
    }

    impl ThreadBody for Recorder {
        fn init(&mut self) -> bool {
            self.calls.lock().push("init");
            self.init_ok
        }

        fn run(&mut self) -> i32 {
            self.calls.lock().push("run");
            17
        }

        fn on_exit(&mut self) {
            self.calls.lock().push("on_exit");
        }

        fn cleanup(&mut self) {
            self.calls.lock().push("cleanup");
        }
    }

    #[test]
    fn test_hooks_run_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let thread = Thread::new(Recorder {
            calls: Arc::clone(&calls),
            init_ok: true,
        });

        assert_eq!(thread.state(), ThreadState::Created);
        assert!(thread.id().is_none());

        thread.start(0).unwrap();
        assert!(thread.id().is_some());
        assert!(thread.join(5_000));

        assert_eq!(*calls.lock(), vec!["init", "run", "on_exit", "cleanup"]);
        assert_eq!(thread.result(), Some(17));
        assert_eq!(thread.state(), ThreadState::Exited);
        assert!(!thread.is_alive());
    }

    #[test]
    fn test_init_failure_skips_run() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let thread = Thread::new(Recorder {
            calls: Arc::clone(&calls),
            init_ok: false,
        });
        thread.set_name("failing");

        let err = thread.start(0).unwrap_err();
        assert!(matches!(err, SyncError::InitFailed { ref name } if name == "failing"));
        assert_eq!(*calls.lock(), vec!["init"]);
        assert_eq!(thread.result(), None);
        assert_eq!(thread.state(), ThreadState::Exited);
    }

    #[test]
    fn test_init_completes_before_start_returns() {
        struct SlowInit(Arc<AtomicBool>);

        impl ThreadBody for SlowInit {
            fn init(&mut self) -> bool {
                std::thread::sleep(Duration::from_millis(30));
                self.0.store(true, Ordering::SeqCst);
                true
            }

            fn run(&mut self) -> i32 {
                0
            }
        }

        let flag = Arc::new(AtomicBool::new(false));
        let thread = Thread::new(SlowInit(Arc::clone(&flag)));
        thread.start(0).unwrap();
        assert!(flag.load(Ordering::SeqCst));
        assert!(thread.join(WAIT_INFINITE));
    }

    #[test]
    #[should_panic(expected = "already started")]
    fn test_double_start_panics() {
        let thread = Thread::from_fn(|| 0);
        thread.start(0).unwrap();
        thread.join(WAIT_INFINITE);
        let _ = thread.start(0);
    }

    #[test]
    fn test_join_before_start_fails() {
        let thread = Thread::from_fn(|| 0);
        assert!(!thread.join(0));
        assert!(!thread.is_alive());
    }

    #[test]
    fn test_current_thread_registry() {
        assert!(Thread::current().is_none());

        let seen = Arc::new(Mutex::new(None));
        let seen_in_thread = Arc::clone(&seen);
        let thread = Thread::from_fn(move || {
            *seen_in_thread.lock() = Thread::current().map(|t| (t.id(), t.name()));
            0
        });
        thread.set_name("worker");
        thread.start(0).unwrap();
        assert!(thread.join(5_000));

        let expected = (thread.id().unwrap(), "worker".to_string());
        assert_eq!(*seen.lock(), Some(expected));
    }

    #[test]
    fn test_name_truncated_to_capacity() {
        let thread = Thread::from_fn(|| 0);
        thread.set_name(&"x".repeat(100));
        assert_eq!(thread.name().len(), THREAD_NAME_CAPACITY);

        thread.set_name("héllo\0");
        assert_eq!(thread.name(), "héllo");
    }

    #[test]
    fn test_thread_name_respects_char_boundary() {
        let name = ThreadName::new("ééé", 5);
        assert_eq!(name.as_str(), "éé");
    }

    #[test]
    fn test_stop_wakes_sleeping_thread() {
        let iterations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&iterations);
        let thread = Thread::from_fn(move || {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                if Thread::sleep(10_000) {
                    let me = Thread::current().unwrap();
                    return me.stop_code();
                }
            }
        });
        thread.start(0).unwrap();

        let begun = Instant::now();
        thread.stop(5);
        assert!(thread.join(5_000));
        assert!(begun.elapsed() < Duration::from_secs(5));
        assert_eq!(thread.result(), Some(5));
        assert_eq!(iterations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sleep_outside_registry_is_plain() {
        let start = Instant::now();
        assert!(!Thread::sleep(10));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_native_controls_require_start() {
        let thread = Thread::from_fn(|| 0);
        assert!(thread.get_priority().is_none());
        assert!(!thread.set_priority(0));
        assert!(matches!(thread.suspend(), Err(SyncError::NotStarted)));
        assert!(matches!(unsafe { thread.terminate(1) }, Err(SyncError::NotStarted)));
    }

    #[test]
    fn test_priority_readable_while_running() {
        let gate = Arc::new(Event::manual());
        let thread_gate = Arc::clone(&gate);
        let thread = Thread::from_fn(move || {
            thread_gate.wait(WAIT_INFINITE);
            0
        });
        thread.start(0).unwrap();

        let priority = thread.get_priority();
        assert!(priority.is_some());
        assert!(thread.is_alive());
        assert!(thread.is_thread_running());

        gate.set();
        assert!(thread.join(5_000));
    }

    #[test]
    fn test_current_thread_id_is_stable() {
        let a = current_thread_id();
        let b = current_thread_id();
        assert_eq!(a, b);
        assert_ne!(a, 0);
        let other = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(a, other);
    }
}
