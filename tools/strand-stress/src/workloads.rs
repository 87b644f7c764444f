//!
//! Contention workloads. Every worker runs on a `strand_threads::Thread`
//! so the lifecycle path (name, start handshake, join, result) is under
//! load too. A worker returns `0` on success and a non-zero code when it
//! observed a broken invariant.
//!

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use strand_threads::{
    Event, FastMutex, Interlocked, RWLock, Result, SpinRWLock, Thread, WAIT_INFINITE,
};
use tracing::debug;

/// Event waits longer than this are treated as a lost wakeup.
const EVENT_TIMEOUT_MS: u32 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Atomics,
    Mutex,
    RwLock,
    SpinRwLock,
    Events,
}

pub struct Report {
    pub name: &'static str,
    pub passed: bool,
    pub elapsed: Duration,
    pub detail: String,
}

/// A counter that is only touched while some lock is held.
struct Guarded(UnsafeCell<u64>);

unsafe impl Sync for Guarded {}

impl Guarded {
    fn new() -> Self {
        Self(UnsafeCell::new(0))
    }

    /// # Safety
    ///
    /// Caller holds exclusive access through an external lock.
    unsafe fn bump(&self) {
        unsafe { *self.0.get() += 1 }
    }

    /// # Safety
    ///
    /// Caller holds at least shared access through an external lock.
    unsafe fn value(&self) -> u64 {
        unsafe { *self.0.get() }
    }
}

impl Workload {
    pub const ALL: &'static [Workload] = &[
        Workload::Atomics,
        Workload::Mutex,
        Workload::RwLock,
        Workload::SpinRwLock,
        Workload::Events,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Workload::Atomics => "atomics",
            Workload::Mutex => "mutex",
            Workload::RwLock => "rwlock",
            Workload::SpinRwLock => "spin-rwlock",
            Workload::Events => "events",
        }
    }

    pub fn run(self, threads: usize, iterations: u32) -> Result<Report> {
        let started = Instant::now();
        let (passed, detail) = match self {
            Workload::Atomics => atomics(threads, iterations)?,
            Workload::Mutex => mutex(threads, iterations)?,
            Workload::RwLock => rwlock(threads, iterations)?,
            Workload::SpinRwLock => spin_rwlock(threads, iterations)?,
            Workload::Events => events(iterations)?,
        };
        Ok(Report {
            name: self.name(),
            passed,
            elapsed: started.elapsed(),
            detail,
        })
    }
}

/// Runs `work(index)` on `count` named threads and collects their results.
fn run_workers<F>(label: &str, count: usize, work: F) -> Result<Vec<i32>>
where
    F: Fn(usize) -> i32 + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let workers: Vec<Thread> = (0..count)
        .map(|index| {
            let work = Arc::clone(&work);
            let thread = Thread::from_fn(move || work(index));
            thread.set_name(&format!("{label}-{index}"));
            thread
        })
        .collect();
    start_all(&workers)?;

    let mut results = Vec::with_capacity(count);
    for thread in &workers {
        thread.join(WAIT_INFINITE);
        results.push(thread.result().unwrap_or(-1));
    }
    debug!(label, count, "workers joined");
    Ok(results)
}

/// Starts every worker in order. If one fails, the ones already running are
/// joined before the error is returned.
fn start_all(workers: &[Thread]) -> Result<()> {
    for (index, thread) in workers.iter().enumerate() {
        if let Err(e) = thread.start(0) {
            for started in &workers[..index] {
                started.join(WAIT_INFINITE);
            }
            debug!(started = index, "worker start failed, earlier workers joined");
            return Err(e);
        }
    }
    Ok(())
}

fn all_zero(results: &[i32]) -> bool {
    results.iter().all(|&code| code == 0)
}

fn atomics(threads: usize, iterations: u32) -> Result<(bool, String)> {
    let net = Arc::new(AtomicI32::new(0));
    let total = Arc::new(AtomicI64::new(0));

    let worker_net = Arc::clone(&net);
    let worker_total = Arc::clone(&total);
    let results = run_workers("atomics", threads, move |index| {
        for _ in 0..iterations {
            if index % 2 == 0 {
                worker_net.interlocked_increment();
            } else {
                worker_net.interlocked_decrement();
            }

            let mut seen = worker_total.load(Ordering::Relaxed);
            loop {
                let prior = worker_total.interlocked_compare_exchange(seen + 1, seen);
                if prior == seen {
                    break;
                }
                seen = prior;
            }
        }
        0
    })?;

    let incrementers = threads.div_ceil(2) as i64;
    let decrementers = (threads / 2) as i64;
    let expected_net = (incrementers - decrementers) * iterations as i64;
    let expected_total = threads as i64 * iterations as i64;

    let net = net.load(Ordering::SeqCst) as i64;
    let total = total.load(Ordering::SeqCst);
    let passed = all_zero(&results) && net == expected_net && total == expected_total;
    Ok((
        passed,
        format!("net {net} (expected {expected_net}), cas total {total} (expected {expected_total})"),
    ))
}

fn mutex(threads: usize, iterations: u32) -> Result<(bool, String)> {
    let lock = Arc::new(FastMutex::new());
    let counter = Arc::new(Guarded::new());

    let worker_lock = Arc::clone(&lock);
    let worker_counter = Arc::clone(&counter);
    let results = run_workers("mutex", threads, move |_| {
        for pass in 0..iterations {
            let _guard = worker_lock.guard();
            // Reentrant acquire on every tenth pass.
            let _nested = (pass % 10 == 0).then(|| worker_lock.guard());
            unsafe { worker_counter.bump() };
        }
        0
    })?;

    let expected = threads as u64 * iterations as u64;
    let _guard = lock.guard();
    let value = unsafe { counter.value() };
    let passed = all_zero(&results) && value == expected;
    Ok((passed, format!("counter {value} (expected {expected})")))
}

fn writer_count(threads: usize) -> usize {
    (threads / 4).max(1)
}

fn rwlock(threads: usize, iterations: u32) -> Result<(bool, String)> {
    let lock = Arc::new(RWLock::new());
    let counter = Arc::new(Guarded::new());
    let writers = writer_count(threads);
    let rounds = (iterations / 10).max(1);

    let worker_lock = Arc::clone(&lock);
    let worker_counter = Arc::clone(&counter);
    let results = run_workers("rwlock", threads.max(writers + 1), move |index| {
        for _ in 0..rounds {
            if index < writers {
                let _w = worker_lock.write();
                unsafe { worker_counter.bump() };
            } else {
                let _r = worker_lock.read();
                let before = unsafe { worker_counter.value() };
                std::hint::spin_loop();
                if unsafe { worker_counter.value() } != before {
                    return 1;
                }
            }
        }
        0
    })?;

    let expected = writers as u64 * rounds as u64;
    let value = {
        let _r = lock.read();
        unsafe { counter.value() }
    };
    let passed = all_zero(&results) && value == expected;
    Ok((passed, format!("writes {value} (expected {expected})")))
}

fn spin_rwlock(threads: usize, iterations: u32) -> Result<(bool, String)> {
    let lock = Arc::new(SpinRWLock::new());
    let counter = Arc::new(Guarded::new());
    let writers = writer_count(threads);

    let worker_lock = Arc::clone(&lock);
    let worker_counter = Arc::clone(&counter);
    let results = run_workers("spin-rwlock", threads.max(writers + 1), move |index| {
        for _ in 0..iterations {
            if index < writers {
                let _w = worker_lock.write();
                unsafe { worker_counter.bump() };
            } else {
                let _r = worker_lock.read();
                let before = unsafe { worker_counter.value() };
                if unsafe { worker_counter.value() } != before {
                    return 1;
                }
            }
        }
        0
    })?;

    let expected = writers as u64 * iterations as u64;
    let value = {
        let _r = lock.read();
        unsafe { counter.value() }
    };
    let passed = all_zero(&results) && value == expected && !lock.is_write_locked();
    Ok((passed, format!("writes {value} (expected {expected})")))
}

fn events(iterations: u32) -> Result<(bool, String)> {
    let ping = Arc::new(Event::auto());
    let pong = Arc::new(Event::auto());
    let rounds = (iterations / 10).max(1);

    let worker_ping = Arc::clone(&ping);
    let worker_pong = Arc::clone(&pong);
    let results = run_workers("events", 2, move |index| {
        for _ in 0..rounds {
            if index == 0 {
                worker_ping.set();
                if !worker_pong.wait(EVENT_TIMEOUT_MS) {
                    return 1;
                }
            } else {
                if !worker_ping.wait(EVENT_TIMEOUT_MS) {
                    return 1;
                }
                worker_pong.set();
            }
        }
        0
    })?;

    let passed = all_zero(&results) && !ping.check() && !pong.check();
    Ok((passed, format!("{rounds} round trips, results {results:?}")))
}
