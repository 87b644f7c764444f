///
/// Common wait primitive underlying events.
///
/// A `SyncObject` owns one native wait object. Construction can fail when
/// the OS is out of resources; the object then stays in an unusable state
/// that callers detect with `is_usable` instead of crashing. Using an
/// unusable object is a programmer error caught by a debug assertion; in
/// release builds every operation on it reports failure.
///
/// `SyncObject` is only reachable through `Event`.
///

use tracing::warn;

use crate::sys::{NativeSignal, RawSignal};

pub struct SyncObject {
    signal: Option<NativeSignal>,
}

impl SyncObject {
    pub(crate) fn new(manual_reset: bool) -> Self {
        let signal = NativeSignal::new(manual_reset);
        if signal.is_none() {
            warn!(manual_reset, "failed to create native wait object");
        }
        Self { signal }
    }

    pub fn is_usable(&self) -> bool {
        self.signal.is_some()
    }

    /// Blocks until signaled or `timeout_ms` elapses (`0` polls,
    /// `WAIT_INFINITE` never gives up). Returns `true` if signaled.
    pub fn wait(&self, timeout_ms: u32) -> bool {
        self.signal().is_some_and(|signal| signal.wait(timeout_ms))
    }

    pub(crate) fn signal(&self) -> Option<&NativeSignal> {
        debug_assert!(self.signal.is_some(), "sync object used after failed construction");
        self.signal.as_ref()
    }
}
