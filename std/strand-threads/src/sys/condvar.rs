///
/// Mutex + condition pair wait object.
///
/// `Set` on a manual-reset signal wakes every waiter; on an auto-reset signal
/// it wakes one, and the first waiter to reacquire the mutex consumes the
/// flag. A flag set with nobody waiting stays set until consumed or reset.
///

use parking_lot::{Condvar, Mutex};

use strand_core::{WAIT_INFINITE, deadline_after};

use super::RawSignal;

pub struct CondvarSignal {
    signaled: Mutex<bool>,
    condition: Condvar,
    manual_reset: bool,
}

impl RawSignal for CondvarSignal {
    fn new(manual_reset: bool) -> Option<Self> {
        Some(Self {
            signaled: Mutex::new(false),
            condition: Condvar::new(),
            manual_reset,
        })
    }

    fn set(&self) -> bool {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        if self.manual_reset {
            self.condition.notify_all();
        } else {
            self.condition.notify_one();
        }
        true
    }

    fn reset(&self) -> bool {
        std::mem::replace(&mut *self.signaled.lock(), false)
    }

    fn check(&self) -> bool {
        *self.signaled.lock()
    }

    fn wait(&self, timeout_ms: u32) -> bool {
        let mut signaled = self.signaled.lock();

        if timeout_ms == WAIT_INFINITE {
            while !*signaled {
                self.condition.wait(&mut signaled);
            }
        } else if let Some(deadline) = deadline_after(timeout_ms) {
            while !*signaled {
                if self.condition.wait_until(&mut signaled, deadline).timed_out() {
                    break;
                }
            }
        }

        if !*signaled {
            return false;
        }
        if !self.manual_reset {
            *signaled = false;
        }
        true
    }
}
