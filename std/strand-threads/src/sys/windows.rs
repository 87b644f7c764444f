///
/// Win32 backend.
///
/// Threads are driven through their kernel handles; events are kernel event
/// objects created with the requested reset mode. Win32 has no way to read
/// an event's state without waiting on it, so `check` on an auto-reset event
/// polls and re-arms it.
///
/// Threads are std threads; `TerminateThread` does not unwind, so the
/// catch frame std keeps under each thread is never crossed. Joining waits
/// on the kernel handle instead of `JoinHandle::join`, whose result slot a
/// terminated thread never fills.
///

use std::io;
use std::os::windows::io::AsRawHandle;
use std::thread::JoinHandle;

use strand_core::{Result, SyncError};
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, WAIT_OBJECT_0};
use windows_sys::Win32::System::Threading::{
    CreateEventW, GetCurrentThreadId, GetThreadPriority, INFINITE, ResetEvent, ResumeThread,
    SetEvent, SetThreadDescription, SetThreadPriority, Sleep, SuspendThread, SwitchToThread,
    TerminateThread, WaitForSingleObject,
};

use super::{Entry, Platform, RawSignal};

const PRIORITY_ERROR_RETURN: i32 = 0x7fff_ffff;
const SUSPEND_FAILED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadHandle(HANDLE);

// Kernel handles are process-wide and usable from any thread.
unsafe impl Send for ThreadHandle {}
unsafe impl Sync for ThreadHandle {}

pub struct Win32;

fn last_error(call: &'static str) -> SyncError {
    SyncError::Native {
        call,
        code: unsafe { GetLastError() } as i32,
    }
}

impl Platform for Win32 {
    type Handle = ThreadHandle;
    type Thread = JoinHandle<()>;

    fn spawn(name: &str, stack_size: usize, entry: Entry) -> io::Result<JoinHandle<()>> {
        let mut builder = std::thread::Builder::new().stack_size(stack_size);
        if !name.is_empty() {
            builder = builder.name(name.to_string());
        }
        builder.spawn(entry)
    }

    fn handle(thread: &JoinHandle<()>) -> ThreadHandle {
        ThreadHandle(thread.as_raw_handle() as HANDLE)
    }

    fn join(thread: JoinHandle<()>) {
        unsafe {
            WaitForSingleObject(thread.as_raw_handle() as HANDLE, INFINITE);
        }
        // Closes the handle without reading the result slot.
        drop(thread);
    }

    fn current_thread_id() -> u64 {
        u64::from(unsafe { GetCurrentThreadId() })
    }

    fn sleep_ms(ms: u32) {
        unsafe { Sleep(ms) }
    }

    fn yield_now() {
        unsafe {
            SwitchToThread();
        }
    }

    fn set_name(handle: ThreadHandle, name: &str) -> bool {
        let wide: Vec<u16> = name
            .encode_utf16()
            .filter(|&c| c != 0)
            .chain(std::iter::once(0))
            .collect();
        unsafe { SetThreadDescription(handle.0, wide.as_ptr()) >= 0 }
    }

    fn get_priority(handle: ThreadHandle) -> Option<i32> {
        let priority = unsafe { GetThreadPriority(handle.0) };
        (priority != PRIORITY_ERROR_RETURN).then_some(priority)
    }

    fn set_priority(handle: ThreadHandle, priority: i32) -> bool {
        unsafe { SetThreadPriority(handle.0, priority) != 0 }
    }

    fn suspend(handle: ThreadHandle) -> Result<u32> {
        match unsafe { SuspendThread(handle.0) } {
            SUSPEND_FAILED => Err(last_error("SuspendThread")),
            count => Ok(count),
        }
    }

    fn resume(handle: ThreadHandle) -> Result<u32> {
        match unsafe { ResumeThread(handle.0) } {
            SUSPEND_FAILED => Err(last_error("ResumeThread")),
            count => Ok(count),
        }
    }

    unsafe fn terminate(handle: ThreadHandle, exit_code: i32) -> Result<bool> {
        if unsafe { TerminateThread(handle.0, exit_code as u32) } == 0 {
            return Err(last_error("TerminateThread"));
        }
        // TerminateThread only starts the kill; the handle signals once done.
        unsafe {
            WaitForSingleObject(handle.0, INFINITE);
        }
        Ok(true)
    }
}

pub struct EventHandle {
    handle: HANDLE,
    manual_reset: bool,
}

unsafe impl Send for EventHandle {}
unsafe impl Sync for EventHandle {}

impl RawSignal for EventHandle {
    fn new(manual_reset: bool) -> Option<Self> {
        let handle = unsafe {
            CreateEventW(std::ptr::null(), i32::from(manual_reset), 0, std::ptr::null())
        };
        if handle.is_null() {
            None
        } else {
            Some(Self {
                handle,
                manual_reset,
            })
        }
    }

    fn set(&self) -> bool {
        unsafe { SetEvent(self.handle) != 0 }
    }

    fn reset(&self) -> bool {
        let was_set = self.wait(0);
        unsafe {
            ResetEvent(self.handle);
        }
        was_set
    }

    fn check(&self) -> bool {
        let was_set = self.wait(0);
        if was_set && !self.manual_reset {
            self.set();
        }
        was_set
    }

    fn wait(&self, timeout_ms: u32) -> bool {
        // WAIT_INFINITE and INFINITE share the same value.
        unsafe { WaitForSingleObject(self.handle, timeout_ms) == WAIT_OBJECT_0 }
    }
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.handle);
        }
    }
}
