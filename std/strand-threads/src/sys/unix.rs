///
/// pthreads backend.
///
/// Thread ids come from `gettid` on Linux/Android and from `pthread_self`
/// elsewhere. Suspend/resume have no pthreads counterpart and report
/// `Unsupported`. Forced termination goes through `pthread_cancel`, which
/// takes effect at the target's next cancellation point.
///
/// Threads are created with `pthread_create` directly. glibc cancels a
/// thread by force-unwinding its stack, and that unwind must reach the base
/// of the thread without meeting a `catch_unwind` frame (std puts one under
/// every `std::thread`), or the process aborts. The entry point is therefore
/// `extern "C-unwind"` and catches nothing; a Rust panic that escapes the
/// entry aborts the process.
///

use std::ffi::c_void;
use std::io;
use std::mem::{self, ManuallyDrop};
use std::ptr;
use std::time::Duration;

use strand_core::{Result, SyncError};

use super::{Entry, Platform};

/// Linux rejects names longer than 15 bytes plus the terminator.
#[cfg(any(target_os = "linux", target_os = "android"))]
const NATIVE_NAME_MAX: usize = 15;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const NATIVE_NAME_MAX: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PthreadHandle(libc::pthread_t);

// pthread_t is an opaque id; it is only dereferenced by libc.
unsafe impl Send for PthreadHandle {}
unsafe impl Sync for PthreadHandle {}

/// A joinable pthread. Detached when dropped without `join`.
pub struct Pthread {
    handle: PthreadHandle,
}

impl Drop for Pthread {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_detach(self.handle.0);
        }
    }
}

type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;
type UnwindingStartRoutine = extern "C-unwind" fn(*mut c_void) -> *mut c_void;

extern "C-unwind" fn thread_start(arg: *mut c_void) -> *mut c_void {
    // `spawn` hands each thread exactly one leaked entry.
    let entry = unsafe { Box::from_raw(arg.cast::<Entry>()) };
    entry();
    ptr::null_mut()
}

pub struct Pthreads;

impl Platform for Pthreads {
    type Handle = PthreadHandle;
    type Thread = Pthread;

    fn spawn(name: &str, stack_size: usize, entry: Entry) -> io::Result<Pthread> {
        let cname = native_name(name);
        let entry: Entry = Box::new(move || {
            if cname.len() > 1 {
                let me = PthreadHandle(unsafe { libc::pthread_self() });
                set_native_name(me, &cname);
            }
            entry();
        });
        let arg = Box::into_raw(Box::new(entry));

        let mut native: libc::pthread_t = unsafe { mem::zeroed() };
        let rc = unsafe { create(&mut native, stack_size, arg.cast()) };
        if rc != 0 {
            // The thread never ran, so the entry is still ours to free.
            drop(unsafe { Box::from_raw(arg) });
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(Pthread {
            handle: PthreadHandle(native),
        })
    }

    fn handle(thread: &Pthread) -> PthreadHandle {
        thread.handle
    }

    fn join(thread: Pthread) {
        let thread = ManuallyDrop::new(thread);
        unsafe {
            libc::pthread_join(thread.handle.0, ptr::null_mut());
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn current_thread_id() -> u64 {
        unsafe { libc::syscall(libc::SYS_gettid) as u64 }
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn current_thread_id() -> u64 {
        unsafe { libc::pthread_self() as usize as u64 }
    }

    fn sleep_ms(ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }

    fn yield_now() {
        unsafe {
            libc::sched_yield();
        }
    }

    fn set_name(handle: PthreadHandle, name: &str) -> bool {
        let cname = native_name(name);
        set_native_name(handle, &cname)
    }

    fn get_priority(handle: PthreadHandle) -> Option<i32> {
        sched_params(handle).map(|(_, param)| param.sched_priority)
    }

    fn set_priority(handle: PthreadHandle, priority: i32) -> bool {
        let Some((policy, mut param)) = sched_params(handle) else {
            return false;
        };
        param.sched_priority = priority;
        unsafe { libc::pthread_setschedparam(handle.0, policy, &param) == 0 }
    }

    fn suspend(_handle: PthreadHandle) -> Result<u32> {
        Err(SyncError::Unsupported { operation: "suspend" })
    }

    fn resume(_handle: PthreadHandle) -> Result<u32> {
        Err(SyncError::Unsupported { operation: "resume" })
    }

    unsafe fn terminate(handle: PthreadHandle, _exit_code: i32) -> Result<bool> {
        let rc = unsafe { libc::pthread_cancel(handle.0) };
        // ESRCH: the thread already finished but is not joined yet.
        if rc == 0 || rc == libc::ESRCH {
            Ok(false)
        } else {
            Err(SyncError::Native {
                call: "pthread_cancel",
                code: rc,
            })
        }
    }
}

/// # Safety
///
/// `arg` must be a leaked `Box<Entry>` that `thread_start` may take over.
unsafe fn create(native: &mut libc::pthread_t, stack_size: usize, arg: *mut c_void) -> libc::c_int {
    unsafe {
        let mut attr: libc::pthread_attr_t = mem::zeroed();
        let rc = libc::pthread_attr_init(&mut attr);
        if rc != 0 {
            return rc;
        }

        let mut rc = libc::pthread_attr_setstacksize(&mut attr, stack_bytes(stack_size));
        if rc == 0 {
            // Same calling convention; only the unwind contract differs.
            let start = mem::transmute::<UnwindingStartRoutine, StartRoutine>(thread_start);
            rc = libc::pthread_create(native, &attr, start, arg);
        }
        libc::pthread_attr_destroy(&mut attr);
        rc
    }
}

/// Rounds up to the pthread minimum and a whole number of pages.
fn stack_bytes(requested: usize) -> usize {
    let page = match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    };
    requested.max(libc::PTHREAD_STACK_MIN).div_ceil(page) * page
}

fn sched_params(handle: PthreadHandle) -> Option<(libc::c_int, libc::sched_param)> {
    let mut policy: libc::c_int = 0;
    let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::pthread_getschedparam(handle.0, &mut policy, &mut param) };
    (rc == 0).then_some((policy, param))
}

/// Truncates on a char boundary and drops interior NULs.
fn native_name(name: &str) -> Vec<u8> {
    let mut end = name.len().min(NATIVE_NAME_MAX);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let mut bytes: Vec<u8> = name[..end].bytes().filter(|&b| b != 0).collect();
    bytes.push(0);
    bytes
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn set_native_name(handle: PthreadHandle, cname: &[u8]) -> bool {
    unsafe { libc::pthread_setname_np(handle.0, cname.as_ptr() as *const libc::c_char) == 0 }
}

/// Apple only lets a thread name itself.
#[cfg(any(target_os = "macos", target_os = "ios"))]
fn set_native_name(handle: PthreadHandle, cname: &[u8]) -> bool {
    unsafe {
        if libc::pthread_equal(handle.0, libc::pthread_self()) == 0 {
            return false;
        }
        libc::pthread_setname_np(cname.as_ptr() as *const libc::c_char) == 0
    }
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios"
)))]
fn set_native_name(_handle: PthreadHandle, _cname: &[u8]) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_name_truncates_on_char_boundary() {
        let name = native_name("ééééééééé");
        assert_eq!(*name.last().unwrap(), 0);
        let text = std::str::from_utf8(&name[..name.len() - 1]).unwrap();
        assert!(text.len() <= NATIVE_NAME_MAX);
        assert!(text.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_native_name_strips_nul() {
        assert_eq!(native_name("a\0b"), b"ab\0".to_vec());
    }

    #[test]
    fn test_thread_ids_differ() {
        let main_id = Pthreads::current_thread_id();
        let other_id = std::thread::spawn(Pthreads::current_thread_id).join().unwrap();
        assert_ne!(main_id, 0);
        assert_ne!(main_id, other_id);
    }

    #[test]
    fn test_suspend_is_unsupported() {
        let thread = Pthreads::spawn("", 0, Box::new(|| {})).unwrap();
        let handle = Pthreads::handle(&thread);
        assert!(matches!(Pthreads::suspend(handle), Err(SyncError::Unsupported { .. })));
        assert!(matches!(Pthreads::resume(handle), Err(SyncError::Unsupported { .. })));
        Pthreads::join(thread);
    }

    #[test]
    fn test_stack_size_rounded_to_pages() {
        let bytes = stack_bytes(1);
        assert!(bytes >= libc::PTHREAD_STACK_MIN);
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        assert_eq!(bytes % page, 0);
        assert_eq!(stack_bytes(4 * 1024 * 1024), 4 * 1024 * 1024);
    }

    #[test]
    fn test_spawn_runs_entry_and_join_waits() {
        let (tx, rx) = std::sync::mpsc::channel();
        let thread = Pthreads::spawn("", 256 * 1024, Box::new(move || {
            std::thread::sleep(Duration::from_millis(20));
            tx.send(Pthreads::current_thread_id()).unwrap();
        }))
        .unwrap();
        Pthreads::join(thread);

        let worker_id = rx.try_recv().expect("entry finished before join returned");
        assert_ne!(worker_id, Pthreads::current_thread_id());
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn test_spawn_names_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let thread = Pthreads::spawn("strand-unit", 256 * 1024, Box::new(move || {
            let mut buf = [0 as libc::c_char; 16];
            let rc = unsafe {
                libc::pthread_getname_np(libc::pthread_self(), buf.as_mut_ptr(), buf.len())
            };
            let name = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
            tx.send((rc, name.to_string_lossy().into_owned())).unwrap();
        }))
        .unwrap();
        Pthreads::join(thread);

        assert_eq!(rx.recv().unwrap(), (0, "strand-unit".to_string()));
    }
}
