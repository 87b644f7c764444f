//!
//! C ABI for the interlocked operations.
//!
//! Foreign callers pass raw addresses of shared integers. Every function
//! returns the prior value (`assign_if` returns `1`/`0`), and a null address
//! is a no-op returning `0`.
//!
//! # Safety
//!
//! Each address must be valid for the duration of the call, aligned for the
//! atomic type (4 bytes for 32-bit, 8 bytes for 64-bit), and only ever
//! accessed atomically while other threads can see it.
//!

use std::sync::atomic::{AtomicI32, AtomicI64};

use crate::atomic::Interlocked;

macro_rules! interlocked_ffi {
    (
        $atomic:ty, $int:ty,
        $increment:ident, $decrement:ident, $exchange:ident,
        $exchange_add:ident, $compare_exchange:ident, $assign_if:ident
    ) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $increment(target: *mut $int) -> $int {
            if target.is_null() {
                return 0;
            }
            unsafe { <$atomic>::from_ptr(target) }.interlocked_increment()
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $decrement(target: *mut $int) -> $int {
            if target.is_null() {
                return 0;
            }
            unsafe { <$atomic>::from_ptr(target) }.interlocked_decrement()
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $exchange(target: *mut $int, value: $int) -> $int {
            if target.is_null() {
                return 0;
            }
            unsafe { <$atomic>::from_ptr(target) }.interlocked_exchange(value)
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $exchange_add(target: *mut $int, value: $int) -> $int {
            if target.is_null() {
                return 0;
            }
            unsafe { <$atomic>::from_ptr(target) }.interlocked_exchange_add(value)
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $compare_exchange(
            target: *mut $int,
            value: $int,
            comperand: $int,
        ) -> $int {
            if target.is_null() {
                return 0;
            }
            unsafe { <$atomic>::from_ptr(target) }.interlocked_compare_exchange(value, comperand)
        }

        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $assign_if(target: *mut $int, value: $int, comperand: $int) -> i32 {
            if target.is_null() {
                return 0;
            }
            let atomic = unsafe { <$atomic>::from_ptr(target) };
            if atomic.interlocked_assign_if(value, comperand) { 1 } else { 0 }
        }
    };
}

interlocked_ffi!(
    AtomicI32, i32,
    strand_interlocked_increment,
    strand_interlocked_decrement,
    strand_interlocked_exchange,
    strand_interlocked_exchange_add,
    strand_interlocked_compare_exchange,
    strand_interlocked_assign_if
);

interlocked_ffi!(
    AtomicI64, i64,
    strand_interlocked_increment64,
    strand_interlocked_decrement64,
    strand_interlocked_exchange64,
    strand_interlocked_exchange_add64,
    strand_interlocked_compare_exchange64,
    strand_interlocked_assign_if64
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ffi_basic_32() {
        let mut value: i32 = 10;
        let ptr = &mut value as *mut i32;
        unsafe {
            assert_eq!(strand_interlocked_increment(ptr), 10);
            assert_eq!(strand_interlocked_decrement(ptr), 11);
            assert_eq!(strand_interlocked_exchange_add(ptr, 5), 10);
            assert_eq!(strand_interlocked_exchange(ptr, 1), 15);
            assert_eq!(strand_interlocked_compare_exchange(ptr, 2, 1), 1);
            assert_eq!(strand_interlocked_assign_if(ptr, 3, 1), 0);
            assert_eq!(strand_interlocked_assign_if(ptr, 3, 2), 1);
        }
        assert_eq!(value, 3);
    }

    #[test]
    fn test_ffi_null_is_noop() {
        unsafe {
            assert_eq!(strand_interlocked_increment(std::ptr::null_mut()), 0);
            assert_eq!(strand_interlocked_exchange64(std::ptr::null_mut(), 9), 0);
            assert_eq!(strand_interlocked_assign_if64(std::ptr::null_mut(), 1, 0), 0);
        }
    }

    #[test]
    fn test_ffi_concurrent_64() {
        let counter = Box::into_raw(Box::new(AtomicI64::new(0)));

        let handles: Vec<_> = (0..4).map(|_| {
            let ptr = counter as usize;
            thread::spawn(move || {
                unsafe {
                    let target = (*(ptr as *const AtomicI64)).as_ptr();
                    for _ in 0..1_000 {
                        strand_interlocked_increment64(target);
                    }
                }
            })
        }).collect();

        for h in handles {
            h.join().unwrap();
        }

        let counter = unsafe { Box::from_raw(counter) };
        assert_eq!(counter.into_inner(), 4_000);
    }
}
