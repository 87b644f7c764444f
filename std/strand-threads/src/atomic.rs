///
/// Interlocked Integer Operations
///
/// Fixed-width fetch-and-modify primitives over `AtomicI32` and `AtomicI64`.
/// Every operation reads the prior value, computes the new one and writes it
/// back in a single indivisible step, then returns the prior value.
///
/// ## Ordering
///
/// - increment / decrement / exchange / exchange_add: `AcqRel`, a full
///   bidirectional barrier around the operation
/// - compare_exchange / assign_if: `SeqCst` on success, `Relaxed` on failure
///
/// Plain loads elsewhere get no ordering beyond what `AcqRel` provides.
///
/// ## Compare-exchange
///
/// `interlocked_compare_exchange` makes exactly one attempt and returns the
/// value observed, whether or not it matched. `interlocked_assign_if` is the
/// boolean form. Neither retries.
///
/// Usage:
/// ```rust,ignore
/// use std::sync::atomic::AtomicI32;
/// use strand_threads::Interlocked;
///
/// let counter = AtomicI32::new(0);
/// assert_eq!(counter.interlocked_increment(), 0);
/// assert!(counter.interlocked_assign_if(10, 1));
/// assert_eq!(counter.interlocked_compare_exchange(20, 1), 10);
/// ```
///

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

pub trait Interlocked {
    type Value: Copy;

    fn interlocked_increment(&self) -> Self::Value;
    fn interlocked_decrement(&self) -> Self::Value;
    fn interlocked_exchange(&self, value: Self::Value) -> Self::Value;
    fn interlocked_exchange_add(&self, value: Self::Value) -> Self::Value;
    /// Writes `value` only if the location holds `comperand`; returns the
    /// prior value either way.
    fn interlocked_compare_exchange(&self, value: Self::Value, comperand: Self::Value) -> Self::Value;
    fn interlocked_assign_if(&self, value: Self::Value, comperand: Self::Value) -> bool;
}

macro_rules! impl_interlocked {
    ($atomic:ty, $int:ty) => {
        impl Interlocked for $atomic {
            type Value = $int;

            #[inline]
            fn interlocked_increment(&self) -> $int {
                self.fetch_add(1, Ordering::AcqRel)
            }

            #[inline]
            fn interlocked_decrement(&self) -> $int {
                self.fetch_sub(1, Ordering::AcqRel)
            }

            #[inline]
            fn interlocked_exchange(&self, value: $int) -> $int {
                self.swap(value, Ordering::AcqRel)
            }

            #[inline]
            fn interlocked_exchange_add(&self, value: $int) -> $int {
                self.fetch_add(value, Ordering::AcqRel)
            }

            #[inline]
            fn interlocked_compare_exchange(&self, value: $int, comperand: $int) -> $int {
                match self.compare_exchange(comperand, value, Ordering::SeqCst, Ordering::Relaxed) {
                    Ok(prior) | Err(prior) => prior,
                }
            }

            #[inline]
            fn interlocked_assign_if(&self, value: $int, comperand: $int) -> bool {
                self.compare_exchange(comperand, value, Ordering::SeqCst, Ordering::Relaxed)
                    .is_ok()
            }
        }
    };
}

impl_interlocked!(AtomicI32, i32);
impl_interlocked!(AtomicI64, i64);
