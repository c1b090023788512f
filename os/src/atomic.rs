// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Atomic "polyfill" routines, to use a term from JavaScript.
//!
//! ARMv6-M processors like the Cortex-M0 have no atomic read-modify-write
//! instructions. The tick interrupt still needs to bump a counter that task
//! code reads, so this module provides a trait that uses the native atomics on
//! M3 and later (and on the host), and falls back to a critical section on M0.
//!
//! The fallback hurts interrupt latency a little. The M0 already has pretty poor
//! interrupt latency because of uninterruptible instructions, so it's not a big
//! loss.

use core::sync::atomic::{AtomicU32, Ordering};

/// Atomic operations that apply to arithmetic types.
pub trait AtomicArithExt {
    /// Primitive type corresponding to this atomic type.
    type Value;

    /// Atomically add `val` to our contents, wrapping on overflow, and return
    /// the original value.
    fn fetch_add_polyfill(&self, val: Self::Value, ordering: Ordering) -> Self::Value;
}

macro_rules! impl_atomic_arith_polyfills {
    ($t:ty, $v:ty) => {
        // Native version
        #[cfg(intros_has_native_rmw)]
        impl AtomicArithExt for $t {
            type Value = $v;

            fn fetch_add_polyfill(
                &self,
                val: Self::Value,
                ordering: Ordering,
            ) -> Self::Value {
                self.fetch_add(val, ordering)
            }
        }

        // Non-native version
        #[cfg(not(intros_has_native_rmw))]
        impl AtomicArithExt for $t {
            type Value = $v;

            fn fetch_add_polyfill(
                &self,
                val: Self::Value,
                ordering: Ordering,
            ) -> Self::Value {
                let (lo, so) = rmw_ordering(ordering);
                critical_section::with(|_| {
                    let x = self.load(lo);
                    self.store(x.wrapping_add(val), so);
                    x
                })
            }
        }
    };
}

impl_atomic_arith_polyfills!(AtomicU32, u32);

#[cfg(not(intros_has_native_rmw))]
#[inline(always)]
fn rmw_ordering(o: Ordering) -> (Ordering, Ordering) {
    match o {
        Ordering::AcqRel => (Ordering::Acquire, Ordering::Release),
        Ordering::Relaxed => (o, o),
        Ordering::SeqCst => (o, o),
        Ordering::Acquire => (Ordering::Acquire, Ordering::Relaxed),
        Ordering::Release => (Ordering::Relaxed, Ordering::Release),
        _ => panic!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_add_wraps() {
        let a = AtomicU32::new(u32::MAX);
        assert_eq!(a.fetch_add_polyfill(2, Ordering::Relaxed), u32::MAX);
        assert_eq!(a.load(Ordering::Relaxed), 1);
    }
}
