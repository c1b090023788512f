// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compile-time kernel configuration.
//!
//! All limits are fixed at compile time. The kernel never allocates.

/// Number of slots in the scheduler's node table. One slot is permanently used
/// by the main context; every [`Task`][crate::task::Task] and
/// [`Timer`][crate::timer::Timer] takes another until it is deleted.
pub const MAX_NODES: usize = 16;

/// Tick rate the SysTick driver is configured for, in Hz. With the default of
/// 1 kHz a [`Ticks`][crate::time::Ticks] is one millisecond.
pub const TICK_HZ: u32 = 1000;

/// Smallest task stack accepted by [`Stack::new`][crate::task::Stack::new], in
/// words. This covers the saved context frame and the canary with a little
/// room to spare; real tasks need much more.
pub const MIN_STACK_WORDS: usize = 32;

/// Word written at the lowest address of every task stack when the
/// `stack-check` feature is enabled.
pub const STACK_CANARY: u32 = 0xDEAD_C0DE;
