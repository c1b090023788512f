// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Architecture support: saving and resuming task continuations.
//!
//! A continuation is nothing more than a saved stack pointer. Everything else
//! the suspended code needs (callee-saved registers, return address) is pushed
//! onto its own stack by [`switch`] before the pointer is recorded.
//!
//! Each port provides:
//!
//! - `init_context(stack_top, entry)`: lays out a fresh frame at the top of a
//!   stack so that the first `switch` into it starts executing `entry`.
//! - `switch(save, load)`: saves the caller into `save` and resumes `load`.
//!   Returns when some later `switch` resumes `save`.
//! - `restart(stack_top, entry)`: discards the current stack and jumps to
//!   `entry` with the stack pointer at `stack_top`.
//! - `enable_interrupts()`: used by freshly started tasks, which begin life
//!   inside the critical section of whoever switched to them.

/// Saved continuation of a task that is not running.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) sp: *mut u32,
}

impl Context {
    /// Context of something that has never been suspended.
    pub(crate) const EMPTY: Self = Self { sp: core::ptr::null_mut() };
}

/// Signature of the function a fresh context starts in.
pub(crate) type Entry = extern "C" fn() -> !;

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "arm", target_os = "none"))] {
        mod thumb;
        pub(crate) use self::thumb::*;
    } else {
        mod host;
        pub(crate) use self::host::*;
    }
}
