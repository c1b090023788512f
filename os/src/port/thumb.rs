// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M port.
//!
//! The switch routine sticks to Thumb-1 instructions so the same code runs on
//! ARMv6-M, ARMv7-M and ARMv8-M. Tasks run in thread mode on the main stack
//! pointer; there is no PSP and no PendSV. Interrupt handlers therefore run on
//! whichever task stack happens to be active and every task stack needs room
//! for them.
//!
//! Saved frame, lowest address first:
//!
//! ```text
//! [s16 .. s31]        hard-float targets only
//! r8 r9 r10 r11
//! r4 r5 r6 r7
//! lr                  resumed as pc
//! ```

use core::arch::global_asm;
use core::ptr::addr_of_mut;

use super::{Context, Entry};

#[cfg(not(target_abi = "eabihf"))]
const FRAME_WORDS: usize = 9;
#[cfg(target_abi = "eabihf")]
const FRAME_WORDS: usize = 9 + 16;

extern "C" {
    fn intros_switch(save: *mut *mut u32, load: *mut u32);
    fn intros_restart(stack_top: *mut u32, entry: Entry) -> !;
}

#[cfg(not(target_abi = "eabihf"))]
global_asm!(
    ".syntax unified",
    ".section .text.intros_switch,\"ax\",%progbits",
    ".global intros_switch",
    ".type intros_switch, %function",
    ".thumb_func",
    "intros_switch:",
    // r0 = where to store our sp, r1 = sp to resume.
    "    push {{r4-r7, lr}}",
    "    mov r4, r8",
    "    mov r5, r9",
    "    mov r6, r10",
    "    mov r7, r11",
    "    push {{r4-r7}}",
    "    mov r2, sp",
    "    str r2, [r0]",
    "    mov sp, r1",
    "    pop {{r4-r7}}",
    "    mov r8, r4",
    "    mov r9, r5",
    "    mov r10, r6",
    "    mov r11, r7",
    "    pop {{r4-r7, pc}}",
    ".size intros_switch, . - intros_switch",
);

#[cfg(target_abi = "eabihf")]
global_asm!(
    ".syntax unified",
    ".section .text.intros_switch,\"ax\",%progbits",
    ".global intros_switch",
    ".type intros_switch, %function",
    ".thumb_func",
    "intros_switch:",
    "    push {{r4-r7, lr}}",
    "    mov r4, r8",
    "    mov r5, r9",
    "    mov r6, r10",
    "    mov r7, r11",
    "    push {{r4-r7}}",
    "    vpush {{s16-s31}}",
    "    mov r2, sp",
    "    str r2, [r0]",
    "    mov sp, r1",
    "    vpop {{s16-s31}}",
    "    pop {{r4-r7}}",
    "    mov r8, r4",
    "    mov r9, r5",
    "    mov r10, r6",
    "    mov r11, r7",
    "    pop {{r4-r7, pc}}",
    ".size intros_switch, . - intros_switch",
);

global_asm!(
    ".syntax unified",
    ".section .text.intros_restart,\"ax\",%progbits",
    ".global intros_restart",
    ".type intros_restart, %function",
    ".thumb_func",
    "intros_restart:",
    "    mov sp, r0",
    "    bx r1",
    ".size intros_restart, . - intros_restart",
);

/// Builds a frame below `stack_top` that `switch` will "return" into `entry`
/// with all callee-saved registers zeroed.
///
/// # Safety
///
/// `stack_top` must be 8-byte aligned and have at least `FRAME_WORDS` writable
/// words below it that nothing else is using.
pub(crate) unsafe fn init_context(stack_top: *mut u32, entry: Entry) -> Context {
    // Safety: caller guarantees the frame area is ours to write.
    unsafe {
        let sp = stack_top.sub(FRAME_WORDS);
        for i in 0..FRAME_WORDS - 1 {
            sp.add(i).write(0);
        }
        sp.add(FRAME_WORDS - 1).write(entry as usize as u32);
        Context { sp }
    }
}

/// Saves the caller into `save` and resumes `load`.
///
/// # Safety
///
/// Interrupts must be masked. `save` must be valid for writes and `load` must
/// hold a continuation produced by `init_context` or an earlier `switch` that
/// has not been resumed since.
pub(crate) unsafe fn switch(save: *mut Context, load: *const Context) {
    // Safety: pointer validity is the caller's problem.
    unsafe { intros_switch(addr_of_mut!((*save).sp), (*load).sp) }
}

/// Abandons the current stack and starts `entry` with the stack pointer at
/// `stack_top`.
///
/// # Safety
///
/// Nothing may still refer to anything on the stack being abandoned if it's
/// the current one. `stack_top` must be 8-byte aligned.
pub(crate) unsafe fn restart(stack_top: *mut u32, entry: Entry) -> ! {
    // Safety: see above.
    unsafe { intros_restart(stack_top, entry) }
}

pub(crate) unsafe fn enable_interrupts() {
    // Safety: the caller has left every critical section it knows about.
    unsafe { cortex_m::interrupt::enable() }
}
