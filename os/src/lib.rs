// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A tiny cooperative kernel with stackful tasks.
//!
//! This provides a minimal operating environment for single-core
//! microcontrollers: a round-robin scheduler, software timers, and a family of
//! synchronization and queueing primitives built directly on top of it.
//!
//! # `intros` design principles
//!
//! 1. Be compact. Avoid doing things that increase the minimum size of a useful
//!    application. The kernel state is a fixed-size table in a single `static`,
//!    and every primitive is a plain value with a `const` constructor.
//!
//! 2. No magic. Every blocking operation is a loop around a non-blocking
//!    `try_` operation and a call into the scheduler. You can write your own
//!    primitives the same way using [`exec::until`].
//!
//! 3. Be predictable. No dynamic memory allocation, no priorities, no
//!    preemption. A task runs until it blocks, sleeps or yields.
//!
//! # About the OS
//!
//! Each task gets its own stack, supplied by the application as a
//! [`task::Stack`]. Tasks, timers and the startup context ("main") are kept in a
//! single ring. Whenever the running task gives up the CPU, the scheduler walks
//! forward around the ring from that task and:
//!
//! - skips anything stopped or suspended,
//! - resumes the first task that is ready,
//! - wakes a sleeping task whose countdown has expired, and
//! - fires any timer whose countdown has expired, running its callback in
//!   place, and keeps scanning.
//!
//! The hardware tick interrupt only advances the tick counter in [`time`]. It
//! never switches tasks.
//!
//! ```ignore
//! static BLINKY_STACK: Stack<256> = Stack::new();
//!
//! fn blinky() {
//!     led_toggle();
//!     Task::sleep_for(Ticks(500));
//! }
//!
//! #[entry]
//! fn main() -> ! {
//!     let mut cp = cortex_m::Peripherals::take().unwrap();
//!     intros::exec::init();
//!     intros::time::initialize_sys_tick(&mut cp.SYST, 16_000_000);
//!
//!     Task::new(&BLINKY_STACK, blinky).start();
//!     intros::exec::run()
//! }
//! ```
//!
//! A task's entry function is called again each time it returns, so `blinky`
//! above blinks forever. A task that should run once ends with
//! [`Task::stop`][task::Task::stop].
//!
//! # Blocking
//!
//! Waiting tasks are not parked on wait lists. A task waiting on a semaphore,
//! say, stays in the ring and re-checks the semaphore each time its turn comes
//! around. This keeps every primitive tiny, at the cost of some wasted cycles
//! and of ordering: waiters are served in ring order, not in the order in
//! which they started waiting.
//!
//! # Concurrency and interrupts
//!
//! All kernel state is touched only inside [`critical_section::with`], so
//! interrupt handlers may safely call the non-blocking `try_` and `give`-style
//! operations of the primitives. They must never call anything that blocks.
//!
//! Interrupts are left enabled while tasks run. Each step of the scheduler's
//! scan runs in its own short critical section, so the tick keeps advancing
//! while the scan spins waiting for something to become due.

#![no_std]

#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications,
)]

#[cfg(test)]
extern crate std;

/// Internal assert macro that doesn't stringify its expression or generate any
/// fancy messages. This means failures must be diagnosed by file:line only, so,
/// don't use this more than once on the same line. In exchange, this makes
/// asserts significantly smaller in terms of text size.
macro_rules! cheap_assert {
    ($x:expr) => {
        if !$x { panic!(); };
    }
}
pub(crate) use cheap_assert;

/// Like `cheap_assert!`, but only checked in builds with debug assertions.
/// Used for API misuse that can't corrupt memory.
macro_rules! debug_cheap_assert {
    ($x:expr) => {
        if cfg!(debug_assertions) && !$x { panic!(); };
    }
}
pub(crate) use debug_cheap_assert;

mod error;
mod node;
mod port;
mod ring;
mod sync;

pub mod atomic;
pub mod config;
pub mod exec;
pub mod task;
pub mod time;
pub mod timer;

pub mod barrier;
pub mod condvar;
pub mod event;
pub mod flag;
pub mod mutex;
pub mod rwlock;
pub mod semaphore;
pub mod signal;

pub mod job_queue;
pub mod mailbox;
pub mod message_buffer;
pub mod pool;
pub mod stream_buffer;

#[cfg(all(feature = "systick", target_arch = "arm", target_os = "none"))]
mod cortex_m_timer;

pub use error::{Error, Result};
pub use node::{State, Wakeup};
