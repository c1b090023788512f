// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tasks: stackful threads of control, scheduled cooperatively.
//!
//! A task is created from a caller-supplied [`Stack`] and an entry function.
//! Once started, the task calls its entry function over and over, forever. A
//! task that should run only once ends its entry function with
//! [`Task::stop`].
//!
//! ```ignore
//! static WORKER_STACK: Stack<256> = Stack::new();
//!
//! fn worker() {
//!     let job = JOBS.take();
//!     process(job);
//! }
//!
//! let worker = Task::new(&WORKER_STACK, worker);
//! worker.start()?;
//! ```
//!
//! # Sleeping
//!
//! The `sleep` family takes the calling task out of the scan until a countdown
//! expires or until another task calls [`Task::resume`]. Each returns a
//! [`Wakeup`] saying which happened. A task in [`Task::sleep`] has no
//! countdown and only wakes on `resume`.
//!
//! Main (the context that called [`exec::init`][crate::exec::init]) is a task
//! too, as far as sleeping, suspending and resuming go. It has no `Stack` of
//! its own, so it can't be started, stopped, killed or flipped.

use core::cell::UnsafeCell;

use crate::config::MIN_STACK_WORDS;
use crate::exec::{self, task_trampoline, Scheduler, KERNEL};
use crate::node::{Countdown, NodeId, NodeKind, StackRegion, TaskData, Thread};
use crate::port;
use crate::sync::Shared;
use crate::time::{TickTime, Ticks};
use crate::{Error, Result, State, Wakeup};

/// Memory for one task's stack, `WORDS` 32-bit words long.
///
/// Declare these as `static`s. A stack can belong to only one task at a time;
/// creating a second task on a stack that is still in use panics.
#[repr(C, align(8))]
pub struct Stack<const WORDS: usize> {
    words: UnsafeCell<[u32; WORDS]>,
    claimed: Shared<bool>,
}

// Safety: the words are only touched by the task that claimed the stack (and
// by the scheduler while setting that task up).
unsafe impl<const WORDS: usize> Sync for Stack<WORDS> {}

impl<const WORDS: usize> Stack<WORDS> {
    /// Creates an unclaimed stack.
    ///
    /// # Panics
    ///
    /// If `WORDS` is less than [`MIN_STACK_WORDS`]. In a `static` initializer
    /// this is a compile error.
    pub const fn new() -> Self {
        cheap_assert!(WORDS >= MIN_STACK_WORDS);
        Self {
            words: UnsafeCell::new([0; WORDS]),
            claimed: Shared::new(false),
        }
    }

    fn claim(&'static self) -> StackRegion {
        self.claimed.with(|claimed| {
            cheap_assert!(!*claimed);
            *claimed = true;
        });
        StackRegion { base: self.words.get().cast(), words: WORDS }
    }
}

impl<const WORDS: usize> Default for Stack<WORDS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WORDS: usize> core::fmt::Debug for Stack<WORDS> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("words", &WORDS)
            .field("claimed", &self.claimed)
            .finish()
    }
}

/// Handle to a task.
///
/// Handles are cheap copies of a slot number in the scheduler's table. Using
/// one after [`Task::delete`] refers to whatever occupies the slot next.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Task(NodeId);

impl Task {
    /// Creates a stopped task that will run `entry` on `stack` once started.
    ///
    /// # Panics
    ///
    /// If `stack` already belongs to a task, or the scheduler's table is full.
    pub fn new<const WORDS: usize>(stack: &'static Stack<WORDS>, entry: fn()) -> Self {
        let region = stack.claim();
        let id = KERNEL.with(|s| {
            s.allocate(NodeKind::Task(TaskData {
                thread: Thread::new(),
                entry,
                stack: region,
                claim: &stack.claimed,
            }))
        });
        log::trace!("task {} created, {} stack words", id.0, WORDS);
        Task(id)
    }

    pub(crate) fn from_id(id: NodeId) -> Self {
        Task(id)
    }

    /// Handle to the calling task (or main).
    pub fn current() -> Self {
        Task(exec::current_id())
    }

    /// Checks whether this is the main context rather than a started task.
    pub fn is_main(self) -> bool {
        self.0 == NodeId::MAIN
    }

    /// Current scheduling state.
    pub fn state(self) -> State {
        KERNEL.with(|s| s.node(self.0).state)
    }

    /// Starts a stopped task at the beginning of its entry function, with a
    /// fresh stack.
    ///
    /// Fails if the task isn't stopped.
    pub fn start(self) -> Result<()> {
        KERNEL.with(|s| s.start_task(self.0))?;
        log::debug!("task {} started", self.0 .0);
        Ok(())
    }

    /// Replaces the task's entry function with `entry`, then starts it.
    ///
    /// Fails, changing nothing, if the task isn't stopped.
    pub fn start_from(self, entry: fn()) -> Result<()> {
        KERNEL.with(|s| {
            if s.node(self.0).state != State::Stopped {
                return Err(Error::Failure);
            }
            if let Some(task) = s.node_mut(self.0).task_mut() {
                task.entry = entry;
            }
            s.start_task(self.0)
        })?;
        log::debug!("task {} started", self.0 .0);
        Ok(())
    }

    /// Stops the calling task. It leaves the ring and never runs again unless
    /// someone starts it afresh.
    ///
    /// # Panics
    ///
    /// If called from main.
    pub fn stop() -> ! {
        let me = KERNEL.with(|s| {
            let me = s.running();
            cheap_assert!(me != NodeId::MAIN);
            s.stop_task(me);
            me
        });
        log::debug!("task {} stopped", me.0);
        exec::switch_to_next();
        // A stopped task is never resumed; a restart begins at the trampoline.
        panic!()
    }

    /// Stops this task, wherever it is. Killing the calling task is the same as
    /// [`Task::stop`]; killing a stopped task does nothing.
    ///
    /// Anything the victim held (a mutex, say) stays held.
    ///
    /// # Panics
    ///
    /// If this is main.
    pub fn kill(self) {
        cheap_assert!(!self.is_main());
        if self == Task::current() {
            Task::stop();
        }
        KERNEL.with(|s| s.stop_task(self.0));
        log::debug!("task {} killed", self.0 .0);
    }

    /// Blocks until this task is stopped.
    ///
    /// # Panics
    ///
    /// If this is the calling task, which would wait forever.
    pub fn join(self) {
        cheap_assert!(self != Task::current());
        exec::until(|| self.state() == State::Stopped)
    }

    /// Like [`Task::join`], giving up after `timeout`.
    pub fn join_for(self, timeout: Ticks) -> Result<()> {
        cheap_assert!(self != Task::current());
        exec::until_timeout(timeout, || self.state() == State::Stopped)
    }

    /// Abandons the calling task's stack and restarts it from the top in
    /// `entry`, which also becomes its entry function from now on.
    ///
    /// Must not be called inside a critical section: the restarted task runs
    /// with interrupts enabled.
    ///
    /// # Panics
    ///
    /// If called from main.
    pub fn flip(entry: fn()) -> ! {
        let top = KERNEL.with(|s| {
            let me = s.running();
            match s.node_mut(me).task_mut() {
                Some(task) => {
                    task.entry = entry;
                    fresh_stack_top(&task.stack)
                }
                None => panic!(),
            }
        });
        // Safety: we're leaving the current stack for good, and nothing else
        // refers to it.
        unsafe { port::restart(top, task_trampoline) }
    }

    /// Frees this task's table slot and releases its stack.
    ///
    /// # Panics
    ///
    /// If the task isn't stopped, or is the caller.
    pub fn delete(self) {
        let kind = KERNEL.with(|s| {
            cheap_assert!(self.0 != s.running());
            s.release(self.0)
        });
        if let NodeKind::Task(task) = kind {
            task.claim.with(|claimed| *claimed = false);
        }
        log::trace!("task {} deleted", self.0 .0);
    }

    /// Puts the calling task to sleep for `delay` ticks.
    pub fn sleep_for(delay: Ticks) -> Wakeup {
        sleep_with(|_, now| Countdown::new(now, delay, Ticks::ZERO))
    }

    /// Puts the calling task to sleep until `deadline`. A deadline in the past
    /// (or too far away to represent) wakes at the next scan.
    pub fn sleep_until(deadline: TickTime) -> Wakeup {
        sleep_with(|_, now| Countdown::until(now, deadline))
    }

    /// Puts the calling task to sleep until `delay` ticks after the end of its
    /// previous sleep. Sleeping in a loop this way keeps a steady period no
    /// matter how long the work between sleeps takes.
    pub fn sleep_next(delay: Ticks) -> Wakeup {
        sleep_with(|previous, _| Countdown::new(previous.end(), delay, Ticks::ZERO))
    }

    /// Suspends the calling task until someone calls [`Task::resume`] on it.
    pub fn sleep() -> Wakeup {
        let me = KERNEL.with(|s| {
            let me = s.running();
            s.node_mut(me).state = State::Suspended;
            me
        });
        exec::switch_to_next();
        KERNEL.with(|s| s.wakeup_of(me))
    }

    /// Suspends this task. A suspended task is skipped by the scheduler until
    /// [`Task::resume`]d; it never times out. Suspending the calling task is
    /// the same as [`Task::sleep`].
    ///
    /// Fails if the task isn't ready or sleeping.
    pub fn suspend(self) -> Result<()> {
        KERNEL.with(|s| s.suspend_task(self.0))?;
        if self == Task::current() {
            exec::switch_to_next();
        }
        Ok(())
    }

    /// Wakes a sleeping or suspended task, handing it `event` as
    /// [`Wakeup::Resumed`].
    ///
    /// Safe to call from an interrupt handler. Fails if the task isn't
    /// sleeping or suspended.
    pub fn resume(self, event: u32) -> Result<()> {
        KERNEL.with(|s| s.resume_task(self.0, event))
    }
}

fn sleep_with(countdown: impl FnOnce(&Countdown, TickTime) -> Countdown) -> Wakeup {
    let now = TickTime::now();
    let me = KERNEL.with(|s| {
        let me = s.running();
        let node = s.node_mut(me);
        node.countdown = countdown(&node.countdown, now);
        node.state = State::Delayed;
        me
    });
    exec::switch_to_next();
    KERNEL.with(|s| s.wakeup_of(me))
}

/// Top of `stack` ready for a fresh start, with the canary (re)written.
fn fresh_stack_top(stack: &StackRegion) -> *mut u32 {
    #[cfg(feature = "stack-check")]
    // Safety: the region belongs to the task being (re)started.
    unsafe {
        stack.base.write_volatile(crate::config::STACK_CANARY);
    }
    stack.top()
}

impl Scheduler {
    pub(crate) fn start_task(&mut self, id: NodeId) -> Result<()> {
        let node = self.node_mut(id);
        if node.state != State::Stopped {
            return Err(Error::Failure);
        }
        let task = match node.task_mut() {
            Some(task) => task,
            None => panic!(),
        };
        let top = fresh_stack_top(&task.stack);
        // Safety: the task is stopped, so nothing is running on its stack.
        task.thread.context = unsafe { port::init_context(top, task_trampoline) };
        task.thread.wakeup = Wakeup::Timeout;
        node.countdown = Countdown::IDLE;
        node.state = State::Ready;
        self.link(id);
        Ok(())
    }

    pub(crate) fn stop_task(&mut self, id: NodeId) {
        cheap_assert!(self.node(id).task().is_some());
        self.unlink(id);
        self.node_mut(id).state = State::Stopped;
    }

    pub(crate) fn suspend_task(&mut self, id: NodeId) -> Result<()> {
        let node = self.node_mut(id);
        cheap_assert!(node.thread().is_some());
        match node.state {
            State::Ready | State::Delayed => {
                node.state = State::Suspended;
                Ok(())
            }
            _ => Err(Error::Failure),
        }
    }

    pub(crate) fn resume_task(&mut self, id: NodeId, event: u32) -> Result<()> {
        let node = self.node_mut(id);
        if !matches!(node.state, State::Delayed | State::Suspended) {
            return Err(Error::Failure);
        }
        match node.thread_mut() {
            Some(thread) => thread.wakeup = Wakeup::Resumed(event),
            None => return Err(Error::Failure),
        }
        node.state = State::Ready;
        Ok(())
    }

    pub(crate) fn wakeup_of(&self, id: NodeId) -> Wakeup {
        match self.node(id).thread() {
            Some(thread) => thread.wakeup,
            None => panic!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::tests::{add_task, at, scan, scheduler};

    fn nothing() {}

    fn add_real_task<const W: usize>(s: &mut Scheduler, stack: &'static Stack<W>) -> NodeId {
        s.allocate(NodeKind::Task(TaskData {
            thread: Thread::new(),
            entry: nothing,
            stack: stack.claim(),
            claim: &stack.claimed,
        }))
    }

    #[test]
    fn start_links_ready_task_with_fresh_context() {
        static STACK: Stack<64> = Stack::new();
        let mut s = scheduler();
        let t = add_real_task(&mut s, &STACK);
        assert_eq!(s.node(t).state, State::Stopped);
        assert_eq!(s.ring(), [NodeId::MAIN]);

        assert_eq!(s.start_task(t), Ok(()));
        assert_eq!(s.node(t).state, State::Ready);
        assert_eq!(s.ring(), [NodeId::MAIN, t]);
        let sp = s.node(t).thread().map(|th| th.context.sp as usize);
        assert!(sp.is_some_and(|sp| sp > STACK.words.get() as usize));

        assert_eq!(s.start_task(t), Err(Error::Failure));
    }

    #[test]
    fn stop_unlinks_and_restart_relinks() {
        static STACK: Stack<64> = Stack::new();
        let mut s = scheduler();
        let t = add_real_task(&mut s, &STACK);
        s.start_task(t).unwrap();
        s.stop_task(t);
        assert_eq!(s.node(t).state, State::Stopped);
        assert_eq!(s.ring(), [NodeId::MAIN]);
        s.start_task(t).unwrap();
        assert_eq!(s.ring(), [NodeId::MAIN, t]);
    }

    #[test]
    #[should_panic]
    fn stack_cannot_be_claimed_twice() {
        static STACK: Stack<64> = Stack::new();
        STACK.claim();
        STACK.claim();
    }

    #[test]
    fn suspend_and_resume() {
        let mut s = scheduler();
        let t = add_task(&mut s, State::Ready);

        assert_eq!(s.resume_task(t, 1), Err(Error::Failure));
        assert_eq!(s.suspend_task(t), Ok(()));
        assert_eq!(s.suspend_task(t), Err(Error::Failure));
        assert_eq!(scan(&mut s, at(0)).0, NodeId::MAIN);

        assert_eq!(s.resume_task(t, 42), Ok(()));
        assert_eq!(s.node(t).state, State::Ready);
        assert_eq!(s.wakeup_of(t), Wakeup::Resumed(42));
        assert_eq!(scan(&mut s, at(0)).0, t);
    }

    #[test]
    fn suspended_task_never_times_out() {
        let mut s = scheduler();
        let t = add_task(&mut s, State::Suspended);
        s.node_mut(t).countdown = Countdown::new(at(0), Ticks(1), Ticks::ZERO);
        for now in [0, 1, 1000, u32::MAX] {
            assert_eq!(scan(&mut s, at(now)).0, NodeId::MAIN);
        }
    }

    #[test]
    fn resume_cuts_sleep_short() {
        let mut s = scheduler();
        let t = add_task(&mut s, State::Delayed);
        s.node_mut(t).countdown = Countdown::new(at(100), Ticks(10), Ticks::ZERO);
        assert_eq!(scan(&mut s, at(101)).0, NodeId::MAIN);
        s.resume_task(t, 7).unwrap();
        assert_eq!(scan(&mut s, at(102)).0, t);
        assert_eq!(s.wakeup_of(t), Wakeup::Resumed(7));
    }

    #[test]
    fn delayed_task_can_be_suspended() {
        let mut s = scheduler();
        let t = add_task(&mut s, State::Delayed);
        s.suspend_task(t).unwrap();
        assert_eq!(scan(&mut s, at(1_000_000)).0, NodeId::MAIN);
        assert_eq!(s.node(t).state, State::Suspended);
    }

    #[test]
    fn main_can_sleep() {
        let mut s = scheduler();
        let t = add_task(&mut s, State::Ready);
        s.node_mut(NodeId::MAIN).countdown = Countdown::new(at(0), Ticks(5), Ticks::ZERO);
        s.node_mut(NodeId::MAIN).state = State::Delayed;
        assert_eq!(scan(&mut s, at(1)).0, t);
        assert_eq!(scan(&mut s, at(2)).0, t);
        assert_eq!(scan(&mut s, at(5)).0, NodeId::MAIN);
        assert_eq!(s.wakeup_of(NodeId::MAIN), Wakeup::Timeout);
    }

    #[test]
    fn sleep_next_keeps_phase() {
        let mut s = scheduler();
        let t = add_task(&mut s, State::Delayed);
        s.node_mut(t).countdown = Countdown::new(at(0), Ticks(10), Ticks::ZERO);
        assert_eq!(scan(&mut s, at(13)).0, t);

        // Same computation `Task::sleep_next` does, three ticks late.
        let next = Countdown::new(s.node(t).countdown.end(), Ticks(10), Ticks::ZERO);
        assert_eq!(next.start, at(10));
        s.node_mut(t).countdown = next;
        s.node_mut(t).state = State::Delayed;
        assert_eq!(scan(&mut s, at(19)).0, NodeId::MAIN);
        assert_eq!(scan(&mut s, at(19)).0, NodeId::MAIN);
        assert_eq!(scan(&mut s, at(20)).0, t);
    }
}
