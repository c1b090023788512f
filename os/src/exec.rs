// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The scheduler, plus the polling loop every blocking operation is built on.
//!
//! # Starting the operating system
//!
//! Call [`init`] once, early, from your startup routine. This turns the calling
//! context into the permanent "main" node of the ring. Then start some tasks
//! and either call [`run`] (which never returns), or keep using main as an
//! ordinary task that happens to run on the startup stack.
//!
//! If you need code to run every time the scheduler comes back around to
//! main (feeding a watchdog, say, or toggling a pin to measure load), use
//! [`run_with_idle`].
//!
//! # The scan
//!
//! Every time the running task gives up the CPU, by calling
//! [`switch_to_next`] directly or through any blocking operation, the
//! scheduler walks forward around the ring. For each node it visits:
//!
//! - stopped or suspended nodes are skipped;
//! - a ready task is resumed and the scan ends;
//! - a sleeping task whose countdown has expired becomes ready with
//!   [`Wakeup::Timeout`] and is resumed;
//! - a timer whose countdown has expired runs its callback right there, on the
//!   stack of the task that yielded, and the scan continues.
//!
//! Each step of the scan runs in its own critical section, so interrupts are
//! serviced between steps even when nothing is ready for a while.
//!
//! Timer callbacks must not block. Doing so is caught by an assertion.
//!
//! # Writing blocking operations
//!
//! Every blocking operation in this crate has the same shape: a non-blocking
//! `try_` operation that checks and updates some state inside a critical
//! section, wrapped in [`until`] (or [`until_deadline`] for the `_for`
//! variants). `until` keeps calling the condition, giving the rest of the ring
//! a turn in between, until it succeeds. You can build your own primitives the
//! same way.

use core::ptr;

use scopeguard::defer;

use crate::config::MAX_NODES;
use crate::node::{Countdown, Node, NodeId, NodeKind, Thread};
use crate::port::{self, Context};
use crate::sync::Shared;
use crate::time::{TickTime, Ticks};
use crate::{Error, Result, State, Wakeup};

/// The one and only scheduler.
pub(crate) static KERNEL: Shared<Scheduler> = Shared::new(Scheduler::new());

/// Scheduler state: the node table and the ring threaded through it.
#[derive(Debug)]
pub(crate) struct Scheduler {
    nodes: [Node; MAX_NODES],
    /// Node whose stack is active.
    running: NodeId,
    /// Last node visited by the scan. Usually equal to `running`; differs while
    /// a timer callback runs.
    cursor: NodeId,
    /// Timer whose callback is currently running, if any.
    firing: Option<NodeId>,
    started: bool,
}

// Safety: the raw pointers inside (saved stack pointers and stack regions)
// refer to `'static` task stacks and are only dereferenced by the port while
// the scheduler is borrowed inside a critical section.
unsafe impl Send for Scheduler {}

/// Outcome of visiting one node during a scan.
#[derive(Copy, Clone, Debug)]
pub(crate) enum Step {
    /// Nothing to do here; keep going.
    Skip,
    /// This timer expired. Run its callback and keep going.
    Fire(NodeId, Option<fn()>),
    /// Switch to this task.
    Resume(NodeId),
}

impl Scheduler {
    pub(crate) const fn new() -> Self {
        Self {
            nodes: [Node::VACANT; MAX_NODES],
            running: NodeId::MAIN,
            cursor: NodeId::MAIN,
            firing: None,
            started: false,
        }
    }

    /// Registers the caller as the main node: ready, and alone in the ring.
    pub(crate) fn init(&mut self) {
        cheap_assert!(!self.started);
        self.nodes[NodeId::MAIN.0] = Node {
            state: State::Ready,
            next: NodeId::MAIN,
            linked: true,
            countdown: Countdown::IDLE,
            kind: NodeKind::Main(Thread::new()),
        };
        self.running = NodeId::MAIN;
        self.cursor = NodeId::MAIN;
        self.started = true;
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn running(&self) -> NodeId {
        cheap_assert!(self.started);
        self.running
    }

    pub(crate) fn firing(&self) -> Option<NodeId> {
        self.firing
    }

    /// Claims a vacant table slot for a new, stopped, unlinked node.
    pub(crate) fn allocate(&mut self, kind: NodeKind) -> NodeId {
        cheap_assert!(self.started);
        let slot = self
            .nodes
            .iter()
            .position(|n| matches!(n.kind, NodeKind::Vacant));
        let index = match slot {
            Some(i) => i,
            None => panic!(),
        };
        self.nodes[index] = Node { kind, ..Node::VACANT };
        NodeId(index)
    }

    /// Returns a stopped node's slot to the table, handing back what it held.
    pub(crate) fn release(&mut self, id: NodeId) -> NodeKind {
        cheap_assert!(id != NodeId::MAIN);
        let node = &mut self.nodes[id.0];
        cheap_assert!(node.state == State::Stopped);
        if node.linked {
            self.unlink(id);
        }
        core::mem::replace(&mut self.nodes[id.0], Node::VACANT).kind
    }

    /// Inserts `id` into the ring just behind the running node, so it gets its
    /// first turn after everything already in the ring. Does nothing if it's
    /// already linked.
    pub(crate) fn link(&mut self, id: NodeId) {
        if self.nodes[id.0].linked {
            return;
        }
        let anchor = if self.nodes[self.running.0].linked {
            self.running
        } else {
            NodeId::MAIN
        };
        let prev = self.predecessor(anchor);
        self.nodes[id.0].next = anchor;
        self.nodes[id.0].linked = true;
        self.nodes[prev.0].next = id;
    }

    /// Removes `id` from the ring. The scan continues correctly even if it was
    /// sitting on `id`.
    pub(crate) fn unlink(&mut self, id: NodeId) {
        cheap_assert!(id != NodeId::MAIN);
        if !self.nodes[id.0].linked {
            return;
        }
        let prev = self.predecessor(id);
        self.nodes[prev.0].next = self.nodes[id.0].next;
        self.nodes[id.0].linked = false;
        self.nodes[id.0].next = NodeId::MAIN;
        if self.cursor == id {
            self.cursor = prev;
        }
    }

    /// Finds the node whose `next` is `id`, which must be linked.
    fn predecessor(&self, id: NodeId) -> NodeId {
        let mut p = id;
        loop {
            let next = self.nodes[p.0].next;
            if next == id {
                return p;
            }
            p = next;
        }
    }

    /// Advances the scan by one node.
    pub(crate) fn step(&mut self, now: TickTime) -> Step {
        let id = self.nodes[self.cursor.0].next;
        self.cursor = id;
        let node = &mut self.nodes[id.0];
        match node.state {
            State::Stopped | State::Suspended => Step::Skip,
            State::Ready => Step::Resume(id),
            State::Delayed => {
                if !node.countdown.is_due(now) {
                    return Step::Skip;
                }
                node.countdown.advance();
                node.state = State::Ready;
                if let Some(thread) = node.thread_mut() {
                    thread.wakeup = Wakeup::Timeout;
                }
                Step::Resume(id)
            }
            State::Timer => {
                if !node.countdown.is_due(now) {
                    return Step::Skip;
                }
                node.countdown.advance();
                Step::Fire(id, node.timer().and_then(|t| t.callback))
            }
        }
    }

    /// Wraps up a timer firing after its callback (if any) has run.
    pub(crate) fn finish_fire(&mut self, id: NodeId) {
        let node = &mut self.nodes[id.0];
        if let NodeKind::Timer(timer) = &mut node.kind {
            if node.state == State::Timer && node.countdown.delay == Ticks::ZERO {
                node.state = State::Stopped;
            }
            timer.signal = timer.signal.wrapping_add(1);
        }
    }

    /// Makes `next` the running node. Returns the contexts to switch between,
    /// or `None` if `next` is already running.
    fn prepare_switch(
        &mut self,
        next: NodeId,
    ) -> Option<(*mut Context, *const Context)> {
        let prev = self.running;
        self.running = next;
        self.cursor = next;
        if prev == next {
            return None;
        }
        #[cfg(feature = "stack-check")]
        self.check_stack(prev);
        let save = self.context_ptr(prev);
        let load = self.context_ptr(next);
        Some((save, load))
    }

    fn context_ptr(&mut self, id: NodeId) -> *mut Context {
        match self.nodes[id.0].thread_mut() {
            Some(thread) => ptr::from_mut(&mut thread.context),
            None => panic!(),
        }
    }

    #[cfg(feature = "stack-check")]
    fn check_stack(&self, id: NodeId) {
        if let Some(task) = self.nodes[id.0].task() {
            // Safety: the region is a live 'static stack owned by this task.
            let canary = unsafe { task.stack.base.read_volatile() };
            cheap_assert!(canary == crate::config::STACK_CANARY);
        }
    }

    /// Entry point of the running task.
    fn running_entry(&self) -> fn() {
        match self.nodes[self.running.0].task() {
            Some(task) => task.entry,
            None => panic!(),
        }
    }

    /// Node ids in ring order, starting from main.
    #[cfg(test)]
    pub(crate) fn ring(&self) -> std::vec::Vec<NodeId> {
        let mut out = std::vec![NodeId::MAIN];
        let mut p = self.nodes[NodeId::MAIN.0].next;
        while p != NodeId::MAIN {
            cheap_assert!(out.len() <= MAX_NODES);
            out.push(p);
            p = self.nodes[p.0].next;
        }
        out
    }
}

/// Sets up the scheduler and registers the calling context as the main node.
///
/// Call this exactly once, before creating any task or timer.
pub fn init() {
    KERNEL.with(Scheduler::init);
    log::debug!("scheduler initialized, {} node slots", MAX_NODES);
}

/// Gives up the CPU and lets the scheduler scan the ring. Returns once the
/// scan comes back around to the caller.
///
/// If nothing else is ready, this returns (almost) immediately after firing
/// any expired timers.
///
/// # Panics
///
/// If called from a timer callback.
pub fn switch_to_next() {
    KERNEL.with(|s| {
        cheap_assert!(s.started);
        cheap_assert!(s.firing.is_none());
    });
    loop {
        let now = TickTime::now();
        match KERNEL.with(|s| s.step(now)) {
            Step::Skip => (),
            Step::Fire(timer, callback) => fire(timer, callback),
            Step::Resume(next) => {
                resume(next);
                return;
            }
        }
    }
}

/// Lets every other ready task have a turn. Same as [`switch_to_next`].
pub fn yield_now() {
    switch_to_next();
}

/// Turns the calling context (normally main) into the idle loop.
pub fn run() -> ! {
    loop {
        switch_to_next();
    }
}

/// Turns the calling context into the idle loop, calling `idle_hook` every
/// time the scan comes back around to it.
pub fn run_with_idle(mut idle_hook: impl FnMut()) -> ! {
    loop {
        idle_hook();
        switch_to_next();
    }
}

pub(crate) fn current_id() -> NodeId {
    KERNEL.with(|s| s.running())
}

fn fire(timer: NodeId, callback: Option<fn()>) {
    if let Some(callback) = callback {
        KERNEL.with(|s| s.firing = Some(timer));
        defer! {
            KERNEL.with(|s| s.firing = None);
        }
        callback();
    }
    KERNEL.with(|s| s.finish_fire(timer));
}

fn resume(next: NodeId) {
    critical_section::with(|cs| {
        // The borrow must end before the switch: the task we resume will
        // borrow the scheduler again.
        let contexts = KERNEL.borrow(cs).prepare_switch(next);
        if let Some((save, load)) = contexts {
            // Safety: both contexts live in the static scheduler, interrupts
            // are masked, and `load` was produced by `init_context` or by the
            // switch that suspended `next`.
            unsafe { port::switch(save, load) }
        }
    });
}

/// Where every task starts. The task's entry is looked up on each pass, so
/// `Task::flip` can swap it.
pub(crate) extern "C" fn task_trampoline() -> ! {
    // Safety: a fresh task begins inside the critical section of the switch
    // that started it, and nothing on this brand-new stack depends on it.
    unsafe { port::enable_interrupts() }
    loop {
        let entry = KERNEL.with(|s| s.running_entry());
        entry();
    }
}

/// Trait implemented by things that indicate success or failure, to be used
/// with [`until`] and friends.
///
/// In practice this is `bool` (if there's no output associated with success),
/// `Option<T>`, or the kernel's own `Result<T>` as returned by every `try_`
/// operation.
pub trait TestResult {
    /// Type of content produced on success.
    type Output;
    /// Converts `self` into an `Option` that is `Some` on success, `None` on
    /// failure.
    fn into_test_result(self) -> Option<Self::Output>;
}

impl TestResult for bool {
    type Output = ();
    fn into_test_result(self) -> Option<Self::Output> {
        if self {
            Some(())
        } else {
            None
        }
    }
}

impl<T> TestResult for Option<T> {
    type Output = T;
    fn into_test_result(self) -> Option<Self::Output> {
        self
    }
}

impl<T, E> TestResult for core::result::Result<T, E> {
    type Output = T;
    fn into_test_result(self) -> Option<Self::Output> {
        self.ok()
    }
}

/// Blocks until `cond` passes, giving the rest of the ring a turn each time it
/// fails.
///
/// `cond` is called at least once, before anything else gets to run.
pub fn until<T: TestResult>(mut cond: impl FnMut() -> T) -> T::Output {
    loop {
        if let Some(x) = cond().into_test_result() {
            return x;
        }
        switch_to_next();
    }
}

/// Like [`until`], but gives up with [`Error::Timeout`] once `deadline` has
/// been reached. `cond` is always tried at least once.
pub fn until_deadline<T: TestResult>(
    deadline: TickTime,
    mut cond: impl FnMut() -> T,
) -> Result<T::Output> {
    loop {
        if let Some(x) = cond().into_test_result() {
            return Ok(x);
        }
        if deadline.is_reached() {
            return Err(Error::Timeout);
        }
        switch_to_next();
    }
}

/// Like [`until_deadline`] with a deadline `timeout` ticks from now.
///
/// A `timeout` of more than half the tick counter's range lands on a deadline
/// that reads as already reached, so `cond` gets exactly one try. For an
/// unbounded wait use [`until`].
pub fn until_timeout<T: TestResult>(
    timeout: Ticks,
    cond: impl FnMut() -> T,
) -> Result<T::Output> {
    until_deadline(TickTime::now() + timeout, cond)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::node::{StackRegion, TaskData, TimerData};
    use std::vec::Vec;

    static CLAIM: Shared<bool> = Shared::new(true);

    fn nothing() {}

    pub(crate) fn at(t: u32) -> TickTime {
        TickTime::from_ticks_since_boot(t)
    }

    pub(crate) fn scheduler() -> Scheduler {
        let mut s = Scheduler::new();
        s.init();
        s
    }

    /// Adds a task node that will never actually run, in the given state.
    pub(crate) fn add_task(s: &mut Scheduler, state: State) -> NodeId {
        let words = std::vec![crate::config::STACK_CANARY; 64].leak();
        let id = s.allocate(NodeKind::Task(TaskData {
            thread: Thread::new(),
            entry: nothing,
            stack: StackRegion { base: words.as_mut_ptr(), words: words.len() },
            claim: &CLAIM,
        }));
        s.node_mut(id).state = state;
        s.link(id);
        id
    }

    pub(crate) fn add_timer(
        s: &mut Scheduler,
        callback: Option<fn()>,
        countdown: Countdown,
    ) -> NodeId {
        let id = s.allocate(NodeKind::Timer(TimerData { callback, signal: 0 }));
        let node = s.node_mut(id);
        node.state = State::Timer;
        node.countdown = countdown;
        s.link(id);
        id
    }

    /// Runs one full scan starting after main, the way `switch_to_next` would,
    /// minus the actual switch and the callbacks. Returns the task selected and
    /// the timers fired along the way.
    pub(crate) fn scan(s: &mut Scheduler, now: TickTime) -> (NodeId, Vec<NodeId>) {
        let mut fired = Vec::new();
        loop {
            match s.step(now) {
                Step::Skip => (),
                Step::Fire(id, _) => {
                    s.finish_fire(id);
                    fired.push(id);
                }
                Step::Resume(id) => {
                    s.prepare_switch(id);
                    return (id, fired);
                }
            }
        }
    }

    #[test]
    fn init_makes_main_alone_in_ring() {
        let s = scheduler();
        assert_eq!(s.ring(), [NodeId::MAIN]);
        assert_eq!(s.running(), NodeId::MAIN);
    }

    #[test]
    #[should_panic]
    fn init_twice_panics() {
        let mut s = scheduler();
        s.init();
    }

    #[test]
    fn ring_stays_closed_under_insert_and_remove() {
        let mut s = scheduler();
        let a = add_task(&mut s, State::Ready);
        let b = add_task(&mut s, State::Ready);
        let t = add_timer(&mut s, None, Countdown::IDLE);
        assert_eq!(s.ring(), [NodeId::MAIN, a, b, t]);

        s.unlink(b);
        assert_eq!(s.ring(), [NodeId::MAIN, a, t]);
        s.unlink(a);
        s.unlink(a);
        assert_eq!(s.ring(), [NodeId::MAIN, t]);

        s.link(b);
        s.link(b);
        assert_eq!(s.ring(), [NodeId::MAIN, t, b]);

        s.unlink(t);
        s.unlink(b);
        assert_eq!(s.ring(), [NodeId::MAIN]);
    }

    #[test]
    fn release_frees_the_slot() {
        let mut s = scheduler();
        let a = add_task(&mut s, State::Stopped);
        assert!(matches!(s.release(a), NodeKind::Task(_)));
        assert_eq!(s.ring(), [NodeId::MAIN]);
        let b = add_task(&mut s, State::Ready);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic]
    fn release_of_ready_node_panics() {
        let mut s = scheduler();
        let a = add_task(&mut s, State::Ready);
        s.release(a);
    }

    #[test]
    #[should_panic]
    fn table_exhaustion_panics() {
        let mut s = scheduler();
        for _ in 0..MAX_NODES {
            add_task(&mut s, State::Stopped);
        }
    }

    #[test]
    fn scan_is_round_robin() {
        let mut s = scheduler();
        let a = add_task(&mut s, State::Ready);
        let b = add_task(&mut s, State::Ready);
        assert_eq!(scan(&mut s, at(0)).0, a);
        assert_eq!(scan(&mut s, at(0)).0, b);
        assert_eq!(scan(&mut s, at(0)).0, NodeId::MAIN);
        assert_eq!(scan(&mut s, at(0)).0, a);
    }

    #[test]
    fn scan_skips_stopped_and_suspended() {
        let mut s = scheduler();
        add_task(&mut s, State::Stopped);
        add_task(&mut s, State::Suspended);
        let c = add_task(&mut s, State::Ready);
        assert_eq!(scan(&mut s, at(0)).0, c);
        assert_eq!(scan(&mut s, at(0)).0, NodeId::MAIN);
    }

    #[test]
    fn only_main_ready_resumes_main_without_switch() {
        let mut s = scheduler();
        assert!(matches!(s.step(at(0)), Step::Resume(NodeId::MAIN)));
        assert!(s.prepare_switch(NodeId::MAIN).is_none());
    }

    #[test]
    fn sleeping_task_wakes_with_timeout() {
        let mut s = scheduler();
        let t = add_task(&mut s, State::Delayed);
        s.node_mut(t).countdown = Countdown::new(at(100), Ticks(10), Ticks::ZERO);

        for now in 100..110 {
            assert_eq!(scan(&mut s, at(now)).0, NodeId::MAIN);
            assert_eq!(s.node(t).state, State::Delayed);
        }
        assert_eq!(scan(&mut s, at(110)).0, t);
        assert_eq!(s.node(t).state, State::Ready);
        assert_eq!(s.node(t).thread().map(|th| th.wakeup), Some(Wakeup::Timeout));
    }

    #[test]
    fn periodic_timer_fires_on_schedule() {
        let mut s = scheduler();
        let t = add_timer(&mut s, None, Countdown::new(at(0), Ticks(5), Ticks(10)));

        let mut fired_at = Vec::new();
        for now in 0..=30 {
            if !scan(&mut s, at(now)).1.is_empty() {
                fired_at.push(now);
            }
        }
        assert_eq!(fired_at, [5, 15, 25]);
        assert_eq!(s.node(t).state, State::Timer);
        assert_eq!(s.node(t).timer().map(|t| t.signal), Some(3));
    }

    #[test]
    fn one_shot_timer_stops_after_firing() {
        let mut s = scheduler();
        let t = add_timer(&mut s, None, Countdown::new(at(0), Ticks(3), Ticks::ZERO));
        assert!(scan(&mut s, at(2)).1.is_empty());
        assert_eq!(scan(&mut s, at(3)).1, [t]);
        assert_eq!(s.node(t).state, State::Stopped);
        assert!(s.node(t).linked);
        assert!(scan(&mut s, at(100)).1.is_empty());
        assert_eq!(s.node(t).timer().map(|t| t.signal), Some(1));
    }

    #[test]
    fn timer_fire_carries_callback() {
        fn tick() {}
        let mut s = scheduler();
        let t = add_timer(&mut s, Some(tick), Countdown::IDLE);
        match s.step(at(0)) {
            Step::Fire(id, Some(_)) => assert_eq!(id, t),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unlinking_scan_position_keeps_scan_going() {
        let mut s = scheduler();
        let a = add_task(&mut s, State::Suspended);
        let b = add_task(&mut s, State::Ready);
        // Scan has just looked at `a`, as if a callback were running there.
        assert!(matches!(s.step(at(0)), Step::Skip));
        s.unlink(a);
        assert!(matches!(s.step(at(0)), Step::Resume(id) if id == b));
    }

    #[test]
    fn timers_fire_during_scan_to_other_task() {
        let mut s = scheduler();
        let t = add_timer(&mut s, None, Countdown::IDLE);
        let a = add_task(&mut s, State::Ready);
        let (next, fired) = scan(&mut s, at(0));
        assert_eq!(next, a);
        assert_eq!(fired, [t]);
    }
}
