// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entries in the scheduler's node table.
//!
//! Tasks, timers and the main context are all nodes in one ring. They share the
//! linkage, the state and the countdown; what differs lives in [`NodeKind`].

use crate::port::Context;
use crate::time::{TickTime, Ticks};

/// Index of a node in the scheduler's table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

impl NodeId {
    /// The startup context. Always present, always linked.
    pub(crate) const MAIN: Self = Self(0);
}

/// Scheduling state of a task or timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum State {
    /// Not running. The node may still be linked into the ring; the scheduler
    /// skips it.
    Stopped,
    /// A task that is runnable, or blocked polling something.
    Ready,
    /// A timer that is counting down.
    Timer,
    /// A task sleeping until its countdown expires or someone resumes it.
    Delayed,
    /// A task sleeping until someone resumes it. Never times out.
    Suspended,
}

/// Why a sleeping task woke up.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Wakeup {
    /// The countdown expired.
    Timeout,
    /// Another task (or an interrupt handler) resumed it, passing this value.
    Resumed(u32),
}

/// Countdown shared by sleeping tasks and timers.
///
/// The node is due once more than `delay` ticks have passed since `start`. On
/// expiry the countdown moves forward in place: `start` advances by `delay` and
/// `delay` becomes `period`, so periodic timers don't drift.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Countdown {
    pub(crate) start: TickTime,
    pub(crate) delay: Ticks,
    pub(crate) period: Ticks,
}

impl Countdown {
    pub(crate) const IDLE: Self = Self {
        start: TickTime::from_ticks_since_boot(0),
        delay: Ticks::ZERO,
        period: Ticks::ZERO,
    };

    pub(crate) const fn new(start: TickTime, delay: Ticks, period: Ticks) -> Self {
        Self { start, delay, period }
    }

    /// Countdown starting at `now` that expires at `deadline`. A deadline
    /// already reached, or more than half the tick range away, expires
    /// immediately.
    pub(crate) const fn until(now: TickTime, deadline: TickTime) -> Self {
        Self::new(now, deadline.remaining_at(now), Ticks::ZERO)
    }

    pub(crate) fn is_due(&self, now: TickTime) -> bool {
        now.ticks_since(self.start).0.wrapping_add(1) > self.delay.0
    }

    /// Moves the countdown to its next period.
    pub(crate) fn advance(&mut self) {
        self.start += self.delay;
        self.delay = self.period;
    }

    /// End of the current countdown.
    pub(crate) fn end(&self) -> TickTime {
        self.start + self.delay
    }
}

/// Region of a caller-supplied task stack.
#[derive(Copy, Clone, Debug)]
pub(crate) struct StackRegion {
    pub(crate) base: *mut u32,
    pub(crate) words: usize,
}

impl StackRegion {
    /// Highest usable address, rounded down to 8 bytes as the AAPCS wants.
    pub(crate) fn top(&self) -> *mut u32 {
        let end = self.base.wrapping_add(self.words) as usize;
        (end & !7) as *mut u32
    }
}

/// Per-node execution state of anything that owns a stack (tasks and main).
#[derive(Debug)]
pub(crate) struct Thread {
    pub(crate) context: Context,
    pub(crate) wakeup: Wakeup,
}

impl Thread {
    pub(crate) const fn new() -> Self {
        Self { context: Context::EMPTY, wakeup: Wakeup::Timeout }
    }
}

#[derive(Debug)]
pub(crate) struct TaskData {
    pub(crate) thread: Thread,
    pub(crate) entry: fn(),
    pub(crate) stack: StackRegion,
    /// Claim flag of the `Stack` this task runs on, released on delete.
    pub(crate) claim: &'static crate::sync::Shared<bool>,
}

#[derive(Debug)]
pub(crate) struct TimerData {
    pub(crate) callback: Option<fn()>,
    /// Completion counter, bumped every time the timer fires.
    pub(crate) signal: u32,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Vacant,
    Main(Thread),
    Task(TaskData),
    Timer(TimerData),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) state: State,
    pub(crate) next: NodeId,
    pub(crate) linked: bool,
    pub(crate) countdown: Countdown,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) const VACANT: Self = Self {
        state: State::Stopped,
        next: NodeId::MAIN,
        linked: false,
        countdown: Countdown::IDLE,
        kind: NodeKind::Vacant,
    };

    pub(crate) fn thread(&self) -> Option<&Thread> {
        match &self.kind {
            NodeKind::Main(t) => Some(t),
            NodeKind::Task(t) => Some(&t.thread),
            _ => None,
        }
    }

    pub(crate) fn thread_mut(&mut self) -> Option<&mut Thread> {
        match &mut self.kind {
            NodeKind::Main(t) => Some(t),
            NodeKind::Task(t) => Some(&mut t.thread),
            _ => None,
        }
    }

    pub(crate) fn task(&self) -> Option<&TaskData> {
        match &self.kind {
            NodeKind::Task(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn task_mut(&mut self) -> Option<&mut TaskData> {
        match &mut self.kind {
            NodeKind::Task(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn timer_mut(&mut self) -> Option<&mut TimerData> {
        match &mut self.kind {
            NodeKind::Timer(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn timer(&self) -> Option<&TimerData> {
        match &self.kind {
            NodeKind::Timer(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(t: u32) -> TickTime {
        TickTime::from_ticks_since_boot(t)
    }

    #[test]
    fn countdown_due_after_delay() {
        let c = Countdown::new(at(100), Ticks(10), Ticks::ZERO);
        assert!(!c.is_due(at(100)));
        assert!(!c.is_due(at(109)));
        assert!(c.is_due(at(110)));
        assert!(c.is_due(at(115)));
    }

    #[test]
    fn countdown_zero_delay_is_due_at_once() {
        let c = Countdown::new(at(7), Ticks::ZERO, Ticks::ZERO);
        assert!(c.is_due(at(7)));
    }

    #[test]
    fn countdown_across_rollover() {
        let c = Countdown::new(at(u32::MAX - 4), Ticks(10), Ticks::ZERO);
        assert!(!c.is_due(at(u32::MAX)));
        assert!(!c.is_due(at(4)));
        assert!(c.is_due(at(5)));
    }

    #[test]
    fn countdown_advance_keeps_phase() {
        let mut c = Countdown::new(at(0), Ticks(5), Ticks(10));
        c.advance();
        assert_eq!(c, Countdown::new(at(5), Ticks(10), Ticks(10)));
        assert_eq!(c.end(), at(15));
    }

    #[test]
    fn countdown_until_clamps() {
        assert_eq!(Countdown::until(at(50), at(60)).delay, Ticks(10));
        assert_eq!(Countdown::until(at(50), at(40)).delay, Ticks::ZERO);
        let far = at(50) + Ticks(u32::MAX / 2 + 10);
        assert_eq!(Countdown::until(at(50), far).delay, Ticks::ZERO);
    }

    #[test]
    fn stack_top_is_aligned() {
        let mut words = [0u32; 9];
        let region = StackRegion { base: words.as_mut_ptr(), words: 9 };
        assert_eq!(region.top() as usize % 8, 0);
        assert!(region.top() as usize <= words.as_ptr() as usize + 36);
    }
}
