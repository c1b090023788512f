// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Software timers.
//!
//! A timer sits in the same ring as the tasks. When the scheduler's scan
//! reaches a timer whose countdown has expired, it runs the timer's callback
//! right there, on the stack of whichever task happened to yield, and moves
//! on. Callbacks therefore must be short and must never block.
//!
//! A timer started with a `period` of zero fires once and stops. Otherwise it
//! fires again every `period` ticks, measured from when it was due (not from
//! when the scan got around to it), so it doesn't drift.
//!
//! Tasks can wait for a timer to fire with [`Timer::wait`], with or without a
//! callback.
//!
//! ```ignore
//! fn blink() {
//!     led_toggle();
//! }
//!
//! let blinker = Timer::new(Some(blink));
//! blinker.start_periodic(Ticks(500));
//! ```

use crate::exec::{self, Scheduler, KERNEL};
use crate::node::{Countdown, NodeId, NodeKind, TimerData};
use crate::time::{TickTime, Ticks};
use crate::{Error, Result, State};

/// Handle to a timer.
///
/// Like [`Task`][crate::task::Task] handles, these are copies of a slot number
/// and must not be used after [`Timer::delete`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Timer(NodeId);

impl Timer {
    /// Creates a stopped timer that will run `callback`, if any, each time it
    /// fires.
    ///
    /// # Panics
    ///
    /// If the scheduler's table is full.
    pub fn new(callback: Option<fn()>) -> Self {
        let id = KERNEL.with(|s| {
            s.allocate(NodeKind::Timer(TimerData { callback, signal: 0 }))
        });
        log::trace!("timer {} created", id.0);
        Timer(id)
    }

    /// The timer whose callback is running right now, if any.
    pub fn current() -> Option<Self> {
        KERNEL.with(|s| s.firing().map(Timer))
    }

    /// Starts (or restarts) the countdown: first fire after `delay` ticks, then
    /// every `period` ticks, or never again if `period` is zero.
    pub fn start(self, delay: Ticks, period: Ticks) {
        self.start_with(None, |now, _| Countdown::new(now, delay, period));
    }

    /// Fires once, `delay` ticks from now.
    pub fn start_for(self, delay: Ticks) {
        self.start(delay, Ticks::ZERO);
    }

    /// Fires every `period` ticks, starting `period` ticks from now.
    pub fn start_periodic(self, period: Ticks) {
        self.start(period, period);
    }

    /// Fires once, at `deadline`. A deadline in the past, or more than half
    /// the tick range away, fires at the next scan.
    pub fn start_until(self, deadline: TickTime) {
        self.start_with(None, |now, _| Countdown::until(now, deadline));
    }

    /// Like [`Timer::start`], also replacing the callback.
    pub fn start_from(self, delay: Ticks, period: Ticks, callback: Option<fn()>) {
        self.start_with(Some(callback), |now, _| Countdown::new(now, delay, period));
    }

    /// Fires once, `delay` ticks after the end of the previous countdown
    /// rather than after now.
    pub fn start_next(self, delay: Ticks) {
        self.start_with(None, |_, previous| {
            Countdown::new(previous.end(), delay, Ticks::ZERO)
        });
    }

    fn start_with(
        self,
        callback: Option<Option<fn()>>,
        countdown: impl FnOnce(TickTime, &Countdown) -> Countdown,
    ) {
        let now = TickTime::now();
        KERNEL.with(|s| {
            let next = countdown(now, &s.node(self.0).countdown);
            s.start_timer(self.0, next, callback);
        });
        log::trace!("timer {} started", self.0 .0);
    }

    /// Stops the timer. Tasks in [`Timer::wait`] return.
    pub fn stop(self) {
        KERNEL.with(|s| s.stop_timer(self.0));
        log::trace!("timer {} stopped", self.0 .0);
    }

    /// Checks whether the timer has finished: succeeds iff it is stopped.
    pub fn take(self) -> Result<()> {
        if self.is_running() {
            Err(Error::Failure)
        } else {
            Ok(())
        }
    }

    /// Checks whether the timer is counting down.
    pub fn is_running(self) -> bool {
        self.snapshot().0 == State::Timer
    }

    /// Blocks until the timer fires again, or returns at once if it's stopped.
    ///
    /// # Panics
    ///
    /// If called from a timer callback.
    pub fn wait(self) {
        let (state, signal) = self.snapshot();
        if state == State::Stopped {
            return;
        }
        exec::until(|| self.fired_since(signal))
    }

    /// Like [`Timer::wait`], giving up after `timeout`.
    pub fn wait_for(self, timeout: Ticks) -> Result<()> {
        let (state, signal) = self.snapshot();
        if state == State::Stopped {
            return Ok(());
        }
        exec::until_timeout(timeout, || self.fired_since(signal))
    }

    /// Frees the timer's table slot.
    ///
    /// # Panics
    ///
    /// If the timer is running.
    pub fn delete(self) {
        KERNEL.with(|s| {
            cheap_assert!(s.node(self.0).timer().is_some());
            s.release(self.0)
        });
        log::trace!("timer {} deleted", self.0 .0);
    }

    fn snapshot(self) -> (State, u32) {
        KERNEL.with(|s| s.timer_snapshot(self.0))
    }

    fn fired_since(self, signal: u32) -> bool {
        let (state, now) = self.snapshot();
        state == State::Stopped || now != signal
    }
}

impl Scheduler {
    /// (Re)starts a timer. A running timer keeps its place in the ring.
    pub(crate) fn start_timer(
        &mut self,
        id: NodeId,
        countdown: Countdown,
        callback: Option<Option<fn()>>,
    ) {
        let node = self.node_mut(id);
        let timer = match node.timer_mut() {
            Some(timer) => timer,
            None => panic!(),
        };
        if let Some(callback) = callback {
            timer.callback = callback;
        }
        node.countdown = countdown;
        node.state = State::Timer;
        self.link(id);
    }

    pub(crate) fn stop_timer(&mut self, id: NodeId) {
        cheap_assert!(self.node(id).timer().is_some());
        self.unlink(id);
        self.node_mut(id).state = State::Stopped;
    }

    pub(crate) fn timer_snapshot(&self, id: NodeId) -> (State, u32) {
        let node = self.node(id);
        match node.timer() {
            Some(timer) => (node.state, timer.signal),
            None => panic!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::tests::{add_task, add_timer, at, scan, scheduler};

    fn new_timer(s: &mut Scheduler) -> NodeId {
        s.allocate(NodeKind::Timer(TimerData { callback: None, signal: 0 }))
    }

    #[test]
    fn start_links_and_restart_keeps_slot() {
        let mut s = scheduler();
        let t = new_timer(&mut s);
        let a = add_task(&mut s, State::Ready);
        s.start_timer(t, Countdown::new(at(0), Ticks(10), Ticks::ZERO), None);
        assert_eq!(s.ring(), [NodeId::MAIN, a, t]);

        s.start_timer(t, Countdown::new(at(3), Ticks(10), Ticks::ZERO), None);
        assert_eq!(s.ring(), [NodeId::MAIN, a, t]);
        assert_eq!(s.node(t).countdown.start, at(3));
    }

    #[test]
    fn stop_unlinks() {
        let mut s = scheduler();
        let t = new_timer(&mut s);
        s.start_timer(t, Countdown::new(at(0), Ticks(10), Ticks(10)), None);
        s.stop_timer(t);
        assert_eq!(s.ring(), [NodeId::MAIN]);
        assert_eq!(s.timer_snapshot(t), (State::Stopped, 0));
    }

    #[test]
    fn start_from_replaces_callback() {
        fn cb() {}
        let mut s = scheduler();
        let t = new_timer(&mut s);
        s.start_timer(t, Countdown::IDLE, Some(Some(cb)));
        assert!(s.node(t).timer().is_some_and(|t| t.callback.is_some()));
        s.start_timer(t, Countdown::IDLE, None);
        assert!(s.node(t).timer().is_some_and(|t| t.callback.is_some()));
        s.start_timer(t, Countdown::IDLE, Some(None));
        assert!(s.node(t).timer().is_some_and(|t| t.callback.is_none()));
    }

    #[test]
    fn signal_counts_firings() {
        let mut s = scheduler();
        let t = add_timer(&mut s, None, Countdown::new(at(0), Ticks(2), Ticks(2)));
        for now in 0..=6 {
            scan(&mut s, at(now));
        }
        assert_eq!(s.timer_snapshot(t), (State::Timer, 3));
    }

    #[test]
    fn stopped_one_shot_restarts_in_place() {
        let mut s = scheduler();
        let t = add_timer(&mut s, None, Countdown::new(at(0), Ticks(1), Ticks::ZERO));
        scan(&mut s, at(1));
        assert_eq!(s.timer_snapshot(t), (State::Stopped, 1));
        assert_eq!(s.ring(), [NodeId::MAIN, t]);

        // start_next: one tick after the end of the previous countdown.
        let next = Countdown::new(s.node(t).countdown.end(), Ticks(4), Ticks::ZERO);
        assert_eq!(next.start, at(1));
        s.start_timer(t, next, None);
        assert_eq!(s.ring(), [NodeId::MAIN, t]);
        assert!(scan(&mut s, at(4)).1.is_empty());
        assert_eq!(scan(&mut s, at(5)).1, [t]);
    }

    #[test]
    fn deadline_in_the_past_fires_at_once() {
        let mut s = scheduler();
        let t = new_timer(&mut s);
        s.start_timer(t, Countdown::until(at(50), at(20)), None);
        assert_eq!(scan(&mut s, at(50)).1, [t]);
    }

    #[test]
    fn zero_delay_periodic_fires_immediately_then_every_period() {
        let mut s = scheduler();
        let t = add_timer(&mut s, None, Countdown::new(at(0), Ticks::ZERO, Ticks(4)));
        let mut fired_at = std::vec::Vec::new();
        for now in 0..=8 {
            if !scan(&mut s, at(now)).1.is_empty() {
                fired_at.push(now);
            }
        }
        assert_eq!(fired_at, [0, 4, 8]);
        assert_eq!(s.timer_snapshot(t).0, State::Timer);
    }
}
