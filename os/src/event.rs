// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast events carrying a word of data.
//!
//! Every task in [`Event::wait`] when [`Event::give`] is called wakes up and
//! receives the value. Nothing is remembered for tasks that start waiting
//! later: an event given with nobody waiting is lost, apart from its value,
//! which [`Event::value`] keeps.

use crate::exec;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::Result;

/// A broadcast event.
#[derive(Debug)]
pub struct Event {
    state: Shared<Occurrence>,
}

#[derive(Copy, Clone, Debug)]
struct Occurrence {
    value: u32,
    signal: u32,
}

impl Event {
    /// Creates an event that hasn't happened yet.
    pub const fn new() -> Self {
        Self { state: Shared::new(Occurrence { value: 0, signal: 0 }) }
    }

    /// Blocks until the next [`Event::give`] and returns the value given.
    pub fn wait(&self) -> u32 {
        let seen = self.signal();
        exec::until(|| self.value_since(seen))
    }

    /// Like [`Event::wait`], giving up after `timeout`.
    pub fn wait_for(&self, timeout: Ticks) -> Result<u32> {
        let seen = self.signal();
        exec::until_timeout(timeout, || self.value_since(seen))
    }

    /// Wakes every task currently waiting, handing each of them `value`. Safe
    /// to call from an interrupt handler.
    pub fn give(&self, value: u32) {
        self.state.with(|o| {
            o.value = value;
            o.signal = o.signal.wrapping_add(1);
        });
    }

    /// Value of the most recent [`Event::give`].
    pub fn value(&self) -> u32 {
        self.state.with(|o| o.value)
    }

    fn signal(&self) -> u32 {
        self.state.with(|o| o.signal)
    }

    fn value_since(&self, seen: u32) -> Option<u32> {
        self.state.with(|o| (o.signal != seen).then_some(o.value))
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}
