// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Condition variables, used together with a [`Mutex`].
//!
//! [`Condvar::wait`] gives up the mutex, waits for the next
//! [`Condvar::give`], and takes the mutex back. Every task waiting at the
//! time of a `give` wakes up.
//!
//! Taking the mutex back is not atomic with the wakeup: another task may get
//! it first and change things, so re-check your condition in a loop.

use crate::exec;
use crate::mutex::Mutex;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::Result;

/// A condition variable.
#[derive(Debug)]
pub struct Condvar {
    signal: Shared<u32>,
}

impl Condvar {
    /// Creates a condition variable nobody is waiting on.
    pub const fn new() -> Self {
        Self { signal: Shared::new(0) }
    }

    /// Gives up `mutex`, blocks until the next [`Condvar::give`], then takes
    /// `mutex` back.
    ///
    /// # Panics
    ///
    /// If the caller doesn't hold `mutex`.
    pub fn wait(&self, mutex: &Mutex) {
        let seen = self.release(mutex);
        exec::until(|| self.given_since(seen));
        mutex.take();
    }

    /// Like [`Condvar::wait`], giving up the wait after `timeout`. The mutex is
    /// held again on return either way.
    pub fn wait_for(&self, mutex: &Mutex, timeout: Ticks) -> Result<()> {
        let seen = self.release(mutex);
        let result = exec::until_timeout(timeout, || self.given_since(seen));
        mutex.take();
        result
    }

    /// Wakes every task currently waiting. Safe to call from an interrupt
    /// handler.
    pub fn give(&self) {
        self.signal.with(|s| *s = s.wrapping_add(1));
    }

    fn release(&self, mutex: &Mutex) -> u32 {
        let seen = self.signal.with(|s| *s);
        cheap_assert!(mutex.give().is_ok());
        seen
    }

    fn given_since(&self, seen: u32) -> bool {
        self.signal.with(|s| *s != seen)
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn give_changes_signal() {
        let cv = Condvar::new();
        let seen = cv.signal.with(|s| *s);
        assert!(!cv.given_since(seen));
        cv.give();
        assert!(cv.given_since(seen));
    }

    #[test]
    fn signal_wraps() {
        let cv = Condvar::new();
        cv.signal.with(|s| *s = u32::MAX);
        cv.give();
        assert!(cv.given_since(u32::MAX));
        assert!(!cv.given_since(0));
    }
}
