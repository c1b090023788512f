// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numbered signals.
//!
//! A `Signal` holds up to 32 pending signals, numbered 0 to 31. Taking a
//! signal returns the lowest-numbered pending one in the requested set and
//! clears it, unless that signal number is _protected_, in which case it stays
//! pending until [`Signal::clear`]ed.

use crate::exec;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::{Error, Result};

/// A set of pending numbered signals.
#[derive(Debug)]
pub struct Signal {
    state: Shared<Pending>,
}

#[derive(Copy, Clone, Debug)]
struct Pending {
    bits: u32,
    protected: u32,
}

/// Number of distinct signals.
pub const SIGNALS: u32 = 32;

impl Signal {
    /// Creates a signal set with nothing pending. Signal numbers whose bits are
    /// set in `protected` aren't cleared by [`Signal::take`].
    pub const fn new(protected: u32) -> Self {
        Self { state: Shared::new(Pending { bits: 0, protected }) }
    }

    /// Makes signal `signo` pending. Safe to call from an interrupt handler.
    ///
    /// # Panics
    ///
    /// If `signo` isn't less than [`SIGNALS`].
    pub fn give(&self, signo: u32) {
        cheap_assert!(signo < SIGNALS);
        self.state.with(|p| p.bits |= 1 << signo);
    }

    /// Takes the lowest-numbered pending signal whose bit is set in `sigset`.
    pub fn try_take(&self, sigset: u32) -> Result<u32> {
        debug_cheap_assert!(sigset != 0);
        self.state.with(|p| {
            let hit = p.bits & sigset;
            if hit == 0 {
                return Err(Error::Failure);
            }
            let signo = hit.trailing_zeros();
            let bit = 1 << signo;
            if p.protected & bit == 0 {
                p.bits &= !bit;
            }
            Ok(signo)
        })
    }

    /// Waits for a signal in `sigset` and takes it.
    pub fn take(&self, sigset: u32) -> u32 {
        exec::until(|| self.try_take(sigset))
    }

    /// Like [`Signal::take`], giving up after `timeout`.
    pub fn take_for(&self, sigset: u32, timeout: Ticks) -> Result<u32> {
        exec::until_timeout(timeout, || self.try_take(sigset))
    }

    /// Clears signal `signo`, protected or not.
    pub fn clear(&self, signo: u32) {
        cheap_assert!(signo < SIGNALS);
        self.state.with(|p| p.bits &= !(1 << signo));
    }

    /// Bit set of pending signals.
    pub fn get(&self) -> u32 {
        self.state.with(|p| p.bits)
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_pending_first() {
        let s = Signal::new(0);
        s.give(7);
        s.give(3);
        assert_eq!(s.try_take(u32::MAX), Ok(3));
        assert_eq!(s.try_take(u32::MAX), Ok(7));
        assert_eq!(s.try_take(u32::MAX), Err(Error::Failure));
    }

    #[test]
    fn sigset_filters() {
        let s = Signal::new(0);
        s.give(2);
        assert_eq!(s.try_take(1 << 5), Err(Error::Failure));
        assert_eq!(s.try_take(1 << 2), Ok(2));
    }

    #[test]
    fn protected_stays_until_cleared() {
        let s = Signal::new(1 << 4);
        s.give(4);
        assert_eq!(s.try_take(1 << 4), Ok(4));
        assert_eq!(s.try_take(1 << 4), Ok(4));
        s.clear(4);
        assert_eq!(s.try_take(1 << 4), Err(Error::Failure));
    }

    #[test]
    #[should_panic]
    fn out_of_range_panics() {
        Signal::new(0).give(SIGNALS);
    }
}
