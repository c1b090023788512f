// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event flag groups: 32 independent bits that tasks can wait on.
//!
//! [`Flag::give`] sets bits. [`Flag::take`] waits for bits in a mask, either
//! all of them or any of them, and clears the ones it consumed.

use crate::exec;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::{Error, Result};

/// How [`Flag::take`] matches its mask.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Every bit in the mask must be set. All of them are consumed.
    All,
    /// At least one bit in the mask must be set. Every set bit in the mask is
    /// consumed.
    Any,
}

/// A group of 32 event flags.
#[derive(Debug)]
pub struct Flag {
    bits: Shared<u32>,
}

impl Flag {
    /// Creates a flag group with `bits` already set.
    pub const fn new(bits: u32) -> Self {
        Self { bits: Shared::new(bits) }
    }

    /// Consumes bits of `mask` if they satisfy `mode`, returning the bits
    /// consumed.
    pub fn try_take(&self, mask: u32, mode: Mode) -> Result<u32> {
        debug_cheap_assert!(mask != 0);
        self.bits.with(|bits| {
            let hit = *bits & mask;
            let satisfied = match mode {
                Mode::All => hit == mask,
                Mode::Any => hit != 0,
            };
            if !satisfied {
                return Err(Error::Failure);
            }
            *bits &= !hit;
            Ok(hit)
        })
    }

    /// Waits until bits of `mask` satisfy `mode`, consumes them, and returns
    /// them.
    pub fn take(&self, mask: u32, mode: Mode) -> u32 {
        exec::until(|| self.try_take(mask, mode))
    }

    /// Like [`Flag::take`], giving up after `timeout`.
    pub fn take_for(&self, mask: u32, mode: Mode, timeout: Ticks) -> Result<u32> {
        exec::until_timeout(timeout, || self.try_take(mask, mode))
    }

    /// Sets `bits`. Safe to call from an interrupt handler.
    pub fn give(&self, bits: u32) {
        self.bits.with(|b| *b |= bits);
    }

    /// Clears `bits`, returning the flags as they were before.
    pub fn clear(&self, bits: u32) -> u32 {
        self.bits.with(|b| {
            let old = *b;
            *b &= !bits;
            old
        })
    }

    /// Flags set right now.
    pub fn get(&self) -> u32 {
        self.bits.with(|b| *b)
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_needs_every_bit() {
        let f = Flag::new(0);
        f.give(0b001);
        assert_eq!(f.try_take(0b011, Mode::All), Err(Error::Failure));
        assert_eq!(f.get(), 0b001);
        f.give(0b110);
        assert_eq!(f.try_take(0b011, Mode::All), Ok(0b011));
        assert_eq!(f.get(), 0b100);
    }

    #[test]
    fn any_takes_what_is_there() {
        let f = Flag::new(0b1010);
        assert_eq!(f.try_take(0b0101, Mode::Any), Err(Error::Failure));
        assert_eq!(f.try_take(0b0011, Mode::Any), Ok(0b0010));
        assert_eq!(f.get(), 0b1000);
    }

    #[test]
    fn clear_returns_previous() {
        let f = Flag::new(0b111);
        assert_eq!(f.clear(0b010), 0b111);
        assert_eq!(f.get(), 0b101);
    }
}
