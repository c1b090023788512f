// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mailbox queues of fixed-size records.
//!
//! A `Mailbox<T, N>` holds up to `N` values of type `T`, first in, first out.
//! `T` is anything `Copy`: a scalar, a small struct, or a byte array such as
//! `[u8; 16]` for raw fixed-size mail. [`EventQueue`] is the common case of a
//! queue of plain `u32` words.
//!
//! [`Mailbox::give`] blocks while the mailbox is full; [`Mailbox::push`]
//! instead throws away the oldest record to make room, so it never blocks and
//! is safe to call from an interrupt handler.
//!
//! Any number of tasks may give and take. Waiters are served in ring order.

use crate::exec;
use crate::ring::Ring;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::{Error, Result};

/// A FIFO queue of up to `N` records of type `T`.
#[derive(Debug)]
pub struct Mailbox<T, const N: usize> {
    ring: Shared<Ring<T, N>>,
}

/// A FIFO queue of up to `N` plain words.
pub type EventQueue<const N: usize> = Mailbox<u32, N>;

impl<T: Copy, const N: usize> Mailbox<T, N> {
    /// Creates an empty mailbox.
    ///
    /// # Panics
    ///
    /// If `N` is zero.
    pub const fn new() -> Self {
        Self { ring: Shared::new(Ring::new()) }
    }

    /// Removes and returns the oldest record, if there is one.
    pub fn try_take(&self) -> Result<T> {
        self.ring.with(|r| {
            if r.is_empty() {
                return Err(Error::Failure);
            }
            Ok(r.get())
        })
    }

    /// Removes and returns the oldest record, blocking while the mailbox is
    /// empty.
    pub fn take(&self) -> T {
        exec::until(|| self.try_take())
    }

    /// Like [`Mailbox::take`], giving up after `timeout`.
    pub fn take_for(&self, timeout: Ticks) -> Result<T> {
        exec::until_timeout(timeout, || self.try_take())
    }

    /// Appends `value` if there is room.
    pub fn try_give(&self, value: T) -> Result<()> {
        self.ring.with(|r| {
            if r.is_full() {
                return Err(Error::Failure);
            }
            r.put(value);
            Ok(())
        })
    }

    /// Appends `value`, blocking while the mailbox is full.
    pub fn give(&self, value: T) {
        exec::until(|| self.try_give(value))
    }

    /// Like [`Mailbox::give`], giving up after `timeout`.
    pub fn give_for(&self, value: T, timeout: Ticks) -> Result<()> {
        exec::until_timeout(timeout, || self.try_give(value))
    }

    /// Appends `value`, discarding the oldest record if the mailbox is full.
    pub fn push(&self, value: T) {
        self.ring.with(|r| {
            r.evict_for(1);
            r.put(value);
        });
    }

    /// Number of records waiting.
    pub fn count(&self) -> usize {
        self.ring.with(|r| r.count())
    }

    /// Number of records that fit before the mailbox is full.
    pub fn space(&self) -> usize {
        self.ring.with(|r| r.space())
    }

    /// Capacity in records.
    pub const fn limit(&self) -> usize {
        N
    }
}

impl<T: Copy, const N: usize> Default for Mailbox<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_array_mail_wraps_around() {
        let mb: Mailbox<[u8; 4], 3> = Mailbox::new();
        mb.try_give([1, 1, 1, 1]).unwrap();
        mb.try_give([2, 2, 2, 2]).unwrap();
        mb.try_give([3, 3, 3, 3]).unwrap();
        assert_eq!(mb.try_give([4, 4, 4, 4]), Err(Error::Failure));
        assert_eq!(mb.try_take(), Ok([1, 1, 1, 1]));
        mb.try_give([4, 4, 4, 4]).unwrap();
        assert_eq!(mb.try_take(), Ok([2, 2, 2, 2]));
        assert_eq!(mb.try_take(), Ok([3, 3, 3, 3]));
        assert_eq!(mb.try_take(), Ok([4, 4, 4, 4]));
        assert_eq!(mb.try_take(), Err(Error::Failure));
    }

    #[test]
    fn push_into_full_mailbox_drops_oldest_record() {
        let mb: Mailbox<[u8; 4], 3> = Mailbox::new();
        mb.try_give(*b"AAAA").unwrap();
        mb.try_give(*b"BBBB").unwrap();
        mb.try_give(*b"CCCC").unwrap();
        mb.push(*b"DDDD");
        assert_eq!(mb.count(), 3);
        assert_eq!(mb.try_take(), Ok(*b"BBBB"));
        assert_eq!(mb.try_take(), Ok(*b"CCCC"));
        assert_eq!(mb.try_take(), Ok(*b"DDDD"));
        assert_eq!(mb.try_take(), Err(Error::Failure));
    }

    #[test]
    fn push_evicts_oldest() {
        let q: EventQueue<2> = EventQueue::new();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.count(), 2);
        assert_eq!(q.try_take(), Ok(2));
        assert_eq!(q.try_take(), Ok(3));
    }

    #[test]
    fn counts() {
        let q: EventQueue<4> = EventQueue::new();
        q.give(10);
        assert_eq!(q.take(), 10);
        q.give(11);
        assert_eq!((q.count(), q.space(), q.limit()), (1, 3, 4));
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        let _: Mailbox<u8, 0> = Mailbox::new();
    }
}
