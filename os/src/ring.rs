// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-capacity circular buffer shared by all the queue types.
//!
//! This is plain data with no locking of its own; the queues keep it in a
//! [`Shared`][crate::sync::Shared]. Elements are `Copy`, so nothing ever needs
//! dropping.

use core::mem::MaybeUninit;

pub(crate) struct Ring<T, const N: usize> {
    storage: [MaybeUninit<T>; N],
    /// Next slot to read. Always in `0..N`.
    head: usize,
    /// Next slot to write. Always in `0..N`.
    tail: usize,
    count: usize,
}

impl<T: Copy, const N: usize> Ring<T, N> {
    pub(crate) const fn new() -> Self {
        cheap_assert!(N > 0);
        Self {
            storage: [const { MaybeUninit::uninit() }; N],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn space(&self) -> usize {
        N - self.count
    }

    pub(crate) const fn limit(&self) -> usize {
        N
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.count == N
    }

    fn next_index(i: usize) -> usize {
        if i + 1 == N { 0 } else { i + 1 }
    }

    /// Appends `x`. The ring must not be full.
    pub(crate) fn put(&mut self, x: T) {
        cheap_assert!(!self.is_full());
        self.storage[self.tail] = MaybeUninit::new(x);
        self.tail = Self::next_index(self.tail);
        self.count += 1;
    }

    /// Removes the oldest element. The ring must not be empty.
    pub(crate) fn get(&mut self) -> T {
        cheap_assert!(!self.is_empty());
        // Safety: every slot between head and tail has been written by `put`.
        let x = unsafe { self.storage[self.head].assume_init() };
        self.head = Self::next_index(self.head);
        self.count -= 1;
        x
    }

    /// Copy of the element `offset` places from the oldest, without removing
    /// anything.
    pub(crate) fn peek(&self, offset: usize) -> T {
        cheap_assert!(offset < self.count);
        let i = (self.head + offset) % N;
        // Safety: as in `get`, the slot is within the written region.
        unsafe { self.storage[i].assume_init() }
    }

    /// Discards the `n` oldest elements.
    pub(crate) fn skip(&mut self, n: usize) {
        cheap_assert!(n <= self.count);
        self.head = (self.head + n) % N;
        self.count -= n;
    }

    /// Makes room for `n` more elements by discarding the oldest ones.
    pub(crate) fn evict_for(&mut self, n: usize) {
        cheap_assert!(n <= N);
        if self.space() < n {
            self.skip(n - self.space());
        }
    }

    pub(crate) fn put_slice(&mut self, xs: &[T]) {
        debug_cheap_assert!(xs.len() <= self.space());
        for &x in xs {
            self.put(x);
        }
    }

    pub(crate) fn get_slice(&mut self, out: &mut [T]) {
        debug_cheap_assert!(out.len() <= self.count);
        for slot in out {
            *slot = self.get();
        }
    }
}

impl<T, const N: usize> core::fmt::Debug for Ring<T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ring")
            .field("count", &self.count)
            .field("limit", &N)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}
