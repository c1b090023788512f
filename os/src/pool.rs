// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fixed-size block allocation.
//!
//! A `MemoryPool<T, N>` owns storage for `N` values of type `T`. Taking a
//! block moves a value into a free slot and hands back a [`Block`], which
//! derefs to the value and returns the slot to the pool when dropped.
//!
//! Free slots are chained through a list threaded through the slots
//! themselves, so the pool costs nothing beyond its storage and two words of
//! bookkeeping. Allocation and release are constant time.
//!
//! ```ignore
//! static FRAMES: MemoryPool<[u8; 64], 8> = MemoryPool::new();
//!
//! let mut frame = FRAMES.take([0; 64]);
//! frame[0] = 0x7E;
//! // Slot goes back to FRAMES here.
//! drop(frame);
//! ```

use core::cell::UnsafeCell;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use crate::exec;
use crate::sync::Shared;
use crate::time::Ticks;

/// A slot is either on the free list, holding the index of the next free
/// slot, or allocated, holding a value.
union Slot<T> {
    next: usize,
    value: ManuallyDrop<T>,
}

#[derive(Debug)]
struct FreeList {
    /// First free slot, or `N` if there are none.
    head: usize,
    free: usize,
}

/// Storage for `N` values of type `T`, handed out one block at a time.
pub struct MemoryPool<T, const N: usize> {
    slots: [UnsafeCell<Slot<T>>; N],
    list: Shared<FreeList>,
}

// Safety: a slot is only reached through the free list, under its critical
// section, or through the single `Block` that owns it. Values cross tasks, so
// they must be `Send`.
unsafe impl<T: Send, const N: usize> Sync for MemoryPool<T, N> {}

impl<T, const N: usize> MemoryPool<T, N> {
    /// Creates a pool with every block free.
    ///
    /// # Panics
    ///
    /// If `N` is zero.
    pub const fn new() -> Self {
        cheap_assert!(N > 0);
        let mut slots = [const { UnsafeCell::new(Slot { next: 0 }) }; N];
        let mut i = 0;
        while i < N {
            slots[i] = UnsafeCell::new(Slot { next: i + 1 });
            i += 1;
        }
        Self { slots, list: Shared::new(FreeList { head: 0, free: N }) }
    }

    /// Moves `value` into a free block. If there is none, hands `value` back.
    pub fn try_take(&self, value: T) -> Result<Block<'_, T, N>, T> {
        let index = self.list.with(|list| {
            if list.head == N {
                return None;
            }
            let i = list.head;
            // Safety: slot `i` is on the free list, so it holds a link and
            // nothing else refers to it.
            list.head = unsafe { (*self.slots[i].get()).next };
            list.free -= 1;
            Some(i)
        });
        match index {
            Some(index) => {
                // Safety: slot `index` left the free list above and belongs to
                // us alone. Writing a union field drops nothing.
                unsafe {
                    (*self.slots[index].get()).value = ManuallyDrop::new(value);
                }
                Ok(Block { pool: self, index })
            }
            None => Err(value),
        }
    }

    /// Moves `value` into a block, blocking until one is free.
    pub fn take(&self, value: T) -> Block<'_, T, N> {
        let mut value = Some(value);
        exec::until(|| self.retake(&mut value))
    }

    /// Like [`MemoryPool::take`], giving up after `timeout`. On timeout the
    /// value comes back in the `Err`.
    pub fn take_for(&self, value: T, timeout: Ticks) -> Result<Block<'_, T, N>, T> {
        let mut value = Some(value);
        match exec::until_timeout(timeout, || self.retake(&mut value)) {
            Ok(block) => Ok(block),
            Err(_) => match value {
                Some(value) => Err(value),
                None => panic!(),
            },
        }
    }

    fn retake(&self, value: &mut Option<T>) -> Option<Block<'_, T, N>> {
        match self.try_take(value.take()?) {
            Ok(block) => Some(block),
            Err(v) => {
                *value = Some(v);
                None
            }
        }
    }

    /// Returns `block` to the pool, dropping its value.
    ///
    /// # Panics
    ///
    /// If `block` came from a different pool.
    pub fn give(&self, block: Block<'_, T, N>) {
        cheap_assert!(core::ptr::eq(block.pool, self));
        drop(block);
    }

    /// Number of free blocks.
    pub fn count(&self) -> usize {
        self.list.with(|list| list.free)
    }

    /// Number of blocks in use.
    pub fn space(&self) -> usize {
        N - self.count()
    }

    /// Total number of blocks.
    pub const fn limit(&self) -> usize {
        N
    }

    fn release(&self, index: usize) {
        self.list.with(|list| {
            // Safety: the caller owned slot `index` and is done with its
            // value; it becomes a link again.
            unsafe {
                (*self.slots[index].get()).next = list.head;
            }
            list.head = index;
            list.free += 1;
        });
    }
}

impl<T, const N: usize> Default for MemoryPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> core::fmt::Debug for MemoryPool<T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("limit", &N)
            .field("list", &self.list)
            .finish()
    }
}

/// A value living in a [`MemoryPool`] block. Dropping it frees the block.
pub struct Block<'a, T, const N: usize> {
    pool: &'a MemoryPool<T, N>,
    index: usize,
}

impl<T, const N: usize> Block<'_, T, N> {
    /// Moves the value out and frees the block.
    pub fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);
        // Safety: the block owns an initialized value, and `this` won't run
        // `Drop`, so the value is read exactly once.
        let value = unsafe {
            ManuallyDrop::take(&mut (*this.pool.slots[this.index].get()).value)
        };
        this.pool.release(this.index);
        value
    }
}

impl<T, const N: usize> Deref for Block<'_, T, N> {
    type Target = T;

    fn deref(&self) -> &T {
        // Safety: the block owns an initialized value.
        unsafe { &(*self.pool.slots[self.index].get()).value }
    }
}

impl<T, const N: usize> DerefMut for Block<'_, T, N> {
    fn deref_mut(&mut self) -> &mut T {
        // Safety: as in `deref`, and `&mut self` makes the access unique.
        unsafe { &mut (*self.pool.slots[self.index].get()).value }
    }
}

impl<T, const N: usize> Drop for Block<'_, T, N> {
    fn drop(&mut self) {
        // Safety: the block owns an initialized value, dropped only here.
        unsafe {
            ManuallyDrop::drop(&mut (*self.pool.slots[self.index].get()).value);
        }
        self.pool.release(self.index);
    }
}

impl<T: core::fmt::Debug, const N: usize> core::fmt::Debug for Block<'_, T, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Block")
            .field("index", &self.index)
            .field("value", &**self)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn exhaustion_hands_value_back() {
        let pool: MemoryPool<u32, 2> = MemoryPool::new();
        let a = pool.try_take(1).unwrap();
        let b = pool.take(2);
        assert_eq!(pool.count(), 0);
        assert_eq!(pool.try_take(3).unwrap_err(), 3);
        assert_eq!((*a, *b), (1, 2));
        pool.give(a);
        assert_eq!((pool.count(), pool.space()), (1, 1));
        drop(b);
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn freed_block_is_reused_first() {
        let pool: MemoryPool<[u8; 8], 3> = MemoryPool::new();
        let a = pool.try_take([0; 8]).unwrap();
        let mut b = pool.try_take([0; 8]).unwrap();
        b[7] = 9;
        let b_index = b.index;
        assert_eq!(b.into_inner()[7], 9);
        let c = pool.try_take([1; 8]).unwrap();
        assert_eq!(c.index, b_index);
        assert_ne!(a.index, c.index);
    }

    #[test]
    fn values_are_dropped_once() {
        let tracker = Rc::new(());
        {
            let pool: MemoryPool<Rc<()>, 2> = MemoryPool::new();
            let a = pool.try_take(tracker.clone()).unwrap();
            let b = pool.try_take(tracker.clone()).unwrap();
            assert_eq!(Rc::strong_count(&tracker), 3);
            drop(a);
            let kept = b.into_inner();
            assert_eq!(Rc::strong_count(&tracker), 2);
            drop(kept);
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    #[should_panic]
    fn zero_capacity_panics() {
        let _: MemoryPool<u8, 0> = MemoryPool::new();
    }

    #[test]
    #[should_panic]
    fn give_to_wrong_pool_panics() {
        let p: MemoryPool<u8, 1> = MemoryPool::new();
        let q: MemoryPool<u8, 1> = MemoryPool::new();
        let block = q.try_take(0).unwrap();
        p.give(block);
    }
}
