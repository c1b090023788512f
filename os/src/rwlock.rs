// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read/write locks.
//!
//! Any number of readers, or one writer. Readers aren't tracked by identity,
//! so unlike [`Mutex`][crate::mutex::Mutex] this lock can't check who releases
//! it; releasing a lock that isn't held the right way is a programming error.
//!
//! New readers are admitted while readers hold the lock, so a steady stream
//! of readers can starve a writer.

use scopeguard::defer;

use crate::exec;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::{Error, Result};

/// A read/write lock.
#[derive(Debug)]
pub struct RwLock {
    state: Shared<Holders>,
}

#[derive(Copy, Clone, Debug, Default)]
struct Holders {
    writer: bool,
    readers: u32,
}

impl RwLock {
    /// Creates an unlocked lock.
    pub const fn new() -> Self {
        Self { state: Shared::new(Holders { writer: false, readers: 0 }) }
    }

    /// Takes a read lock unless a writer holds the lock.
    pub fn try_read(&self) -> Result<()> {
        self.state.with(|h| {
            if h.writer {
                return Err(Error::Failure);
            }
            h.readers += 1;
            Ok(())
        })
    }

    /// Takes a read lock, blocking while a writer holds the lock.
    pub fn read(&self) {
        exec::until(|| self.try_read())
    }

    /// Like [`RwLock::read`], giving up after `timeout`.
    pub fn read_for(&self, timeout: Ticks) -> Result<()> {
        exec::until_timeout(timeout, || self.try_read())
    }

    /// Releases one read lock.
    ///
    /// # Panics
    ///
    /// If no read lock is held.
    pub fn end_read(&self) {
        self.state.with(|h| {
            cheap_assert!(h.readers > 0);
            h.readers -= 1;
        });
    }

    /// Takes the write lock if nobody holds the lock at all.
    pub fn try_write(&self) -> Result<()> {
        self.state.with(|h| {
            if h.writer || h.readers > 0 {
                return Err(Error::Failure);
            }
            h.writer = true;
            Ok(())
        })
    }

    /// Takes the write lock, blocking while anyone holds the lock.
    pub fn write(&self) {
        exec::until(|| self.try_write())
    }

    /// Like [`RwLock::write`], giving up after `timeout`.
    pub fn write_for(&self, timeout: Ticks) -> Result<()> {
        exec::until_timeout(timeout, || self.try_write())
    }

    /// Releases the write lock.
    ///
    /// # Panics
    ///
    /// If the write lock isn't held.
    pub fn end_write(&self) {
        self.state.with(|h| {
            cheap_assert!(h.writer);
            h.writer = false;
        });
    }

    /// Takes a read lock, runs `op`, and releases the lock.
    pub fn read_with<R>(&self, op: impl FnOnce() -> R) -> R {
        self.read();
        defer! {
            self.end_read();
        }
        op()
    }

    /// Takes the write lock, runs `op`, and releases the lock.
    pub fn write_with<R>(&self, op: impl FnOnce() -> R) -> R {
        self.write();
        defer! {
            self.end_write();
        }
        op()
    }

    /// Number of read locks held right now.
    pub fn readers(&self) -> u32 {
        self.state.with(|h| h.readers)
    }

    /// Checks whether the write lock is held.
    pub fn is_writing(&self) -> bool {
        self.state.with(|h| h.writer)
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        let h = self.state.get_mut();
        debug_cheap_assert!(!h.writer && h.readers == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_share() {
        let lock = RwLock::new();
        lock.try_read().unwrap();
        lock.try_read().unwrap();
        assert_eq!(lock.readers(), 2);
        assert_eq!(lock.try_write(), Err(Error::Failure));
        lock.end_read();
        assert_eq!(lock.try_write(), Err(Error::Failure));
        lock.end_read();
        assert_eq!(lock.try_write(), Ok(()));
        lock.end_write();
    }

    #[test]
    fn writer_excludes_everyone() {
        let lock = RwLock::new();
        lock.try_write().unwrap();
        assert!(lock.is_writing());
        assert_eq!(lock.try_read(), Err(Error::Failure));
        assert_eq!(lock.try_write(), Err(Error::Failure));
        lock.end_write();
        assert_eq!(lock.try_read(), Ok(()));
        lock.end_read();
    }

    #[test]
    fn closure_helpers_release() {
        let lock = RwLock::new();
        assert_eq!(lock.read_with(|| lock.readers()), 1);
        assert!(lock.write_with(|| lock.is_writing()));
        assert_eq!(lock.readers(), 0);
        assert!(!lock.is_writing());
    }

    #[test]
    #[should_panic]
    fn double_release_panics() {
        static LOCK: RwLock = RwLock::new();
        LOCK.end_read();
    }
}
