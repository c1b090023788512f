// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mutual exclusion with ownership.
//!
//! A `Mutex` records which task holds it. Only that task may give it back, and
//! taking a mutex you already hold is a programming error (this mutex isn't
//! recursive). The mutex guards no data of its own; it protects whatever the
//! application says it protects.
//!
//! # `take`/`give` vs `perform`
//!
//! The primitive operations are [`Mutex::take`] and [`Mutex::give`]. It's easy
//! to forget the `give` on some early-return path, though, so there's also
//! [`Mutex::perform`], which takes the mutex, runs a closure, and gives the
//! mutex back however the closure exits.
//!
//! # Fairness
//!
//! There is none. Contending tasks re-check the mutex when the scheduler's
//! scan reaches them, so the first one after the owner gives it up wins.
//!
//! # Killed owners
//!
//! If the owning task is killed, the mutex stays held. Nothing can give it
//! back, so don't kill tasks that might hold mutexes.

use scopeguard::defer;

use crate::exec;
use crate::node::NodeId;
use crate::sync::Shared;
use crate::task::Task;
use crate::time::Ticks;
use crate::{Error, Result};

/// A non-recursive mutex that knows its owner.
#[derive(Debug)]
pub struct Mutex {
    owner: Shared<Option<NodeId>>,
}

impl Mutex {
    /// Creates an unlocked mutex.
    pub const fn new() -> Self {
        Self { owner: Shared::new(None) }
    }

    /// Takes the mutex if nobody holds it.
    ///
    /// # Panics
    ///
    /// If the caller already holds it.
    pub fn try_take(&self) -> Result<()> {
        self.try_take_as(exec::current_id())
    }

    /// Takes the mutex, blocking while someone else holds it.
    ///
    /// # Panics
    ///
    /// If the caller already holds it.
    pub fn take(&self) {
        let me = exec::current_id();
        exec::until(|| self.try_take_as(me))
    }

    /// Like [`Mutex::take`], giving up after `timeout`.
    pub fn take_for(&self, timeout: Ticks) -> Result<()> {
        let me = exec::current_id();
        exec::until_timeout(timeout, || self.try_take_as(me))
    }

    /// Gives the mutex back. Fails if the caller isn't the owner.
    pub fn give(&self) -> Result<()> {
        self.give_as(exec::current_id())
    }

    /// Takes the mutex, runs `op`, and gives the mutex back, even if `op`
    /// panics. Returns whatever `op` returns.
    pub fn perform<R>(&self, op: impl FnOnce() -> R) -> R {
        self.take();
        defer! {
            self.give().ok();
        }
        op()
    }

    /// Like [`Mutex::perform`], but only if the mutex is free right now.
    pub fn try_perform<R>(&self, op: impl FnOnce() -> R) -> Result<R> {
        self.try_take()?;
        defer! {
            self.give().ok();
        }
        Ok(op())
    }

    /// Checks whether anyone holds the mutex.
    pub fn is_locked(&self) -> bool {
        self.owner.with(|o| o.is_some())
    }

    /// The task holding the mutex, if any.
    pub fn owner(&self) -> Option<Task> {
        self.owner.with(|o| *o).map(Task::from_id)
    }

    pub(crate) fn try_take_as(&self, who: NodeId) -> Result<()> {
        self.owner.with(|owner| {
            cheap_assert!(*owner != Some(who));
            if owner.is_some() {
                return Err(Error::Failure);
            }
            *owner = Some(who);
            Ok(())
        })
    }

    pub(crate) fn give_as(&self, who: NodeId) -> Result<()> {
        self.owner.with(|owner| {
            if *owner != Some(who) {
                return Err(Error::Failure);
            }
            *owner = None;
            Ok(())
        })
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        debug_cheap_assert!(self.owner.get_mut().is_none());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NodeId = NodeId(1);
    const B: NodeId = NodeId(2);

    #[test]
    fn exclusive() {
        let m = Mutex::new();
        assert_eq!(m.try_take_as(A), Ok(()));
        assert!(m.is_locked());
        assert_eq!(m.try_take_as(B), Err(Error::Failure));
        assert_eq!(m.give_as(A), Ok(()));
        assert_eq!(m.try_take_as(B), Ok(()));
        assert_eq!(m.give_as(B), Ok(()));
        assert!(!m.is_locked());
    }

    #[test]
    fn only_owner_gives() {
        let m = Mutex::new();
        assert_eq!(m.give_as(A), Err(Error::Failure));
        m.try_take_as(A).unwrap();
        assert_eq!(m.give_as(B), Err(Error::Failure));
        assert!(m.is_locked());
        m.give_as(A).unwrap();
    }

    #[test]
    #[should_panic]
    fn recursive_take_panics() {
        // Static, so the still-held mutex isn't dropped while unwinding.
        static M: Mutex = Mutex::new();
        M.try_take_as(A).unwrap();
        let _ = M.try_take_as(A);
    }
}
