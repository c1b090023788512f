// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Counting semaphores.
//!
//! A `Semaphore` holds a number of _permits_ between zero and its limit.
//! [`Semaphore::take`] removes one, blocking while there are none;
//! [`Semaphore::give`] puts one back, blocking while the semaphore is full.
//! Binary and counting semaphores are the same type with different limits.
//!
//! Waiting tasks are not queued: whichever waiter the scheduler's scan reaches
//! first after a permit is given gets it.
//!
//! Interrupt handlers may call [`Semaphore::try_give`] and
//! [`Semaphore::try_take`].

use crate::exec;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::{Error, Result};

/// A counting semaphore.
#[derive(Debug)]
pub struct Semaphore {
    state: Shared<Permits>,
}

#[derive(Copy, Clone, Debug)]
struct Permits {
    count: u32,
    limit: u32,
}

impl Semaphore {
    /// Creates a semaphore holding `count` of at most `limit` permits.
    ///
    /// # Panics
    ///
    /// If `limit` is zero or `count` exceeds it.
    pub const fn new(count: u32, limit: u32) -> Self {
        cheap_assert!(limit > 0);
        cheap_assert!(count <= limit);
        Self { state: Shared::new(Permits { count, limit }) }
    }

    /// Creates a semaphore with a limit of one.
    pub const fn binary(count: u32) -> Self {
        Self::new(count, 1)
    }

    /// Creates a semaphore with no practical limit.
    pub const fn counting(count: u32) -> Self {
        Self::new(count, u32::MAX)
    }

    /// Takes a permit if one is available.
    pub fn try_take(&self) -> Result<()> {
        self.state.with(|p| {
            if p.count == 0 {
                return Err(Error::Failure);
            }
            p.count -= 1;
            Ok(())
        })
    }

    /// Takes a permit, blocking until one is available.
    pub fn take(&self) {
        exec::until(|| self.try_take())
    }

    /// Like [`Semaphore::take`], giving up after `timeout`.
    pub fn take_for(&self, timeout: Ticks) -> Result<()> {
        exec::until_timeout(timeout, || self.try_take())
    }

    /// Gives a permit back if the semaphore isn't full.
    pub fn try_give(&self) -> Result<()> {
        self.state.with(|p| {
            if p.count == p.limit {
                return Err(Error::Failure);
            }
            p.count += 1;
            Ok(())
        })
    }

    /// Gives a permit back, blocking while the semaphore is full.
    pub fn give(&self) {
        exec::until(|| self.try_give())
    }

    /// Like [`Semaphore::give`], giving up after `timeout`.
    pub fn give_for(&self, timeout: Ticks) -> Result<()> {
        exec::until_timeout(timeout, || self.try_give())
    }

    /// Takes a permit if one is available, wrapped in a [`Permit`] that gives
    /// it back when dropped.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        self.try_take().ok()?;
        Some(Permit { semaphore: self })
    }

    /// Takes a permit, blocking until one is available, wrapped in a
    /// [`Permit`] that gives it back when dropped.
    pub fn acquire(&self) -> Permit<'_> {
        self.take();
        Permit { semaphore: self }
    }

    /// Number of permits available right now.
    pub fn count(&self) -> u32 {
        self.state.with(|p| p.count)
    }

    /// Number of permits that could be given back before the semaphore is full.
    pub fn space(&self) -> u32 {
        self.state.with(|p| p.limit - p.count)
    }

    /// Most permits this semaphore can hold.
    pub fn limit(&self) -> u32 {
        self.state.with(|p| p.limit)
    }
}

/// A permit taken from a [`Semaphore`]. Dropping it gives the permit back.
#[derive(Debug)]
pub struct Permit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        // Can only fail if someone gave an extra permit out of band; the
        // semaphore is full either way.
        self.semaphore.try_give().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_semaphore() {
        let sem = Semaphore::new(0, 2);
        assert_eq!(sem.try_take(), Err(Error::Failure));
        assert_eq!(sem.try_give(), Ok(()));
        assert_eq!(sem.try_give(), Ok(()));
        assert_eq!(sem.try_give(), Err(Error::Failure));
        assert_eq!(sem.count(), 2);
        assert_eq!(sem.space(), 0);
        assert_eq!(sem.try_take(), Ok(()));
        assert_eq!(sem.try_take(), Ok(()));
        assert_eq!(sem.try_take(), Err(Error::Failure));
        assert_eq!(sem.limit(), 2);
    }

    #[test]
    fn binary_semaphore() {
        let sem = Semaphore::binary(1);
        assert_eq!(sem.try_give(), Err(Error::Failure));
        assert_eq!(sem.try_take(), Ok(()));
        assert_eq!(sem.try_take(), Err(Error::Failure));
    }

    #[test]
    fn blocking_ops_succeed_at_once_when_possible() {
        let sem = Semaphore::counting(1);
        sem.take();
        sem.give();
        sem.give();
        assert_eq!(sem.count(), 2);
    }

    #[test]
    fn oversized_timeout_still_tries_once() {
        let sem = Semaphore::counting(1);
        assert_eq!(sem.take_for(Ticks(u32::MAX)), Ok(()));
        assert_eq!(sem.take_for(Ticks(u32::MAX)), Err(Error::Timeout));
        assert_eq!(sem.give_for(Ticks(u32::MAX)), Ok(()));
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn permit_returns_on_drop() {
        let sem = Semaphore::new(1, 1);
        let permit = sem.try_acquire();
        assert!(permit.is_some());
        assert!(sem.try_acquire().is_none());
        drop(permit);
        assert_eq!(sem.count(), 1);
    }

    #[test]
    #[should_panic]
    fn zero_limit_panics() {
        Semaphore::new(0, 0);
    }

    #[test]
    #[should_panic]
    fn count_over_limit_panics() {
        Semaphore::new(3, 2);
    }
}
