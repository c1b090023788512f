// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt-safe shared state.
//!
//! Every piece of kernel state that can be touched from more than one task, or
//! from an interrupt handler, lives in a `Shared` and is only reached through
//! [`Shared::with`].

use core::cell::RefCell;

pub(crate) struct Shared<T>(critical_section::Mutex<RefCell<T>>);

impl<T> Shared<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(critical_section::Mutex::new(RefCell::new(value)))
    }

    /// Runs `body` with exclusive access to the contents, inside a critical
    /// section.
    ///
    /// `body` must not call back into anything that takes the same `Shared`;
    /// that panics on the inner borrow.
    #[inline]
    pub(crate) fn with<R>(&self, body: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| body(&mut self.0.borrow(cs).borrow_mut()))
    }

    /// Borrows the contents inside a critical section the caller already holds.
    pub(crate) fn borrow<'cs>(
        &'cs self,
        cs: critical_section::CriticalSection<'cs>,
    ) -> core::cell::RefMut<'cs, T> {
        self.0.borrow(cs).borrow_mut()
    }

    /// Access without a critical section, for when we hold `&mut self`.
    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.0.get_mut().get_mut()
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        critical_section::with(|cs| match self.0.borrow(cs).try_borrow() {
            Ok(contents) => contents.fmt(f),
            Err(_) => f.write_str("<busy>"),
        })
    }
}
