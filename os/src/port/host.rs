// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stand-in port for building and unit-testing the kernel on a development
//! machine. It records contexts but can't actually run anything on a task
//! stack; any attempt to switch stacks panics.

use super::{Context, Entry};

pub(crate) unsafe fn init_context(stack_top: *mut u32, _entry: Entry) -> Context {
    Context { sp: stack_top }
}

pub(crate) unsafe fn switch(_save: *mut Context, _load: *const Context) {
    panic!("stack switching is not available on this target");
}

pub(crate) unsafe fn restart(_stack_top: *mut u32, _entry: Entry) -> ! {
    panic!("stack switching is not available on this target");
}

pub(crate) unsafe fn enable_interrupts() {}
