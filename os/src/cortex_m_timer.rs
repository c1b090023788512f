// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cortex-M SysTick driver for the tick counter.

use cortex_m::peripheral::{syst::SystClkSource, SYST};
use cortex_m_rt::exception;

use crate::config::TICK_HZ;
use crate::time::TickTime;

/// Sets up the tick counter to run at [`TICK_HZ`], assuming a CPU core clock
/// of `clock_hz`.
///
/// Call this before [`run`][crate::exec::run] (or before anything sleeps or
/// starts a timer) to get the counter going.
pub fn initialize_sys_tick(syst: &mut SYST, clock_hz: u32) {
    let cycles_per_tick = clock_hz / TICK_HZ;
    syst.set_reload(cycles_per_tick - 1);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_interrupt();
    syst.enable_counter();
}

/// System tick ISR. Advances the tick counter. Nothing is woken here; the
/// scheduler notices expired countdowns on its next scan.
#[doc(hidden)]
#[exception]
fn SysTick() {
    TickTime::increment();
}
