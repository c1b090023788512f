// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timekeeping.
//!
//! The OS maintains a monotonic counter recording the number of ticks since
//! boot. With the `systick` feature (on by default) the Cortex-M SysTick timer
//! drives it at [`TICK_HZ`][crate::config::TICK_HZ]; call
//! [`initialize_sys_tick`] once at startup. Applications that would rather use
//! some other hardware timer can turn the feature off and call
//! [`TickTime::increment`] from their own interrupt handler.
//!
//! # Types for describing time
//!
//! `TickTime` is a specific point in time, measured in ticks since boot. It's a
//! 32-bit count, so at 1 kHz it wraps about every 49.7 days. Everything in the
//! kernel that compares times does so with wrapping arithmetic, so the wrap is
//! harmless as long as no single interval is longer than half the counter's
//! range.
//!
//! `Ticks` is a relative interval. `core::time::Duration` converts into
//! `Ticks`, rounding down, for callers that prefer it.

use core::ops::{Add, AddAssign, Sub};
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use crate::atomic::AtomicArithExt;
use crate::config::TICK_HZ;

#[cfg(all(feature = "systick", target_arch = "arm", target_os = "none"))]
pub use crate::cortex_m_timer::initialize_sys_tick;

/// The tick counter. Updated by ISR.
static TICK: AtomicU32 = AtomicU32::new(0);

/// Largest interval that compares correctly under wrapping arithmetic.
const HALF_RANGE: u32 = 1 << 31;

/// Represents a moment in time by the value of the system tick counter.
/// System-specific analog of `std::time::Instant`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct TickTime(u32);

impl TickTime {
    /// Retrieves the current value of the tick counter.
    pub fn now() -> Self {
        TickTime(TICK.load(Ordering::Acquire))
    }

    /// Advances the tick counter by one. This is what the tick ISR calls; it
    /// doesn't wake or switch anything.
    pub fn increment() {
        TICK.fetch_add_polyfill(1, Ordering::Release);
    }

    /// Constructs a `TickTime` value describing a certain number of ticks since
    /// boot.
    pub const fn from_ticks_since_boot(t: u32) -> Self {
        Self(t)
    }

    /// Number of ticks from `earlier` to `self`, with wrapping.
    pub const fn ticks_since(self, earlier: TickTime) -> Ticks {
        Ticks(self.0.wrapping_sub(earlier.0))
    }

    /// Checks the clock to determine how much time has elapsed since the
    /// instant recorded by `self`.
    pub fn elapsed(self) -> Ticks {
        Self::now().ticks_since(self)
    }

    /// Checks whether `self`, taken as a deadline, has been reached at `now`.
    ///
    /// A deadline more than half the counter's range in the future reads as
    /// already reached.
    pub const fn is_reached_at(self, now: TickTime) -> bool {
        self.0.wrapping_sub(now.0) == 0
            || self.0.wrapping_sub(now.0) > HALF_RANGE
    }

    /// Checks whether the deadline `self` has been reached.
    pub fn is_reached(self) -> bool {
        self.is_reached_at(Self::now())
    }

    /// Interval from `now` until the deadline `self`, or zero if the deadline
    /// has been reached (including deadlines too far ahead to represent).
    pub const fn remaining_at(self, now: TickTime) -> Ticks {
        if self.is_reached_at(now) {
            Ticks::ZERO
        } else {
            Ticks(self.0.wrapping_sub(now.0))
        }
    }
}

/// Adds an interval to a `TickTime`. This wraps, like the counter does.
impl Add<Ticks> for TickTime {
    type Output = Self;
    fn add(self, other: Ticks) -> Self::Output {
        TickTime(self.0.wrapping_add(other.0))
    }
}

impl AddAssign<Ticks> for TickTime {
    fn add_assign(&mut self, other: Ticks) {
        self.0 = self.0.wrapping_add(other.0);
    }
}

impl Sub<TickTime> for TickTime {
    type Output = Ticks;
    fn sub(self, other: TickTime) -> Ticks {
        self.ticks_since(other)
    }
}

impl From<TickTime> for u32 {
    fn from(t: TickTime) -> Self {
        t.0
    }
}

/// A relative interval measured in ticks.
///
/// This plays a role similar to `core::time::Duration` but is much cheaper:
/// a tick is the kernel's internal unit, so no conversion is ever needed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Ticks(pub u32);

impl Ticks {
    /// No time at all.
    pub const ZERO: Self = Self(0);

    /// Converts whole milliseconds to ticks at the configured tick rate.
    pub const fn from_millis(ms: u32) -> Self {
        Self(((ms as u64 * TICK_HZ as u64) / 1000) as u32)
    }
}

impl From<u32> for Ticks {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<Ticks> for u32 {
    fn from(x: Ticks) -> Self {
        x.0
    }
}

/// Converts a `Duration`, rounding down to whole ticks and saturating at the
/// largest representable interval.
impl From<Duration> for Ticks {
    fn from(d: Duration) -> Self {
        let t = d.as_millis() * TICK_HZ as u128 / 1000;
        Self(u32::try_from(t).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_since_wraps() {
        let before = TickTime::from_ticks_since_boot(u32::MAX - 2);
        let after = TickTime::from_ticks_since_boot(4);
        assert_eq!(after.ticks_since(before), Ticks(7));
        assert_eq!(before + Ticks(7), after);
    }

    #[test]
    fn deadline_reached() {
        let now = TickTime::from_ticks_since_boot(100);
        assert!(TickTime::from_ticks_since_boot(100).is_reached_at(now));
        assert!(TickTime::from_ticks_since_boot(99).is_reached_at(now));
        assert!(!TickTime::from_ticks_since_boot(101).is_reached_at(now));
        assert_eq!(
            TickTime::from_ticks_since_boot(110).remaining_at(now),
            Ticks(10),
        );
    }

    #[test]
    fn far_deadline_reads_as_reached() {
        let now = TickTime::from_ticks_since_boot(0);
        let far = now + Ticks(HALF_RANGE + 1);
        assert!(far.is_reached_at(now));
        assert_eq!(far.remaining_at(now), Ticks::ZERO);
    }

    #[test]
    fn duration_conversion() {
        assert_eq!(Ticks::from(Duration::from_millis(250)), Ticks::from_millis(250));
        assert_eq!(Ticks::from(Duration::from_secs(u64::MAX)), Ticks(u32::MAX));
    }
}
