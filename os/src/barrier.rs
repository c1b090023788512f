// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Barriers: rendezvous points for a fixed number of tasks.
//!
//! The first `limit - 1` tasks to reach [`Barrier::wait`] block. The last one
//! releases them all and resets the barrier for the next round.

use crate::exec;
use crate::sync::Shared;

/// A reusable barrier for `limit` tasks.
#[derive(Debug)]
pub struct Barrier {
    state: Shared<Round>,
}

#[derive(Copy, Clone, Debug)]
struct Round {
    remaining: u32,
    limit: u32,
    /// Bumped every time a round completes.
    signal: u32,
}

impl Barrier {
    /// Creates a barrier for `limit` tasks.
    ///
    /// # Panics
    ///
    /// If `limit` is zero.
    pub const fn new(limit: u32) -> Self {
        cheap_assert!(limit > 0);
        Self { state: Shared::new(Round { remaining: limit, limit, signal: 0 }) }
    }

    /// Blocks until `limit` tasks (counting this one) have arrived. Returns
    /// `true` in the task whose arrival completed the round.
    pub fn wait(&self) -> bool {
        match self.arrive() {
            None => true,
            Some(round) => {
                exec::until(|| self.state.with(|r| r.signal != round));
                false
            }
        }
    }

    /// Number of tasks still expected this round.
    pub fn remaining(&self) -> u32 {
        self.state.with(|r| r.remaining)
    }

    /// Number of tasks per round.
    pub fn limit(&self) -> u32 {
        self.state.with(|r| r.limit)
    }

    /// Records an arrival. Returns the round to wait out, or `None` if this
    /// arrival completed it.
    fn arrive(&self) -> Option<u32> {
        self.state.with(|r| {
            r.remaining -= 1;
            if r.remaining == 0 {
                r.remaining = r.limit;
                r.signal = r.signal.wrapping_add(1);
                None
            } else {
                Some(r.signal)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_arrival_completes_round() {
        let b = Barrier::new(3);
        assert_eq!(b.arrive(), Some(0));
        assert_eq!(b.arrive(), Some(0));
        assert_eq!(b.remaining(), 1);
        assert_eq!(b.arrive(), None);
        assert_eq!(b.remaining(), 3);
        assert_eq!(b.arrive(), Some(1));
    }

    #[test]
    fn single_task_barrier_never_blocks() {
        let b = Barrier::new(1);
        assert!(b.wait());
        assert!(b.wait());
    }
}
