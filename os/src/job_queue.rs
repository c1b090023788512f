// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Queues of deferred work.
//!
//! A `JobQueue` holds function pointers. Taking from the queue runs the job
//! in the taking task, after the queue has been released, so a job may do
//! anything a task can do, including giving more jobs to the same queue.
//!
//! A typical use is deferring the bulk of an interrupt handler's work: the
//! handler calls [`JobQueue::push`], and a worker task loops on
//! [`JobQueue::take`].

use crate::mailbox::Mailbox;
use crate::time::Ticks;
use crate::Result;

/// A FIFO queue of up to `N` jobs.
#[derive(Debug)]
pub struct JobQueue<const N: usize> {
    jobs: Mailbox<fn(), N>,
}

impl<const N: usize> JobQueue<N> {
    /// Creates an empty queue.
    pub const fn new() -> Self {
        Self { jobs: Mailbox::new() }
    }

    /// Runs the oldest job, if there is one.
    pub fn try_take(&self) -> Result<()> {
        let job = self.jobs.try_take()?;
        job();
        Ok(())
    }

    /// Runs the oldest job, blocking while the queue is empty.
    pub fn take(&self) {
        let job = self.jobs.take();
        job();
    }

    /// Like [`JobQueue::take`], giving up after `timeout`.
    pub fn take_for(&self, timeout: Ticks) -> Result<()> {
        let job = self.jobs.take_for(timeout)?;
        job();
        Ok(())
    }

    /// Queues `job` if there is room.
    pub fn try_give(&self, job: fn()) -> Result<()> {
        self.jobs.try_give(job)
    }

    /// Queues `job`, blocking while the queue is full.
    pub fn give(&self, job: fn()) {
        self.jobs.give(job)
    }

    /// Like [`JobQueue::give`], giving up after `timeout`.
    pub fn give_for(&self, job: fn(), timeout: Ticks) -> Result<()> {
        self.jobs.give_for(job, timeout)
    }

    /// Queues `job`, discarding the oldest job if the queue is full.
    pub fn push(&self, job: fn()) {
        self.jobs.push(job)
    }

    /// Number of jobs waiting.
    pub fn count(&self) -> usize {
        self.jobs.count()
    }

    /// Number of jobs that fit before the queue is full.
    pub fn space(&self) -> usize {
        self.jobs.space()
    }

    /// Capacity in jobs.
    pub const fn limit(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for JobQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use core::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::Error;

    #[test]
    fn jobs_run_in_order() {
        static LOG: AtomicU32 = AtomicU32::new(0);
        fn one() {
            LOG.store(LOG.load(Ordering::Relaxed) * 10 + 1, Ordering::Relaxed);
        }
        fn two() {
            LOG.store(LOG.load(Ordering::Relaxed) * 10 + 2, Ordering::Relaxed);
        }

        let q: JobQueue<2> = JobQueue::new();
        q.try_give(two).unwrap();
        q.try_give(one).unwrap();
        assert_eq!(q.try_give(one), Err(Error::Failure));
        q.try_take().unwrap();
        q.take();
        assert_eq!(q.try_take(), Err(Error::Failure));
        assert_eq!(LOG.load(Ordering::Relaxed), 21);
    }

    #[test]
    fn job_may_requeue_itself() {
        static Q: JobQueue<1> = JobQueue::new();
        static RUNS: AtomicU32 = AtomicU32::new(0);
        fn again() {
            if RUNS.fetch_add(1, Ordering::Relaxed) < 2 {
                Q.try_give(again).unwrap();
            }
        }

        Q.give(again);
        while Q.try_take().is_ok() {}
        assert_eq!(RUNS.load(Ordering::Relaxed), 3);
        assert_eq!(Q.count(), 0);
    }

    #[test]
    fn push_drops_oldest_job() {
        static RAN: AtomicU32 = AtomicU32::new(0);
        fn first() {
            RAN.store(1, Ordering::Relaxed);
        }
        fn second() {
            RAN.store(2, Ordering::Relaxed);
        }

        let q: JobQueue<1> = JobQueue::new();
        q.push(first);
        q.push(second);
        q.try_take().unwrap();
        assert_eq!(RAN.load(Ordering::Relaxed), 2);
    }
}
