//! OS test suite.
//!
//! The test suite is SoC-independent. It runs as a task of its own (the
//! "coordinator"), with `main` as the idle loop, and borrows a couple of
//! helper stacks for tests that need more than one task.

#![no_std]

mod queues;
mod sync;
mod tasks;
mod timers;

use cortex_m_semihosting::{debug, hprintln};
use intros::exec;
use intros::task::{Stack, Task};
use intros::time::{self, Ticks};
use intros::timer::Timer;

static COORDINATOR_STACK: Stack<1024> = Stack::new();

pub(crate) static HELPER_A: Stack<256> = Stack::new();
pub(crate) static HELPER_B: Stack<256> = Stack::new();

pub fn run_test_suite(hz: u32) -> ! {
    // Check out peripherals from the runtime.
    let mut cp = cortex_m::Peripherals::take().unwrap();

    exec::init();
    time::initialize_sys_tick(&mut cp.SYST, hz);

    Task::new(&COORDINATOR_STACK, coordinator).start().unwrap();
    exec::run()
}

macro_rules! tests {
    ($($name:path,)*) => {
        $(
            cortex_m_semihosting::hprint!(concat!(stringify!($name), "... "));
            $name();
            cortex_m_semihosting::hprintln!("OK");
        )*
    };
}

fn coordinator() {
    // Best effort: this needs the timers to work in order to catch anything.
    // Tick time stands still during semihosting calls, so this is generous.
    let watchdog = Timer::new(Some(timed_out));
    watchdog.start_for(Ticks::from_millis(2000));

    tests! {
        tasks::test_yield,
        tasks::test_clock_advancing,
        tasks::test_sleep_until,
        tasks::test_sleep_next_keeps_phase,
        tasks::test_suspend_resume,
        tasks::test_resume_cuts_sleep_short,
        tasks::test_kill_and_join,
        tasks::test_join_for_times_out,
        tasks::test_restart_from,
        timers::test_one_shot_callback,
        timers::test_periodic_wait,
        timers::test_wait_for_times_out,
        timers::test_wait_on_stopped_timer,
        sync::test_semaphore_handoff,
        sync::test_semaphore_take_for_times_out,
        sync::test_mutex_excludes,
        sync::test_condvar,
        sync::test_rwlock_writer_waits_for_reader,
        sync::test_event,
        sync::test_flag_all,
        sync::test_signal,
        sync::test_barrier,
        queues::test_mailbox_producer_consumer,
        queues::test_event_queue_take_for_times_out,
        queues::test_job_queue_worker,
        queues::test_message_buffer,
        queues::test_stream_buffer,
        queues::test_pool_blocks_until_free,
    }

    watchdog.stop();
    hprintln!("tests complete.");
    debug::exit(debug::EXIT_SUCCESS);
    Task::stop()
}

fn timed_out() {
    panic!("tests timed out.");
}

///////////////////////////////////////////////////////////////////////////////
// Utility functions

/// Creates and starts a helper task on `stack`.
pub(crate) fn spawn(stack: &'static Stack<256>, entry: fn()) -> Task {
    let task = Task::new(stack, entry);
    task.start().unwrap();
    task
}

/// Waits for a helper task to finish and gives its stack back.
pub(crate) fn reap(task: Task) {
    task.join();
    task.delete();
}

/// Runs `body` in a helper task, waits for it, and cleans up.
pub(crate) fn in_helper(body: fn()) {
    let task = spawn(&HELPER_A, body);
    reap(task);
}
