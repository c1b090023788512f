use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use intros::exec;
use intros::task::Task;
use intros::time::{TickTime, Ticks};
use intros::{Error, State, Wakeup};

use crate::{reap, spawn, HELPER_A};

static FLAG: AtomicBool = AtomicBool::new(false);
static VALUE: AtomicU32 = AtomicU32::new(0);

/// A fresh task should get to run as soon as we yield.
pub fn test_yield() {
    FLAG.store(false, Ordering::SeqCst);
    let helper = spawn(&HELPER_A, || {
        FLAG.store(true, Ordering::SeqCst);
        Task::stop()
    });
    exec::yield_now();
    assert!(FLAG.load(Ordering::SeqCst), "helper didn't run");
    assert_eq!(helper.state(), State::Stopped);
    reap(helper);
}

pub fn test_clock_advancing() {
    let t1 = TickTime::now();
    assert_eq!(Task::sleep_for(Ticks(2)), Wakeup::Timeout);
    let t2 = TickTime::now();
    assert!(t2.ticks_since(t1) >= Ticks(2));
}

pub fn test_sleep_until() {
    let target = TickTime::now() + Ticks(10);
    Task::sleep_until(target);
    assert!(target.is_reached());
    // Main idles, so the scan comes around far more often than the tick.
    assert!(TickTime::now().ticks_since(target) <= Ticks(1));
}

pub fn test_sleep_next_keeps_phase() {
    Task::sleep_for(Ticks(1));
    let start = TickTime::now();
    for _ in 0..3 {
        Task::sleep_next(Ticks(3));
    }
    assert!(TickTime::now().ticks_since(start) <= Ticks(10));
}

pub fn test_suspend_resume() {
    VALUE.store(0, Ordering::SeqCst);
    let helper = spawn(&HELPER_A, || {
        if let Wakeup::Resumed(event) = Task::sleep() {
            VALUE.store(event, Ordering::SeqCst);
        }
        Task::stop()
    });
    exec::yield_now();
    assert_eq!(helper.state(), State::Suspended);
    // Nobody else can wake it.
    Task::sleep_for(Ticks(2));
    assert_eq!(helper.state(), State::Suspended);
    helper.resume(7).unwrap();
    reap(helper);
    assert_eq!(VALUE.load(Ordering::SeqCst), 7);
}

pub fn test_resume_cuts_sleep_short() {
    VALUE.store(0, Ordering::SeqCst);
    let helper = spawn(&HELPER_A, || {
        let value = match Task::sleep_for(Ticks(1000)) {
            Wakeup::Resumed(event) => event,
            Wakeup::Timeout => u32::MAX,
        };
        VALUE.store(value, Ordering::SeqCst);
        Task::stop()
    });
    exec::yield_now();
    assert_eq!(helper.state(), State::Delayed);
    helper.resume(3).unwrap();
    assert_eq!(helper.join_for(Ticks(10)), Ok(()));
    helper.delete();
    assert_eq!(VALUE.load(Ordering::SeqCst), 3);
}

pub fn test_kill_and_join() {
    VALUE.store(0, Ordering::SeqCst);
    // Returns and gets called again, forever.
    let helper = spawn(&HELPER_A, || {
        VALUE.fetch_add(1, Ordering::SeqCst);
        exec::yield_now();
    });
    exec::yield_now();
    exec::yield_now();
    assert!(VALUE.load(Ordering::SeqCst) >= 2, "entry not re-entered");
    helper.kill();
    assert_eq!(helper.state(), State::Stopped);
    let count = VALUE.load(Ordering::SeqCst);
    exec::yield_now();
    assert_eq!(VALUE.load(Ordering::SeqCst), count);
    reap(helper);
}

pub fn test_join_for_times_out() {
    let helper = spawn(&HELPER_A, || {
        Task::sleep_for(Ticks(1000));
    });
    assert_eq!(helper.join_for(Ticks(3)), Err(Error::Timeout));
    helper.kill();
    reap(helper);
}

pub fn test_restart_from() {
    VALUE.store(0, Ordering::SeqCst);
    let helper = spawn(&HELPER_A, || {
        VALUE.store(1, Ordering::SeqCst);
        Task::stop()
    });
    helper.join();
    assert_eq!(helper.start(), Ok(()));
    assert_eq!(helper.start(), Err(Error::Failure));
    helper.join();
    helper
        .start_from(|| {
            VALUE.store(2, Ordering::SeqCst);
            Task::flip(|| {
                VALUE.fetch_add(10, Ordering::SeqCst);
                Task::stop()
            })
        })
        .unwrap();
    reap(helper);
    assert_eq!(VALUE.load(Ordering::SeqCst), 12);
}
