use core::sync::atomic::{AtomicU32, Ordering};

use intros::time::Ticks;
use intros::timer::Timer;
use intros::Error;

static FIRED: AtomicU32 = AtomicU32::new(0);

fn bump() {
    assert!(Timer::current().is_some());
    FIRED.fetch_add(1, Ordering::SeqCst);
}

pub fn test_one_shot_callback() {
    FIRED.store(0, Ordering::SeqCst);
    let timer = Timer::new(Some(bump));
    timer.start_for(Ticks(3));
    assert!(timer.is_running());
    assert_eq!(timer.take(), Err(Error::Failure));
    timer.wait();
    assert_eq!(FIRED.load(Ordering::SeqCst), 1);
    assert!(!timer.is_running());
    assert_eq!(timer.take(), Ok(()));
    timer.delete();
}

pub fn test_periodic_wait() {
    FIRED.store(0, Ordering::SeqCst);
    let timer = Timer::new(Some(bump));
    timer.start_periodic(Ticks(2));
    for _ in 0..3 {
        timer.wait();
    }
    assert!(FIRED.load(Ordering::SeqCst) >= 3);
    assert!(timer.is_running());
    timer.stop();
    timer.delete();
}

pub fn test_wait_for_times_out() {
    let timer = Timer::new(None);
    timer.start_for(Ticks(50));
    assert_eq!(timer.wait_for(Ticks(2)), Err(Error::Timeout));
    timer.stop();
    assert_eq!(timer.wait_for(Ticks(2)), Ok(()));
    timer.delete();
}

pub fn test_wait_on_stopped_timer() {
    let timer = Timer::new(None);
    // Never started: returns at once.
    timer.wait();
    timer.delete();
}
