use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use intros::barrier::Barrier;
use intros::condvar::Condvar;
use intros::event::Event;
use intros::exec;
use intros::flag::{Flag, Mode};
use intros::mutex::Mutex;
use intros::rwlock::RwLock;
use intros::semaphore::Semaphore;
use intros::signal::Signal;
use intros::task::Task;
use intros::time::Ticks;
use intros::Error;

use crate::{reap, spawn, HELPER_A, HELPER_B};

static DONE: AtomicBool = AtomicBool::new(false);
static VALUE: AtomicU32 = AtomicU32::new(0);

static SEM: Semaphore = Semaphore::binary(0);

pub fn test_semaphore_handoff() {
    let helper = spawn(&HELPER_A, || {
        Task::sleep_for(Ticks(2));
        SEM.give();
        Task::stop()
    });
    SEM.take();
    assert_eq!(SEM.count(), 0);
    reap(helper);
}

pub fn test_semaphore_take_for_times_out() {
    assert_eq!(SEM.take_for(Ticks(2)), Err(Error::Timeout));
}

static MUTEX: Mutex = Mutex::new();

fn increment_slowly() {
    MUTEX.perform(|| {
        let v = VALUE.load(Ordering::SeqCst);
        // Give the other incrementer every chance to barge in.
        exec::yield_now();
        exec::yield_now();
        VALUE.store(v + 1, Ordering::SeqCst);
    });
    Task::stop()
}

pub fn test_mutex_excludes() {
    VALUE.store(0, Ordering::SeqCst);
    let a = spawn(&HELPER_A, increment_slowly);
    let b = spawn(&HELPER_B, increment_slowly);
    reap(a);
    reap(b);
    assert_eq!(VALUE.load(Ordering::SeqCst), 2);
    assert!(!MUTEX.is_locked());
}

static CONDVAR: Condvar = Condvar::new();

pub fn test_condvar() {
    DONE.store(false, Ordering::SeqCst);
    MUTEX.take();
    let helper = spawn(&HELPER_A, || {
        MUTEX.take();
        DONE.store(true, Ordering::SeqCst);
        CONDVAR.give();
        MUTEX.give().unwrap();
        Task::stop()
    });
    while !DONE.load(Ordering::SeqCst) {
        CONDVAR.wait(&MUTEX);
    }
    assert_eq!(MUTEX.owner(), Some(Task::current()));
    MUTEX.give().unwrap();
    reap(helper);
}

static RWLOCK: RwLock = RwLock::new();

pub fn test_rwlock_writer_waits_for_reader() {
    DONE.store(false, Ordering::SeqCst);
    RWLOCK.read();
    let helper = spawn(&HELPER_A, || {
        RWLOCK.write();
        DONE.store(true, Ordering::SeqCst);
        RWLOCK.end_write();
        Task::stop()
    });
    exec::yield_now();
    exec::yield_now();
    assert!(!DONE.load(Ordering::SeqCst), "writer got in past a reader");
    // More readers are fine.
    assert_eq!(RWLOCK.try_read(), Ok(()));
    assert_eq!(RWLOCK.readers(), 2);
    RWLOCK.end_read();
    RWLOCK.end_read();
    reap(helper);
    assert!(DONE.load(Ordering::SeqCst));
    assert!(!RWLOCK.is_writing());
}

static EVENT: Event = Event::new();

pub fn test_event() {
    VALUE.store(0, Ordering::SeqCst);
    let helper = spawn(&HELPER_A, || {
        VALUE.store(EVENT.wait(), Ordering::SeqCst);
        Task::stop()
    });
    exec::yield_now();
    EVENT.give(42);
    reap(helper);
    assert_eq!(VALUE.load(Ordering::SeqCst), 42);
    assert_eq!(EVENT.wait_for(Ticks(2)), Err(Error::Timeout));
}

static FLAG: Flag = Flag::new(0);

pub fn test_flag_all() {
    VALUE.store(0, Ordering::SeqCst);
    let helper = spawn(&HELPER_A, || {
        VALUE.store(FLAG.take(0b11, Mode::All), Ordering::SeqCst);
        Task::stop()
    });
    FLAG.give(0b01);
    exec::yield_now();
    exec::yield_now();
    assert_eq!(VALUE.load(Ordering::SeqCst), 0, "woke on half the bits");
    FLAG.give(0b10);
    reap(helper);
    assert_eq!(VALUE.load(Ordering::SeqCst) & 0b11, 0b11);
    FLAG.clear(u32::MAX);
}

static SIGNAL: Signal = Signal::new(0);

pub fn test_signal() {
    VALUE.store(u32::MAX, Ordering::SeqCst);
    let helper = spawn(&HELPER_A, || {
        VALUE.store(SIGNAL.take(1 << 3), Ordering::SeqCst);
        Task::stop()
    });
    SIGNAL.give(5);
    exec::yield_now();
    exec::yield_now();
    assert_eq!(VALUE.load(Ordering::SeqCst), u32::MAX, "woke on wrong signal");
    SIGNAL.give(3);
    reap(helper);
    assert_eq!(VALUE.load(Ordering::SeqCst), 3);
    SIGNAL.clear(5);
}

static BARRIER: Barrier = Barrier::new(3);

fn wait_at_barrier() {
    if BARRIER.wait() {
        VALUE.fetch_add(1, Ordering::SeqCst);
    }
    Task::stop()
}

pub fn test_barrier() {
    VALUE.store(0, Ordering::SeqCst);
    let a = spawn(&HELPER_A, wait_at_barrier);
    let b = spawn(&HELPER_B, wait_at_barrier);
    exec::yield_now();
    assert_eq!(BARRIER.remaining(), 1);
    if BARRIER.wait() {
        VALUE.fetch_add(1, Ordering::SeqCst);
    }
    reap(a);
    reap(b);
    assert_eq!(VALUE.load(Ordering::SeqCst), 1, "one releaser per round");
    assert_eq!(BARRIER.remaining(), BARRIER.limit());
}
