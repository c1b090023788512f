use core::sync::atomic::{AtomicU32, Ordering};

use intros::exec;
use intros::job_queue::JobQueue;
use intros::mailbox::{EventQueue, Mailbox};
use intros::message_buffer::MessageBuffer;
use intros::pool::MemoryPool;
use intros::stream_buffer::StreamBuffer;
use intros::task::Task;
use intros::time::Ticks;
use intros::Error;

use crate::{in_helper, reap, spawn, HELPER_A};

static MAILBOX: Mailbox<[u8; 4], 2> = Mailbox::new();

pub fn test_mailbox_producer_consumer() {
    // More records than fit, so the producer has to block.
    let helper = spawn(&HELPER_A, || {
        for i in 0..5 {
            MAILBOX.give([i; 4]);
        }
        Task::stop()
    });
    for i in 0..5 {
        assert_eq!(MAILBOX.take(), [i; 4]);
    }
    reap(helper);
    assert_eq!(MAILBOX.count(), 0);
}

static EVENTS: EventQueue<4> = EventQueue::new();

pub fn test_event_queue_take_for_times_out() {
    assert_eq!(EVENTS.take_for(Ticks(2)), Err(Error::Timeout));
    EVENTS.give(9);
    assert_eq!(EVENTS.take_for(Ticks(2)), Ok(9));
}

static JOBS: JobQueue<2> = JobQueue::new();
static RAN: AtomicU32 = AtomicU32::new(0);

pub fn test_job_queue_worker() {
    RAN.store(0, Ordering::SeqCst);
    JOBS.give(|| {
        RAN.fetch_add(1, Ordering::SeqCst);
    });
    JOBS.give(|| {
        RAN.fetch_add(10, Ordering::SeqCst);
    });
    in_helper(|| {
        while JOBS.take_for(Ticks(1)).is_ok() {}
        Task::stop()
    });
    assert_eq!(RAN.load(Ordering::SeqCst), 11);
}

static MESSAGES: MessageBuffer<16> = MessageBuffer::new();

pub fn test_message_buffer() {
    let helper = spawn(&HELPER_A, || {
        MESSAGES.give(b"hello");
        MESSAGES.give(b"");
        // Doesn't fit until "hello" is gone.
        MESSAGES.give(b"world!");
        Task::stop()
    });
    let mut buf = [0; 8];
    let n = MESSAGES.take(&mut buf);
    assert_eq!(&buf[..n], b"hello");
    assert_eq!(MESSAGES.take(&mut buf), 0);
    let n = MESSAGES.take(&mut buf);
    assert_eq!(&buf[..n], b"world!");
    reap(helper);
}

static STREAM: StreamBuffer<8> = StreamBuffer::new();

pub fn test_stream_buffer() {
    let helper = spawn(&HELPER_A, || {
        STREAM.give(b"hello ");
        STREAM.give(b"world");
        Task::stop()
    });
    let mut got = [0; 11];
    let mut n = 0;
    while n < got.len() {
        n += STREAM.take(&mut got[n..]);
    }
    assert_eq!(&got, b"hello world");
    reap(helper);
}

static POOL: MemoryPool<u32, 2> = MemoryPool::new();

pub fn test_pool_blocks_until_free() {
    let mine = POOL.take(1);
    let helper = spawn(&HELPER_A, || {
        let block = POOL.take(2);
        Task::sleep_for(Ticks(3));
        drop(block);
        Task::stop()
    });
    exec::yield_now();
    assert_eq!(POOL.count(), 0);
    assert!(POOL.try_take(3).is_err());
    let third = POOL.take(3);
    assert_eq!((*mine, *third), (1, 3));
    drop(mine);
    drop(third);
    reap(helper);
    assert_eq!(POOL.count(), 2);
}
