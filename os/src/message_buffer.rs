// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Buffers of variable-length messages.
//!
//! A `MessageBuffer<N>` stores whole messages of any length in `N` bytes of
//! ring storage. Each message costs its own length plus a four-byte header,
//! so the buffer holds fewer messages than bytes.
//!
//! Messages come out exactly as they went in: a reader never sees half a
//! message, and [`MessageBuffer::push`] evicts whole messages from the front
//! to make room.

use crate::exec;
use crate::ring::Ring;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::{Error, Result};

/// Bytes of header in front of every message.
const HEADER: usize = core::mem::size_of::<u32>();

/// A FIFO queue of byte messages packed into `N` bytes.
#[derive(Debug)]
pub struct MessageBuffer<const N: usize> {
    ring: Shared<Ring<u8, N>>,
}

impl<const N: usize> MessageBuffer<N> {
    /// Creates an empty buffer.
    ///
    /// # Panics
    ///
    /// If `N` is too small to hold even an empty message.
    pub const fn new() -> Self {
        cheap_assert!(N >= HEADER);
        Self { ring: Shared::new(Ring::new()) }
    }

    /// Copies the oldest message into `out` and removes it, returning its
    /// length.
    ///
    /// Fails if the buffer is empty, or if `out` is too short for the message,
    /// in which case the message stays put.
    pub fn try_take(&self, out: &mut [u8]) -> Result<usize> {
        self.ring.with(|r| {
            let len = next_len(r).ok_or(Error::Failure)?;
            if out.len() < len {
                return Err(Error::Failure);
            }
            r.skip(HEADER);
            r.get_slice(&mut out[..len]);
            Ok(len)
        })
    }

    /// Takes the oldest message, blocking while the buffer is empty or `out`
    /// can't hold it.
    pub fn take(&self, out: &mut [u8]) -> usize {
        exec::until(|| self.try_take(out))
    }

    /// Like [`MessageBuffer::take`], giving up after `timeout`.
    pub fn take_for(&self, out: &mut [u8], timeout: Ticks) -> Result<usize> {
        exec::until_timeout(timeout, || self.try_take(out))
    }

    /// Appends `msg` if all of it fits.
    pub fn try_give(&self, msg: &[u8]) -> Result<()> {
        self.ring.with(|r| {
            if r.space() < HEADER + msg.len() {
                return Err(Error::Failure);
            }
            put_message(r, msg);
            Ok(())
        })
    }

    /// Appends `msg`, blocking until there's room for all of it.
    pub fn give(&self, msg: &[u8]) {
        exec::until(|| self.try_give(msg))
    }

    /// Like [`MessageBuffer::give`], giving up after `timeout`.
    pub fn give_for(&self, msg: &[u8], timeout: Ticks) -> Result<()> {
        exec::until_timeout(timeout, || self.try_give(msg))
    }

    /// Appends `msg`, discarding the oldest messages until it fits.
    ///
    /// # Panics
    ///
    /// If `msg` wouldn't fit even in an empty buffer.
    pub fn push(&self, msg: &[u8]) {
        cheap_assert!(HEADER + msg.len() <= N);
        self.ring.with(|r| {
            while r.space() < HEADER + msg.len() {
                match next_len(r) {
                    Some(len) => r.skip(HEADER + len),
                    None => panic!(),
                }
            }
            put_message(r, msg);
        });
    }

    /// Length of the oldest message, if there is one.
    pub fn next_len(&self) -> Option<usize> {
        self.ring.with(|r| next_len(r))
    }

    /// Bytes in use, headers included.
    pub fn count(&self) -> usize {
        self.ring.with(|r| r.count())
    }

    /// Bytes free. A message fits if its length plus four does.
    pub fn space(&self) -> usize {
        self.ring.with(|r| r.space())
    }

    /// Capacity in bytes.
    pub const fn limit(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for MessageBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn next_len<const N: usize>(r: &Ring<u8, N>) -> Option<usize> {
    if r.is_empty() {
        return None;
    }
    let mut header = [0; HEADER];
    for (i, b) in header.iter_mut().enumerate() {
        *b = r.peek(i);
    }
    Some(u32::from_le_bytes(header) as usize)
}

fn put_message<const N: usize>(r: &mut Ring<u8, N>, msg: &[u8]) {
    // Any message that fits the ring fits a u32 length.
    r.put_slice(&(msg.len() as u32).to_le_bytes());
    r.put_slice(msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_their_boundaries() {
        let mb: MessageBuffer<16> = MessageBuffer::new();
        mb.try_give(b"abc").unwrap();
        mb.try_give(b"").unwrap();
        mb.try_give(b"z").unwrap();
        assert_eq!(mb.count(), 16);
        assert_eq!(mb.try_give(b""), Err(Error::Failure));

        let mut out = [0; 8];
        assert_eq!(mb.next_len(), Some(3));
        assert_eq!(mb.try_take(&mut out), Ok(3));
        assert_eq!(&out[..3], b"abc");
        assert_eq!(mb.try_take(&mut out), Ok(0));
        assert_eq!(mb.take(&mut out), 1);
        assert_eq!(out[0], b'z');
        assert_eq!(mb.try_take(&mut out), Err(Error::Failure));
    }

    #[test]
    fn short_output_leaves_message() {
        let mb: MessageBuffer<16> = MessageBuffer::new();
        mb.give(b"hello");
        let mut small = [0; 4];
        assert_eq!(mb.try_take(&mut small), Err(Error::Failure));
        assert_eq!(mb.count(), 9);
        let mut big = [0; 5];
        assert_eq!(mb.try_take(&mut big), Ok(5));
        assert_eq!(&big, b"hello");
    }

    #[test]
    fn too_big_message_is_refused_whole() {
        let mb: MessageBuffer<10> = MessageBuffer::new();
        mb.try_give(b"ab").unwrap();
        assert_eq!(mb.try_give(b"cd"), Err(Error::Failure));
        assert_eq!(mb.count(), 6);
    }

    #[test]
    fn push_skips_whole_records_across_wraparound() {
        let mb: MessageBuffer<12> = MessageBuffer::new();
        mb.push(b"ab");
        mb.push(b"cd");
        // Needs 7 bytes; only 0 free, so both old messages go.
        mb.push(b"efg");
        assert_eq!(mb.count(), 7);
        mb.push(b"h");
        // 5 free, "h" needed 5: "efg" survives.
        let mut out = [0; 4];
        assert_eq!(mb.try_take(&mut out), Ok(3));
        assert_eq!(&out[..3], b"efg");
        assert_eq!(mb.try_take(&mut out), Ok(1));
        assert_eq!(out[0], b'h');
        assert_eq!(mb.count(), 0);
    }

    #[test]
    #[should_panic]
    fn push_of_oversized_message_panics() {
        let mb: MessageBuffer<8> = MessageBuffer::new();
        mb.push(b"12345");
    }
}
