// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte streams.
//!
//! A `StreamBuffer<N>` is a pipe of up to `N` bytes with no message
//! boundaries. Writers put in whole slices or nothing; readers get whatever
//! is there, up to the size of their buffer.

use crate::exec;
use crate::ring::Ring;
use crate::sync::Shared;
use crate::time::Ticks;
use crate::{Error, Result};

/// A byte FIFO of capacity `N`.
#[derive(Debug)]
pub struct StreamBuffer<const N: usize> {
    ring: Shared<Ring<u8, N>>,
}

impl<const N: usize> StreamBuffer<N> {
    /// Creates an empty stream.
    pub const fn new() -> Self {
        Self { ring: Shared::new(Ring::new()) }
    }

    /// Moves as many bytes as are available, up to `out.len()`, into `out`,
    /// and returns how many.
    ///
    /// Fails if the stream is empty or `out` is.
    pub fn try_take(&self, out: &mut [u8]) -> Result<usize> {
        self.ring.with(|r| {
            let n = usize::min(out.len(), r.count());
            if n == 0 {
                return Err(Error::Failure);
            }
            r.get_slice(&mut out[..n]);
            Ok(n)
        })
    }

    /// Like [`StreamBuffer::try_take`], blocking while the stream is empty.
    pub fn take(&self, out: &mut [u8]) -> usize {
        exec::until(|| self.try_take(out))
    }

    /// Like [`StreamBuffer::take`], giving up after `timeout`.
    pub fn take_for(&self, out: &mut [u8], timeout: Ticks) -> Result<usize> {
        exec::until_timeout(timeout, || self.try_take(out))
    }

    /// Appends all of `data` if it fits.
    pub fn try_give(&self, data: &[u8]) -> Result<()> {
        self.ring.with(|r| {
            if r.space() < data.len() {
                return Err(Error::Failure);
            }
            r.put_slice(data);
            Ok(())
        })
    }

    /// Appends all of `data`, blocking until there's room.
    ///
    /// `data` longer than the stream's capacity never fits; use
    /// [`StreamBuffer::push`] or split it.
    pub fn give(&self, data: &[u8]) {
        exec::until(|| self.try_give(data))
    }

    /// Like [`StreamBuffer::give`], giving up after `timeout`.
    pub fn give_for(&self, data: &[u8], timeout: Ticks) -> Result<()> {
        exec::until_timeout(timeout, || self.try_give(data))
    }

    /// Appends `data`, discarding the oldest bytes to make room.
    ///
    /// # Panics
    ///
    /// If `data` is longer than the stream's capacity.
    pub fn push(&self, data: &[u8]) {
        cheap_assert!(data.len() <= N);
        self.ring.with(|r| {
            r.evict_for(data.len());
            r.put_slice(data);
        });
    }

    /// Bytes waiting to be read.
    pub fn count(&self) -> usize {
        self.ring.with(|r| r.count())
    }

    /// Bytes that can be written before the stream is full.
    pub fn space(&self) -> usize {
        self.ring.with(|r| r.space())
    }

    /// Capacity in bytes.
    pub const fn limit(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for StreamBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_partial() {
        let sb: StreamBuffer<8> = StreamBuffer::new();
        sb.try_give(b"hello").unwrap();
        let mut out = [0; 3];
        assert_eq!(sb.try_take(&mut out), Ok(3));
        assert_eq!(&out, b"hel");
        assert_eq!(sb.take(&mut out), 2);
        assert_eq!(&out[..2], b"lo");
        assert_eq!(sb.try_take(&mut out), Err(Error::Failure));
    }

    #[test]
    fn writes_are_all_or_nothing() {
        let sb: StreamBuffer<4> = StreamBuffer::new();
        sb.give(b"abc");
        assert_eq!(sb.try_give(b"de"), Err(Error::Failure));
        assert_eq!(sb.count(), 3);
        sb.try_give(b"d").unwrap();
        assert_eq!(sb.space(), 0);
    }

    #[test]
    fn empty_output_fails() {
        let sb: StreamBuffer<4> = StreamBuffer::new();
        sb.try_give(b"x").unwrap();
        assert_eq!(sb.try_take(&mut []), Err(Error::Failure));
    }

    #[test]
    fn push_evicts_oldest_bytes() {
        let sb: StreamBuffer<4> = StreamBuffer::new();
        sb.push(b"abc");
        sb.push(b"def");
        let mut out = [0; 4];
        assert_eq!(sb.try_take(&mut out), Ok(4));
        assert_eq!(&out, b"cdef");
    }
}
