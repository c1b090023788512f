// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error type shared by every fallible kernel operation.

use core::fmt;

/// Reasons a kernel operation can fail without it being a programming error.
///
/// Programming errors (releasing a lock you don't hold, deleting a running
/// task, and the like) are assertions, not `Error`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation could not be completed right now: the queue was empty or
    /// full, the lock was held, the caller was not the owner, or the object was
    /// in the wrong state.
    Failure,
    /// A bounded wait ran out of time before the operation could complete.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failure => write!(f, "operation failed"),
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

/// Result type used throughout the kernel.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn display() {
        assert_eq!(Error::Failure.to_string(), "operation failed");
        assert_eq!(Error::Timeout.to_string(), "operation timed out");
    }
}
