use thiserror::Error;

/// Errors reported by [`Signal`][crate::Signal] and [`Connection`][crate::Connection] operations.
///
/// Every error is reported synchronously by the call that violated the precondition. Nothing
/// is retried internally. [`Signal::fire()`][crate::Signal::fire] and
/// [`Connection::disconnect()`][crate::Connection::disconnect] never fail.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The signal has been destroyed (or every handle to it has been dropped),
    /// so it no longer accepts connections or waiters.
    #[error("the signal has been destroyed")]
    DestroyedSignal,

    /// The signal already holds the maximum number of live connections.
    #[error("the signal already has the maximum of {capacity} live connections")]
    CapacityExceeded {
        /// The connection capacity the signal was built with.
        capacity: usize,
    },

    /// The signal already holds the maximum number of pending waiters.
    #[error("the signal already has the maximum of {capacity} pending waiters")]
    WaiterCapacityExceeded {
        /// The waiter capacity the signal was built with.
        capacity: usize,
    },

    /// The connection is still connected, so it cannot be reconnected.
    #[error("the connection is already connected")]
    AlreadyConnected,

    /// The connection's slot has been reused by another connection since it was
    /// disconnected, so its callback is gone and it cannot be reconnected.
    #[error("the connection's callback is no longer available")]
    MissingCallback,
}

/// A specialized `Result` type for signal operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug, Clone, std::error::Error);

    #[test]
    fn capacity_errors_mention_capacity() {
        let message = Error::CapacityExceeded { capacity: 512 }.to_string();
        assert!(message.contains("512"));

        let message = Error::WaiterCapacityExceeded { capacity: 7 }.to_string();
        assert!(message.contains('7'));
    }

    #[test]
    fn display_is_not_empty() {
        for error in [
            Error::DestroyedSignal,
            Error::AlreadyConnected,
            Error::MissingCallback,
        ] {
            assert!(!error.to_string().is_empty());
        }
    }
}
