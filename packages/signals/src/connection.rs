use std::cell::Cell;
use std::fmt;
use std::rc::Weak;

use crate::signal::SignalCore;
use crate::{Error, Result};

/// One callback's subscription to a [`Signal`][crate::Signal].
///
/// Returned by [`Signal::connect()`][crate::Signal::connect] and its variants. The handle does
/// not keep the signal alive and dropping it does not disconnect the callback.
///
/// # Example
///
/// ```
/// use signals::{Error, Signal};
///
/// let signal = Signal::<()>::new();
/// let connection = signal.connect(|()| println!("fired")).unwrap();
///
/// connection.disconnect();
/// assert!(!connection.is_connected());
///
/// assert_eq!(connection.reconnect(), Ok(true));
/// assert_eq!(connection.reconnect(), Err(Error::AlreadyConnected));
/// ```
pub struct Connection<A> {
    signal: Weak<SignalCore<A>>,

    /// The pool slot holding the connection's record.
    index: usize,

    /// The sequence stamp of the current (re)insertion. A reconnect assigns a new one.
    sequence: Cell<u64>,

    priority: i32,
    once: bool,
}

impl<A> Connection<A> {
    pub(crate) fn new(
        signal: Weak<SignalCore<A>>,
        index: usize,
        sequence: u64,
        priority: i32,
        once: bool,
    ) -> Self {
        Self {
            signal,
            index,
            sequence: Cell::new(sequence),
            priority,
            once,
        }
    }

    /// Whether the callback is currently eligible to be invoked by a fire.
    ///
    /// This turns `false` after [`disconnect()`][Self::disconnect], after a one-shot connection
    /// has been invoked and after the signal is destroyed or dropped.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.signal
            .upgrade()
            .is_some_and(|core| core.is_live(self.index, self.sequence.get()))
    }

    /// The priority the connection was created with.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether this is a one-shot connection created by [`Signal::once()`][crate::Signal::once].
    #[must_use]
    pub fn is_once(&self) -> bool {
        self.once
    }

    #[cfg(test)]
    pub(crate) fn slot(&self) -> usize {
        self.index
    }

    /// Stops the callback from being invoked by any future fire.
    ///
    /// If a fire is in progress and has not reached this callback yet, the callback is skipped.
    /// Disconnecting a connection that is not connected (including after the signal has been
    /// destroyed) does nothing.
    pub fn disconnect(&self) {
        if let Some(core) = self.signal.upgrade() {
            core.detach(self.index, self.sequence.get());
        }
    }

    /// Connects a disconnected callback again, with its original priority.
    ///
    /// The connection is ordered after every currently connected callback of the same priority.
    /// If a fire is in progress, the reconnected callback is first invoked by the next fire.
    ///
    /// Reconnecting is only possible until another connection takes over the pool slot this
    /// connection gave up when it was disconnected.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyConnected`] if the connection is connected.
    /// * [`Error::DestroyedSignal`] if the signal has been destroyed or dropped.
    /// * [`Error::MissingCallback`] if the slot has been reused and the callback is gone.
    pub fn reconnect(&self) -> Result<bool> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let core = self.signal.upgrade().ok_or(Error::DestroyedSignal)?;

        let sequence = core.reattach(self.index, self.sequence.get())?;
        self.sequence.set(sequence);

        Ok(true)
    }
}

impl<A> fmt::Debug for Connection<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("index", &self.index)
            .field("sequence", &self.sequence.get())
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::Signal;

    assert_not_impl_any!(Connection<u32>: Send, Sync);

    #[test]
    fn disconnect_is_idempotent() {
        let signal = Signal::<()>::new();
        let connection = signal.connect(|()| {}).unwrap();

        assert!(connection.is_connected());

        connection.disconnect();
        connection.disconnect();

        assert!(!connection.is_connected());
        assert_eq!(signal.connection_count(), 0);
    }

    #[test]
    fn dropping_handle_keeps_callback_connected() {
        let signal = Signal::<()>::new();
        let calls = Rc::new(Cell::new(0));

        drop(
            signal
                .connect({
                    let calls = Rc::clone(&calls);
                    move |()| calls.set(calls.get() + 1)
                })
                .unwrap(),
        );

        signal.fire(());
        assert_eq!(calls.get(), 1);
        assert_eq!(signal.connection_count(), 1);
    }

    #[test]
    fn reconnect_restores_callback() {
        let signal = Signal::<()>::new();
        let calls = Rc::new(Cell::new(0));

        let connection = signal
            .connect({
                let calls = Rc::clone(&calls);
                move |()| calls.set(calls.get() + 1)
            })
            .unwrap();

        connection.disconnect();
        signal.fire(());
        assert_eq!(calls.get(), 0);

        assert_eq!(connection.reconnect(), Ok(true));
        assert!(connection.is_connected());

        signal.fire(());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn reconnect_when_connected_fails() {
        let signal = Signal::<()>::new();
        let connection = signal.connect(|()| {}).unwrap();

        assert_eq!(connection.reconnect(), Err(Error::AlreadyConnected));
    }

    #[test]
    fn reconnect_after_slot_reuse_fails() {
        let signal = Signal::<()>::new();
        let connection = signal.connect(|()| {}).unwrap();
        connection.disconnect();

        let _other = signal.connect(|()| {}).unwrap();

        assert_eq!(connection.reconnect(), Err(Error::MissingCallback));
        assert!(!connection.is_connected());
        assert_eq!(signal.connection_count(), 1);
    }

    #[test]
    fn reconnect_after_destroy_fails() {
        let signal = Signal::<()>::new();
        let connection = signal.connect(|()| {}).unwrap();
        connection.disconnect();

        signal.destroy();

        assert_eq!(connection.reconnect(), Err(Error::DestroyedSignal));
    }

    #[test]
    fn reconnect_after_signal_dropped_fails() {
        let signal = Signal::<()>::new();
        let connection = signal.connect(|()| {}).unwrap();

        drop(signal);

        assert!(!connection.is_connected());
        connection.disconnect();
        assert_eq!(connection.reconnect(), Err(Error::DestroyedSignal));
    }

    #[test]
    fn accessors_report_creation_parameters() {
        let signal = Signal::<()>::new();

        let plain = signal.connect(|()| {}).unwrap();
        assert_eq!(plain.priority(), 0);
        assert!(!plain.is_once());

        let once = signal.once_with_priority(-4, |()| {}).unwrap();
        assert_eq!(once.priority(), -4);
        assert!(once.is_once());
    }

    #[test]
    fn debug_output_mentions_state() {
        let signal = Signal::<()>::new();
        let connection = signal.connect_with_priority(3, |()| {}).unwrap();

        let debug = format!("{connection:?}");
        assert!(debug.contains("priority: 3"));
        assert!(debug.contains("connected: true"));
    }
}
