use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::Result;
use crate::signal::SignalCore;
use crate::waiters::{Ticket, WaiterCell};

/// A `Future` that resolves with the arguments of the next fire of a
/// [`Signal`][crate::Signal].
///
/// Returned by [`Signal::wait()`][crate::Signal::wait]. Resolves to
/// [`Error::DestroyedSignal`][crate::Error::DestroyedSignal] if the signal is destroyed or
/// dropped before it fires. Dropping the future before it resolves cancels the wait and frees
/// its place in the signal's waiter queue.
///
/// # Panics
///
/// Polling the future again after it has returned `Poll::Ready` panics.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Wait<A> {
    cell: Rc<WaiterCell<A>>,
    ticket: Ticket,
    signal: Weak<SignalCore<A>>,
}

impl<A> Wait<A> {
    pub(crate) fn new(cell: Rc<WaiterCell<A>>, ticket: Ticket, signal: Weak<SignalCore<A>>) -> Self {
        Self {
            cell,
            ticket,
            signal,
        }
    }

    /// Whether the wait has been resolved, meaning the next poll returns `Poll::Ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.cell.is_pending()
    }
}

impl<A> Future for Wait<A> {
    type Output = Result<A>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cell.poll(cx.waker())
    }
}

impl<A> Drop for Wait<A> {
    fn drop(&mut self) {
        // A resolved waiter has already left the queue; only a pending one holds a slot.
        if !self.cell.cancel() {
            return;
        }

        if let Some(core) = self.signal.upgrade() {
            core.cancel_waiter(self.ticket);
        }
    }
}

impl<A> fmt::Debug for Wait<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wait")
            .field("cell", &self.cell)
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::pin::pin;

    use futures::executor::block_on;
    use futures::task::noop_waker_ref;
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{Error, Signal};

    assert_not_impl_any!(Wait<u32>: Send, Sync);

    #[test]
    fn resolves_with_next_fire() {
        let signal = Signal::<u32>::new();
        let wait = signal.wait().unwrap();

        assert!(!wait.is_ready());
        signal.fire(9);
        assert!(wait.is_ready());

        assert_eq!(block_on(wait), Ok(9));
        assert_eq!(signal.waiter_count(), 0);
    }

    #[test]
    fn pending_until_fired() {
        let signal = Signal::<u32>::new();
        let mut wait = pin!(signal.wait().unwrap());

        let mut cx = Context::from_waker(noop_waker_ref());

        assert!(wait.as_mut().poll(&mut cx).is_pending());
        assert!(wait.as_mut().poll(&mut cx).is_pending());

        signal.fire(1);

        assert_eq!(wait.as_mut().poll(&mut cx), Poll::Ready(Ok(1)));
    }

    #[test]
    fn dropping_unresolved_wait_frees_slot() {
        let signal = Signal::<()>::new();

        let wait = signal.wait().unwrap();
        assert_eq!(signal.waiter_count(), 1);

        drop(wait);
        assert_eq!(signal.waiter_count(), 0);
    }

    #[test]
    fn dropping_resolved_wait_is_harmless() {
        let signal = Signal::<()>::new();

        let wait = signal.wait().unwrap();
        let later = signal.wait().unwrap();

        signal.fire(());
        drop(wait);

        assert_eq!(block_on(later), Ok(()));
    }

    #[test]
    fn signal_dropped_resolves_with_error() {
        let signal = Signal::<()>::new();
        let wait = signal.wait().unwrap();

        drop(signal);

        assert_eq!(block_on(wait), Err(Error::DestroyedSignal));
    }

    #[test]
    fn dropping_wait_after_signal_is_gone() {
        let signal = Signal::<()>::new();
        let wait = signal.wait().unwrap();

        signal.destroy();
        drop(signal);

        assert!(wait.is_ready());
        drop(wait);
    }
}
