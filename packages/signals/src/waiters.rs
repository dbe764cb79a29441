//! Bounded queue of callers suspended in [`Signal::wait()`][crate::Signal::wait].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::task::{Poll, Waker};

use crate::{Error, Result};

/// The shared state between one queued waiter and the [`Wait`][crate::Wait] future that
/// observes it. Resolved at most once.
pub(crate) struct WaiterCell<A> {
    state: RefCell<WaiterState<A>>,
}

enum WaiterState<A> {
    /// Nobody has resolved the waiter yet. Holds the waker of whoever most recently polled.
    Pending { waker: Option<Waker> },

    /// The waiter has been resolved but the result has not been picked up yet.
    Resolved(Result<A>),

    /// The result has been handed to the awaiting future.
    Consumed,

    /// The future was dropped before the waiter was resolved.
    Cancelled,
}

impl<A> WaiterCell<A> {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            state: RefCell::new(WaiterState::Pending { waker: None }),
        }
    }

    /// Stores the result and returns the waker that must be woken to deliver it.
    ///
    /// The waker is returned instead of woken here so the caller can wake it after it has
    /// released any borrow of the signal state. Resolving a waiter that is no longer pending
    /// does nothing.
    #[must_use]
    pub(crate) fn resolve(&self, result: Result<A>) -> Option<Waker> {
        let mut state = self.state.borrow_mut();

        let WaiterState::Pending { waker } = &mut *state else {
            return None;
        };

        let waker = waker.take();
        *state = WaiterState::Resolved(result);
        waker
    }

    pub(crate) fn poll(&self, waker: &Waker) -> Poll<Result<A>> {
        let mut state = self.state.borrow_mut();

        if let WaiterState::Pending { waker: awaiter } = &mut *state {
            if !matches!(awaiter, Some(existing) if existing.will_wake(waker)) {
                *awaiter = Some(waker.clone());
            }

            return Poll::Pending;
        }

        match mem::replace(&mut *state, WaiterState::Consumed) {
            WaiterState::Resolved(result) => Poll::Ready(result),
            WaiterState::Consumed => panic!("signal wait polled after completion"),
            WaiterState::Cancelled => unreachable!("cancelled waiter cannot be polled"),
            WaiterState::Pending { .. } => unreachable!("pending state was handled above"),
        }
    }

    /// Marks a still-pending waiter as cancelled. Returns `true` if the waiter was pending,
    /// meaning it still occupies a queue slot that should be released.
    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state.borrow_mut();

        if matches!(&*state, WaiterState::Pending { .. }) {
            *state = WaiterState::Cancelled;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub(crate) fn is_pending(&self) -> bool {
        matches!(&*self.state.borrow(), WaiterState::Pending { .. })
    }
}

impl<A> fmt::Debug for WaiterCell<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.try_borrow().as_deref() {
            Ok(WaiterState::Pending { .. }) => "pending",
            Ok(WaiterState::Resolved(_)) => "resolved",
            Ok(WaiterState::Consumed) => "consumed",
            Ok(WaiterState::Cancelled) => "cancelled",
            Err(_) => "<borrowed>",
        };

        f.debug_struct("WaiterCell").field("state", &state).finish()
    }
}

/// A waiter ticket, assigned in registration order. Used to tell apart waiters registered before
/// a fire started from those registered while it was dispatching.
pub(crate) type Ticket = u64;

struct Queued<A> {
    ticket: Ticket,
    cell: Rc<WaiterCell<A>>,
}

/// FIFO of pending waiters with a fixed capacity.
pub(crate) struct WaiterQueue<A> {
    entries: VecDeque<Queued<A>>,
    next_ticket: Ticket,
    capacity: usize,
}

impl<A> WaiterQueue<A> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "waiter queue must have non-zero capacity");

        Self {
            entries: VecDeque::new(),
            next_ticket: 0,
            capacity,
        }
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Adds a new pending waiter to the back of the queue.
    pub(crate) fn register(&mut self) -> Result<(Ticket, Rc<WaiterCell<A>>)> {
        if self.entries.len() >= self.capacity {
            // Waiters whose futures were dropped while we could not be reached stay queued
            // until here; sweep them before declaring the queue full.
            self.entries.retain(|queued| queued.cell.is_pending());

            if self.entries.len() >= self.capacity {
                return Err(Error::WaiterCapacityExceeded {
                    capacity: self.capacity,
                });
            }
        }

        let ticket = self.next_ticket;
        self.next_ticket = self
            .next_ticket
            .checked_add(1)
            .expect("waiter tickets cannot realistically be exhausted");

        let cell = Rc::new(WaiterCell::new());

        self.entries.push_back(Queued {
            ticket,
            cell: Rc::clone(&cell),
        });

        Ok((ticket, cell))
    }

    /// The ticket the next registered waiter will get. Every waiter registered so far has a
    /// ticket below this value.
    #[must_use]
    pub(crate) fn boundary(&self) -> Ticket {
        self.next_ticket
    }

    /// Removes and returns every waiter registered before `boundary`, in registration order.
    #[must_use]
    pub(crate) fn take_before(&mut self, boundary: Ticket) -> Vec<Rc<WaiterCell<A>>> {
        // Tickets increase from front to back, so the matching waiters form a prefix.
        let count = self
            .entries
            .iter()
            .take_while(|queued| queued.ticket < boundary)
            .count();

        self.entries.drain(..count).map(|queued| queued.cell).collect()
    }

    /// Removes and returns every waiter.
    #[must_use]
    pub(crate) fn take_all(&mut self) -> Vec<Rc<WaiterCell<A>>> {
        self.entries.drain(..).map(|queued| queued.cell).collect()
    }

    /// Removes the waiter with the given ticket, if it is still queued.
    pub(crate) fn remove(&mut self, ticket: Ticket) -> bool {
        // Binary search works because tickets are strictly increasing from front to back.
        match self
            .entries
            .binary_search_by_key(&ticket, |queued| queued.ticket)
        {
            Ok(position) => {
                self.entries.remove(position);
                true
            }
            Err(_) => false,
        }
    }
}

impl<A> fmt::Debug for WaiterQueue<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaiterQueue")
            .field("len", &self.entries.len())
            .field("next_ticket", &self.next_ticket)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;

    use futures::task::noop_waker_ref;

    use super::*;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn resolve_then_poll_yields_result() {
        let cell = WaiterCell::<u32>::new();

        assert!(cell.poll(noop_waker_ref()).is_pending());
        assert!(cell.resolve(Ok(5)).is_some());

        assert_eq!(cell.poll(noop_waker_ref()), Poll::Ready(Ok(5)));
    }

    #[test]
    fn resolve_before_poll_returns_no_waker() {
        let cell = WaiterCell::<u32>::new();

        assert!(cell.resolve(Ok(1)).is_none());
        assert_eq!(cell.poll(noop_waker_ref()), Poll::Ready(Ok(1)));
    }

    #[test]
    fn resolves_only_once() {
        let cell = WaiterCell::<u32>::new();

        drop(cell.resolve(Ok(1)));
        assert!(cell.resolve(Ok(2)).is_none());
        assert!(!cell.is_pending());

        assert_eq!(cell.poll(noop_waker_ref()), Poll::Ready(Ok(1)));
    }

    #[test]
    fn returned_waker_is_most_recent() {
        let first = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let second = Arc::new(CountingWaker(AtomicUsize::new(0)));

        let cell = WaiterCell::<()>::new();
        assert!(cell.poll(&Waker::from(Arc::clone(&first))).is_pending());
        assert!(cell.poll(&Waker::from(Arc::clone(&second))).is_pending());

        cell.resolve(Ok(())).unwrap().wake();

        assert_eq!(first.0.load(Ordering::Relaxed), 0);
        assert_eq!(second.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn cancel_only_affects_pending() {
        let cell = WaiterCell::<u32>::new();
        assert!(cell.cancel());
        assert!(!cell.cancel());
        assert!(cell.resolve(Ok(3)).is_none());

        let cell = WaiterCell::<u32>::new();
        drop(cell.resolve(Err(Error::DestroyedSignal)));
        assert!(!cell.cancel());
        assert_eq!(
            cell.poll(noop_waker_ref()),
            Poll::Ready(Err(Error::DestroyedSignal))
        );
    }

    #[test]
    #[should_panic]
    fn poll_after_completion_panics() {
        let cell = WaiterCell::<u32>::new();
        drop(cell.resolve(Ok(1)));
        let _ = cell.poll(noop_waker_ref());
        let _ = cell.poll(noop_waker_ref());
    }

    #[test]
    fn register_respects_capacity() {
        let mut queue = WaiterQueue::<()>::new(2);

        let _first = queue.register().unwrap();
        let _second = queue.register().unwrap();

        assert_eq!(
            queue.register().unwrap_err(),
            Error::WaiterCapacityExceeded { capacity: 2 }
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn register_sweeps_cancelled_when_full() {
        let mut queue = WaiterQueue::<()>::new(2);

        let (_, first) = queue.register().unwrap();
        let _second = queue.register().unwrap();

        assert!(first.cancel());

        queue.register().unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn take_before_only_takes_earlier_tickets() {
        let mut queue = WaiterQueue::<()>::new(8);

        let (a, _) = queue.register().unwrap();
        let (b, _) = queue.register().unwrap();
        let boundary = queue.boundary();
        let (c, _) = queue.register().unwrap();

        assert!(a < boundary && b < boundary && c >= boundary);

        let taken = queue.take_before(boundary);
        assert_eq!(taken.len(), 2);
        assert_eq!(queue.len(), 1);

        assert!(queue.take_before(boundary).is_empty());
        assert_eq!(queue.take_all().len(), 1);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn remove_by_ticket() {
        let mut queue = WaiterQueue::<()>::new(8);

        let (a, _) = queue.register().unwrap();
        let (b, _) = queue.register().unwrap();
        let (c, _) = queue.register().unwrap();

        assert!(queue.remove(b));
        assert!(!queue.remove(b));
        assert_eq!(queue.len(), 2);

        assert!(queue.remove(a));
        assert!(queue.remove(c));
        assert_eq!(queue.len(), 0);
    }
}
