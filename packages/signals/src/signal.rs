use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::pool::{Callback, ConnectionPool, Record};
use crate::registry::{Ranked, Registry};
use crate::waiters::{Ticket, WaiterCell, WaiterQueue};
use crate::{
    Connection, Error, EventSource, Forwarder, Result, SignalBuilder, Subscription, Wait,
};

/// A single-threaded event source that zero or more callbacks can connect to.
///
/// Calling [`fire()`][Self::fire] invokes every connected callback synchronously, highest
/// [priority][Self::connect_with_priority] first and in registration order among equal
/// priorities, then resolves every pending [`wait()`][Self::wait].
///
/// `A` is the type of the arguments passed to each fire. Use a tuple to pass several values
/// and `()` to pass none. Callbacks receive the arguments by reference; waiters receive a clone.
///
/// The type is a cheaply clonable handle: all clones refer to the same signal. Dropping the
/// last handle resolves any pending waiters with [`Error::DestroyedSignal`] and unsubscribes
/// from an [attached][Self::attach] event source.
///
/// # Re-entrancy
///
/// Callbacks may freely connect, disconnect, reconnect, fire, wait on or destroy the signal that
/// is invoking them. A fire always invokes exactly the connections that were live when it
/// started: connections added during the fire are first invoked by the next fire, connections
/// removed before their turn are skipped.
///
/// A callback that captures a clone of its own signal forms a reference cycle, so the signal
/// lives until it is explicitly [destroyed][Self::destroy]. A callback that only needs to fire
/// the signal should capture a [`forwarder()`][Self::forwarder] instead, which does not keep
/// the signal alive.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use signals::Signal;
///
/// let signal = Signal::<u32>::new();
/// let total = Rc::new(Cell::new(0));
///
/// let connection = signal
///     .connect({
///         let total = Rc::clone(&total);
///         move |value| total.set(total.get() + value)
///     })
///     .unwrap();
///
/// signal.fire(5);
/// signal.fire(7);
/// assert_eq!(total.get(), 12);
///
/// connection.disconnect();
/// signal.fire(100);
/// assert_eq!(total.get(), 12);
/// ```
pub struct Signal<A> {
    core: Rc<SignalCore<A>>,
}

pub(crate) struct SignalCore<A> {
    name: Option<String>,
    state: RefCell<SignalState<A>>,
}

struct SignalState<A> {
    pool: ConnectionPool<A>,
    registry: Registry,
    waiters: WaiterQueue<A>,

    /// Sequence number for the next connection or reconnection.
    next_sequence: u64,

    paused: bool,

    /// Once set, never cleared.
    destroyed: bool,

    subscription: Option<Box<dyn Subscription>>,
}

impl<A: 'static> Signal<A> {
    /// Creates a new signal with the default configuration.
    ///
    /// Use [`Signal::builder()`] to give the signal a name or customize its capacities.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a signal with a custom configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use signals::Signal;
    ///
    /// let signal = Signal::<()>::builder()
    ///     .name("window_closed")
    ///     .connection_capacity(16)
    ///     .build();
    ///
    /// assert_eq!(signal.name(), Some("window_closed"));
    /// ```
    pub fn builder() -> SignalBuilder<A> {
        SignalBuilder::new()
    }

    pub(crate) fn from_parts(
        name: Option<String>,
        connection_capacity: usize,
        waiter_capacity: usize,
    ) -> Self {
        Self {
            core: Rc::new(SignalCore {
                name,
                state: RefCell::new(SignalState {
                    pool: ConnectionPool::new(connection_capacity),
                    registry: Registry::default(),
                    waiters: WaiterQueue::new(waiter_capacity),
                    next_sequence: 0,
                    paused: false,
                    destroyed: false,
                    subscription: None,
                }),
            }),
        }
    }

    /// The debug name given to the signal when it was built, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.core.name.as_deref()
    }

    /// Connects a callback with the default priority of 0.
    ///
    /// The callback stays connected until [`Connection::disconnect()`] is called or the signal
    /// is destroyed. Dropping the returned [`Connection`] does not disconnect it.
    ///
    /// # Errors
    ///
    /// * [`Error::DestroyedSignal`] if the signal has been destroyed.
    /// * [`Error::CapacityExceeded`] if the signal already has the maximum number of
    ///   live connections.
    pub fn connect<F>(&self, callback: F) -> Result<Connection<A>>
    where
        F: Fn(&A) + 'static,
    {
        self.core.attach_callback(Rc::new(callback), 0, false)
    }

    /// Connects a callback with the given priority.
    ///
    /// Callbacks with a higher priority are invoked before callbacks with a lower priority.
    /// Callbacks with equal priority are invoked in the order they were connected.
    ///
    /// # Errors
    ///
    /// See [`connect()`][Self::connect].
    pub fn connect_with_priority<F>(&self, priority: i32, callback: F) -> Result<Connection<A>>
    where
        F: Fn(&A) + 'static,
    {
        self.core.attach_callback(Rc::new(callback), priority, false)
    }

    /// Connects a callback that is invoked at most once.
    ///
    /// The connection disconnects itself right before the callback is invoked, so a fire
    /// triggered from inside the callback does not invoke it again.
    ///
    /// # Errors
    ///
    /// See [`connect()`][Self::connect].
    pub fn once<F>(&self, callback: F) -> Result<Connection<A>>
    where
        F: Fn(&A) + 'static,
    {
        self.core.attach_callback(Rc::new(callback), 0, true)
    }

    /// Connects a callback that is invoked at most once, with the given priority.
    ///
    /// # Errors
    ///
    /// See [`connect()`][Self::connect].
    pub fn once_with_priority<F>(&self, priority: i32, callback: F) -> Result<Connection<A>>
    where
        F: Fn(&A) + 'static,
    {
        self.core.attach_callback(Rc::new(callback), priority, true)
    }

    /// Registers a waiter that resolves with the arguments of the next fire.
    ///
    /// The waiter is registered when this method is called, not when the returned future is
    /// first polled. Dropping the future before it resolves releases its place in the queue.
    ///
    /// If the signal is destroyed before the next fire, the future resolves to
    /// [`Error::DestroyedSignal`].
    ///
    /// # Errors
    ///
    /// * [`Error::DestroyedSignal`] if the signal has been destroyed.
    /// * [`Error::WaiterCapacityExceeded`] if the maximum number of waiters is already pending.
    ///
    /// # Example
    ///
    /// ```
    /// use futures::executor::block_on;
    /// use signals::Signal;
    ///
    /// let signal = Signal::<&str>::new();
    /// let wait = signal.wait().unwrap();
    ///
    /// signal.fire("ready");
    ///
    /// assert_eq!(block_on(wait).unwrap(), "ready");
    /// ```
    pub fn wait(&self) -> Result<Wait<A>> {
        let (ticket, cell) = self.core.register_waiter()?;

        Ok(Wait::new(cell, ticket, Rc::downgrade(&self.core)))
    }

    /// Invokes every connected callback with `args`, then resolves every pending waiter.
    ///
    /// Does nothing if the signal is paused or destroyed.
    pub fn fire(&self, args: A)
    where
        A: Clone,
    {
        self.core.fire(args);
    }

    /// Suspends dispatch: until [`resume()`][Self::resume] is called, [`fire()`][Self::fire]
    /// does nothing. Connections and pending waiters are not affected.
    ///
    /// Does nothing if the signal has been destroyed.
    pub fn pause(&self) {
        self.core.set_paused(true);
    }

    /// Ends a [`pause()`][Self::pause].
    ///
    /// Does nothing if the signal has been destroyed.
    pub fn resume(&self) {
        self.core.set_paused(false);
    }

    /// Whether the signal is [paused][Self::pause].
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.core.state.borrow().paused
    }

    /// Whether [`destroy()`][Self::destroy] has been called. Dropping every handle does not
    /// count, as there is nobody left to ask.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.core.state.borrow().destroyed
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.core.state.borrow().pool.len()
    }

    /// Number of pending waiters.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.core.state.borrow().waiters.len()
    }

    /// Permanently shuts the signal down.
    ///
    /// Every connection is disconnected and its callback dropped, every pending waiter resolves
    /// with [`Error::DestroyedSignal`] and the attached event source, if any, is unsubscribed.
    /// Afterwards, [`fire()`][Self::fire] does nothing, [`Connection::disconnect()`] does nothing
    /// and all other operations fail with [`Error::DestroyedSignal`].
    ///
    /// Calling this more than once has no further effect. It is safe to call from inside a
    /// callback; the fire in progress skips every callback that has not been invoked yet.
    pub fn destroy(&self) {
        self.core.destroy();
    }

    /// Returns a handle that fires this signal without keeping it alive.
    ///
    /// This is what an [`EventSource`] receives when it is attached.
    #[must_use]
    pub fn forwarder(&self) -> Forwarder<A> {
        Forwarder::new(Rc::downgrade(&self.core))
    }

    /// Subscribes the signal to a foreign event source, so that every event the source
    /// forwards fires the signal.
    ///
    /// The subscription lives until the signal is destroyed or dropped, at which point it is
    /// unsubscribed. Attaching another source replaces (and unsubscribes) the previous one.
    ///
    /// # Errors
    ///
    /// [`Error::DestroyedSignal`] if the signal has been destroyed. The source is not subscribed
    /// to in that case.
    pub fn attach<S>(&self, source: S) -> Result<()>
    where
        S: EventSource<A>,
    {
        if self.is_destroyed() {
            return Err(Error::DestroyedSignal);
        }

        let subscription = source.subscribe(self.forwarder());

        let (replaced, result) = {
            let mut state = self.core.state.borrow_mut();

            if state.destroyed {
                // The source destroyed us while subscribing.
                (Some(subscription), Err(Error::DestroyedSignal))
            } else {
                (state.subscription.replace(subscription), Ok(()))
            }
        };

        debug!(
            signal = self.core.label(),
            replaced = replaced.is_some(),
            attached = result.is_ok(),
            "attached event source"
        );

        if let Some(mut replaced) = replaced {
            replaced.unsubscribe();
        }

        result
    }
}

impl<A> SignalCore<A> {
    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn set_paused(&self, paused: bool) {
        {
            let mut state = self.state.borrow_mut();

            if state.destroyed {
                return;
            }

            state.paused = paused;
        }

        if paused {
            debug!(signal = self.label(), "paused");
        } else {
            debug!(signal = self.label(), "resumed");
        }
    }

    fn attach_callback(
        self: &Rc<Self>,
        callback: Callback<A>,
        priority: i32,
        once: bool,
    ) -> Result<Connection<A>>
    where
        A: 'static,
    {
        let (index, sequence, evicted) = {
            let mut state = self.state.borrow_mut();

            if state.destroyed {
                return Err(Error::DestroyedSignal);
            }

            let sequence = state.take_sequence();

            let (index, evicted) = state
                .pool
                .acquire(Record {
                    callback,
                    priority,
                    once,
                    sequence,
                })
                .inspect_err(|error| {
                    warn!(signal = self.label(), %error, "connection rejected");
                })?;

            state.registry.insert(Ranked {
                priority,
                sequence,
                index,
            });

            (index, sequence, evicted)
        };

        // Any record parked in the reused slot can no longer be reconnected. Its callback may run
        // arbitrary code when dropped, so this happens outside the borrow.
        drop(evicted);

        Ok(Connection::new(
            Rc::downgrade(self),
            index,
            sequence,
            priority,
            once,
        ))
    }

    pub(crate) fn fire(&self, args: A)
    where
        A: Clone,
    {
        let (scheduled, boundary) = {
            let state = self.state.borrow();

            if state.paused || state.destroyed {
                trace!(
                    signal = self.label(),
                    paused = state.paused,
                    destroyed = state.destroyed,
                    "fire ignored"
                );
                return;
            }

            (state.registry.snapshot(&state.pool), state.waiters.boundary())
        };

        for entry in &scheduled {
            if self.claim(entry.index, entry.sequence) {
                (entry.callback)(&args);
            }
        }

        let waiters = self.state.borrow_mut().waiters.take_before(boundary);

        trace!(
            signal = self.label(),
            scheduled = scheduled.len(),
            waiters = waiters.len(),
            "fired"
        );

        for cell in waiters {
            if let Some(waker) = cell.resolve(Ok(args.clone())) {
                waker.wake();
            }
        }
    }

    /// Checks that a scheduled connection is still live right before invoking it and, for
    /// one-shot connections, disconnects it.
    fn claim(&self, index: usize, sequence: u64) -> bool {
        let mut state = self.state.borrow_mut();

        let Some(record) = state.pool.get(index, sequence) else {
            return false;
        };

        if record.once {
            state.detach(index, sequence);
        }

        true
    }

    pub(crate) fn is_live(&self, index: usize, sequence: u64) -> bool {
        self.state.borrow().pool.is_live(index, sequence)
    }

    pub(crate) fn detach(&self, index: usize, sequence: u64) {
        self.state.borrow_mut().detach(index, sequence);
    }

    /// Reconnects a previously detached connection, returning its new sequence number.
    pub(crate) fn reattach(&self, index: usize, sequence: u64) -> Result<u64> {
        let mut state = self.state.borrow_mut();

        if state.destroyed {
            return Err(Error::DestroyedSignal);
        }

        let new_sequence = state.take_sequence();

        let priority = state
            .pool
            .reclaim(index, sequence, new_sequence)
            .ok_or(Error::MissingCallback)?;

        state.registry.insert(Ranked {
            priority,
            sequence: new_sequence,
            index,
        });

        Ok(new_sequence)
    }

    fn register_waiter(&self) -> Result<(Ticket, Rc<WaiterCell<A>>)> {
        let mut state = self.state.borrow_mut();

        if state.destroyed {
            return Err(Error::DestroyedSignal);
        }

        state.waiters.register().inspect_err(|error| {
            warn!(signal = self.label(), %error, "waiter rejected");
        })
    }

    pub(crate) fn cancel_waiter(&self, ticket: Ticket) {
        // If the state is borrowed (a waiter dropped from within a state transition), the
        // cancelled waiter is swept out by the next registration that finds the queue full.
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.waiters.remove(ticket);
        }
    }

    fn destroy(&self) {
        let (entries, waiters, subscription) = {
            let mut state = self.state.borrow_mut();

            if state.destroyed {
                return;
            }

            state.destroyed = true;
            state.registry.clear();

            (
                state.pool.clear(),
                state.waiters.take_all(),
                state.subscription.take(),
            )
        };

        debug!(
            signal = self.label(),
            connections = entries.len(),
            waiters = waiters.len(),
            source = subscription.is_some(),
            "destroyed"
        );

        abort_waiters(waiters);

        if let Some(mut subscription) = subscription {
            subscription.unsubscribe();
        }

        drop(entries);
    }
}

impl<A> SignalState<A> {
    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence = self
            .next_sequence
            .checked_add(1)
            .expect("connection sequence numbers cannot realistically be exhausted");
        sequence
    }

    fn detach(&mut self, index: usize, sequence: u64) {
        if let Some(priority) = self.pool.release(index, sequence) {
            let removed = self.registry.remove(priority, sequence);
            debug_assert!(removed, "live connection was missing from the registry");
        }
    }
}

fn abort_waiters<A>(waiters: Vec<Rc<WaiterCell<A>>>) {
    for cell in waiters {
        if let Some(waker) = cell.resolve(Err(Error::DestroyedSignal)) {
            waker.wake();
        }
    }
}

impl<A> Drop for SignalCore<A> {
    fn drop(&mut self) {
        let state = self.state.get_mut();

        if state.destroyed {
            return;
        }

        let waiters = state.waiters.take_all();
        let subscription = state.subscription.take();

        abort_waiters(waiters);

        if let Some(mut subscription) = subscription {
            subscription.unsubscribe();
        }
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("core", &self.core).finish()
    }
}

impl<A> fmt::Debug for SignalCore<A> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SignalCore");
        debug.field("name", &self.name);

        match self.state.try_borrow() {
            Ok(state) => debug
                .field("pool", &state.pool)
                .field("registry", &state.registry)
                .field("waiters", &state.waiters)
                .field("paused", &state.paused)
                .field("destroyed", &state.destroyed)
                .field("attached", &state.subscription.is_some())
                .finish(),
            Err(_) => debug.finish_non_exhaustive(),
        }
    }
}
