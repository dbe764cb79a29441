//! Bridging foreign event streams into a [`Signal`][crate::Signal].
//!
//! Anything that produces events (a callback registry in another library, a UI toolkit hook,
//! a file watcher) can be wrapped by implementing [`EventSource`]. When the source is
//! [attached][crate::Signal::attach], it receives a [`Forwarder`] through which it fires the
//! signal, and hands back a [`Subscription`] that the signal unsubscribes when it is destroyed
//! or dropped.

use std::fmt;
use std::rc::Weak;

use crate::signal::SignalCore;

/// Handle through which an event source fires a signal.
///
/// The forwarder does not keep the signal alive. Once the signal has been dropped, forwarding
/// does nothing, just like firing a destroyed signal.
pub struct Forwarder<A> {
    signal: Weak<SignalCore<A>>,
}

impl<A> Forwarder<A> {
    pub(crate) fn new(signal: Weak<SignalCore<A>>) -> Self {
        Self { signal }
    }

    /// Fires the signal with `args`, if the signal still exists.
    pub fn fire(&self, args: A)
    where
        A: Clone,
    {
        if let Some(core) = self.signal.upgrade() {
            core.fire(args);
        }
    }

    /// Whether the signal still exists. A destroyed signal that has not yet been dropped
    /// still counts as existing.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.signal.strong_count() > 0
    }
}

impl<A> Clone for Forwarder<A> {
    fn clone(&self) -> Self {
        Self {
            signal: Weak::clone(&self.signal),
        }
    }
}

impl<A> fmt::Debug for Forwarder<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarder")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// A live subscription to a foreign event source.
///
/// Any `FnMut()` closure is a subscription that runs the closure to unsubscribe.
#[cfg_attr(test, mockall::automock)]
pub trait Subscription {
    /// Stops the source from forwarding any more events. Called at most once by the signal.
    fn unsubscribe(&mut self);
}

impl<F> Subscription for F
where
    F: FnMut(),
{
    fn unsubscribe(&mut self) {
        self();
    }
}

/// A foreign event stream that can forward its events into a signal.
///
/// Any `FnOnce(Forwarder<A>) -> Box<dyn Subscription>` closure is an event source.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use signals::{Forwarder, Signal, Subscription};
///
/// // A stand-in for some other library's listener list.
/// let listeners: Rc<RefCell<Vec<Forwarder<u8>>>> = Rc::default();
///
/// let signal = Signal::<u8>::new();
/// signal
///     .attach({
///         let listeners = Rc::clone(&listeners);
///         move |forwarder: Forwarder<u8>| -> Box<dyn Subscription> {
///             listeners.borrow_mut().push(forwarder);
///             Box::new(move || listeners.borrow_mut().clear())
///         }
///     })
///     .unwrap();
///
/// for forwarder in listeners.borrow().iter() {
///     forwarder.fire(7);
/// }
///
/// signal.destroy();
/// assert!(listeners.borrow().is_empty());
/// ```
pub trait EventSource<A> {
    /// Starts forwarding events to `forwarder`, returning the handle that stops it.
    fn subscribe(self, forwarder: Forwarder<A>) -> Box<dyn Subscription>;
}

impl<A, F> EventSource<A> for F
where
    F: FnOnce(Forwarder<A>) -> Box<dyn Subscription>,
{
    fn subscribe(self, forwarder: Forwarder<A>) -> Box<dyn Subscription> {
        self(forwarder)
    }
}
