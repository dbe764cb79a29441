use std::marker::PhantomData;

use crate::{DEFAULT_CONNECTION_CAPACITY, DEFAULT_WAITER_CAPACITY, EventSource, Signal};

/// Builder for creating an instance of [`Signal`].
///
/// You only need to use this builder if you want to name the signal or customize its capacities.
/// The default configuration used by [`Signal::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use signals::Signal;
///
/// let signal = Signal::<u32>::builder()
///     .name("temperature_changed")
///     .connection_capacity(4)
///     .waiter_capacity(1)
///     .build();
///
/// assert_eq!(signal.name(), Some("temperature_changed"));
/// ```
///
/// [1]: Signal::new
#[must_use]
pub struct SignalBuilder<A> {
    name: Option<String>,
    connection_capacity: usize,
    waiter_capacity: usize,

    _args: PhantomData<fn(A)>,
}

impl<A> std::fmt::Debug for SignalBuilder<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBuilder")
            .field(
                "args_type",
                &std::format_args!("{}", std::any::type_name::<A>()),
            )
            .field("name", &self.name)
            .field("connection_capacity", &self.connection_capacity)
            .field("waiter_capacity", &self.waiter_capacity)
            .finish()
    }
}

impl<A: 'static> SignalBuilder<A> {
    pub(crate) fn new() -> Self {
        Self {
            name: None,
            connection_capacity: DEFAULT_CONNECTION_CAPACITY,
            waiter_capacity: DEFAULT_WAITER_CAPACITY,
            _args: PhantomData,
        }
    }

    /// Sets a name for the signal. The name shows up in log events and debug output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the maximum number of connections that can be live at the same time.
    ///
    /// Disconnected connections do not count towards the limit.
    /// Defaults to [`DEFAULT_CONNECTION_CAPACITY`].
    pub fn connection_capacity(mut self, capacity: usize) -> Self {
        self.connection_capacity = capacity;
        self
    }

    /// Sets the maximum number of waiters that can be pending at the same time.
    ///
    /// Defaults to [`DEFAULT_WAITER_CAPACITY`].
    pub fn waiter_capacity(mut self, capacity: usize) -> Self {
        self.waiter_capacity = capacity;
        self
    }

    /// Builds the signal with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if either capacity is zero.
    #[must_use]
    pub fn build(self) -> Signal<A> {
        Signal::from_parts(self.name, self.connection_capacity, self.waiter_capacity)
    }

    /// Builds the signal and [attaches][Signal::attach] it to a foreign event source.
    ///
    /// # Panics
    ///
    /// Panics if either capacity is zero.
    #[must_use]
    pub fn attach<S>(self, source: S) -> Signal<A>
    where
        S: EventSource<A>,
    {
        let signal = self.build();

        signal
            .attach(source)
            .expect("nothing but this function can reach the new signal, so it cannot be destroyed");

        signal
    }
}
