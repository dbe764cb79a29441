/// Maximum number of live connections a signal accepts unless configured otherwise via
/// [`SignalBuilder::connection_capacity()`][crate::SignalBuilder::connection_capacity].
pub const DEFAULT_CONNECTION_CAPACITY: usize = 512;

/// Maximum number of pending waiters a signal accepts unless configured otherwise via
/// [`SignalBuilder::waiter_capacity()`][crate::SignalBuilder::waiter_capacity].
pub const DEFAULT_WAITER_CAPACITY: usize = 512;
