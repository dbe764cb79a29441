#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for tests, benchmarks and examples in the signals workspace.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Runs a test on a separate thread and aborts it if it does not finish in time.
///
/// Signal dispatch is re-entrant, so a broken invariant tends to show up as a callback that
/// fires itself forever rather than as a failed assertion. The watchdog turns such a hang into
/// a test failure after 10 seconds (60 seconds under Miri).
///
/// The closure must be `Send`, so create any signals inside it rather than capturing them.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the closure runs directly
/// on the calling thread, so that mutation testing can detect hanging mutants on its own terms.
///
/// # Panics
///
/// Panics if the test exceeds the timeout (when not in mutation testing mode) and resumes
/// the panic of the test thread if the test itself panics.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let doubled = with_watchdog(|| 21 * 2);
/// assert_eq!(doubled, 42);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_handle = thread::spawn(move || {
        let result = test_fn();
        // If this fails, the receiver has already timed out.
        drop(tx.send(result));
    });

    let timeout = if cfg!(miri) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(10)
    };

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_handle.join().expect("test thread should not panic");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded {timeout:?} timeout");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_handle.join() {
            Ok(()) => panic!("test thread disconnected unexpectedly"),
            Err(e) => std::panic::resume_unwind(e),
        },
    }
}

/// Shared, append-only record of callback invocations.
///
/// Clones share the same record, so a clone can be moved into each callback while the test
/// keeps one to inspect the invocation order afterwards.
///
/// # Example
///
/// ```rust
/// use testing::CallLog;
///
/// let log = CallLog::new();
///
/// let first = {
///     let log = log.clone();
///     move || log.record("first")
/// };
///
/// first();
/// log.record("second");
///
/// assert_eq!(log.calls(), vec!["first", "second"]);
/// ```
pub struct CallLog<T> {
    calls: Rc<RefCell<Vec<T>>>,
}

impl<T> CallLog<T> {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Appends one invocation to the log.
    pub fn record(&self, call: T) {
        self.calls.borrow_mut().push(call);
    }

    /// Number of invocations recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.borrow().is_empty()
    }

    /// Removes and returns everything recorded so far.
    #[must_use]
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }
}

impl<T: Clone> CallLog<T> {
    /// Returns a copy of everything recorded so far, in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<T> {
        self.calls.borrow().clone()
    }
}

impl<T> Clone for CallLog<T> {
    fn clone(&self) -> Self {
        Self {
            calls: Rc::clone(&self.calls),
        }
    }
}

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for CallLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.calls.try_borrow() {
            Ok(calls) => f.debug_struct("CallLog").field("calls", &*calls).finish(),
            Err(_) => f.debug_struct("CallLog").finish_non_exhaustive(),
        }
    }
}
