#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Single-threaded signals with prioritized, re-entrant dispatch.
//!
//! A [`Signal<A>`] is an event source that callbacks connect to. Firing the signal invokes every
//! connected callback synchronously with a reference to the fire's arguments, highest priority
//! first and in connection order among equal priorities. After the callbacks have run, every
//! pending [`wait()`][Signal::wait] resolves with a clone of the same arguments.
//!
//! Callbacks may connect, disconnect, fire and destroy the very signal that invokes them. A fire
//! always works from the set of connections that were live when it started, skipping any that
//! were disconnected before their turn and never picking up ones connected while it runs.
//!
//! All types in this crate are single-threaded (`!Send` and `!Sync`).
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use signals::Signal;
//!
//! let signal = Signal::<&str>::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! signal
//!     .connect_with_priority(10, {
//!         let log = Rc::clone(&log);
//!         move |name| log.borrow_mut().push(format!("first: {name}"))
//!     })
//!     .unwrap();
//!
//! signal
//!     .once({
//!         let log = Rc::clone(&log);
//!         move |name| log.borrow_mut().push(format!("only once: {name}"))
//!     })
//!     .unwrap();
//!
//! signal.fire("a");
//! signal.fire("b");
//!
//! assert_eq!(
//!     *log.borrow(),
//!     vec!["first: a", "only once: a", "first: b"]
//! );
//! ```
//!
//! # Waiting asynchronously
//!
//! ```
//! use futures::executor::block_on;
//! use signals::{Error, Signal};
//!
//! let signal = Signal::<u32>::new();
//!
//! let wait = signal.wait().unwrap();
//! signal.fire(42);
//! assert_eq!(block_on(wait), Ok(42));
//!
//! let wait = signal.wait().unwrap();
//! signal.destroy();
//! assert_eq!(block_on(wait), Err(Error::DestroyedSignal));
//! ```

mod builder;
mod connection;
mod constants;
mod error;
mod pool;
mod registry;
mod signal;
mod source;
mod wait;
mod waiters;

pub use builder::*;
pub use connection::*;
pub use constants::*;
pub use error::*;
pub use signal::Signal;
pub use source::*;
pub use wait::*;
