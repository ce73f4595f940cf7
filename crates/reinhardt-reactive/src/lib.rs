//! Reinhardt Reactive
//!
//! Fine-grained reactive primitives used by revived islands.
//!
//! ## Architecture
//!
//! - [`Signal`]: shared mutable value that records which effects read it
//! - [`Effect`]: side effect that re-runs synchronously when a signal it read changes
//! - [`runtime`]: thread-local dependency graph and observer stack
//!
//! ## Example
//!
//! ```
//! use reinhardt_reactive::{Effect, Signal};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let count = Signal::new(0);
//! let seen = Rc::new(Cell::new(0));
//!
//! let _effect = Effect::new({
//!     let count = count.clone();
//!     let seen = seen.clone();
//!     move || seen.set(count.get())
//! });
//!
//! count.set(42);
//! assert_eq!(seen.get(), 42);
//! ```

#![warn(missing_docs)]

pub mod effect;
pub mod runtime;
pub mod signal;

pub use effect::Effect;
pub use runtime::{NodeId, Runtime, with_runtime};
pub use signal::Signal;
