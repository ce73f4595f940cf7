//! Fine-grained reactive primitives
//!
//! Re-exports reinhardt-reactive: [`Signal`] for shared values and
//! [`Effect`] for computations that re-run when a signal they read changes.

pub use reinhardt_reactive::*;
