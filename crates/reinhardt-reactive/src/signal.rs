//! Signal - Fine-grained Reactive Primitive
//!
//! `Signal<T>` holds a value and records a dependency whenever it is read
//! inside an [`Effect`](crate::Effect).
//!
//! ## Identity
//!
//! Clones of a signal share one value. [`Signal::ptr_eq`] and
//! [`Signal::identity`] expose that sharing, which is what lets a payload
//! serializer emit one reference for a signal passed to several islands.
//!
//! ## Example
//!
//! ```
//! use reinhardt_reactive::Signal;
//!
//! let count = Signal::new(0);
//! let alias = count.clone();
//!
//! alias.update(|n| *n += 1);
//! assert_eq!(count.get(), 1);
//! assert!(count.ptr_eq(&alias));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::effect::run_subscribers;
use crate::runtime::{NodeId, try_with_runtime, with_runtime};

/// A reactive signal that holds a value and tracks dependencies
///
/// `Signal<T>` implements `Clone` and shares the value via `Rc<RefCell<T>>`.
/// All clones of the same Signal share the same underlying value.
pub struct Signal<T: 'static> {
	/// Unique identifier for this signal
	id: NodeId,
	/// The actual value, shared via reference counting
	value: Rc<RefCell<T>>,
}

impl<T: 'static> Signal<T> {
	/// Create a new Signal with the given initial value
	pub fn new(value: T) -> Self {
		Self {
			id: NodeId::new(),
			value: Rc::new(RefCell::new(value)),
		}
	}

	/// Get the current value of the signal
	///
	/// This tracks the dependency if called from within an Effect.
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		with_runtime(|rt| rt.track_dependency(self.id));
		self.get_untracked()
	}

	/// Get the current value without tracking dependencies
	pub fn get_untracked(&self) -> T
	where
		T: Clone,
	{
		self.value.borrow().clone()
	}

	/// Borrow the current value, tracking the dependency.
	pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		with_runtime(|rt| rt.track_dependency(self.id));
		self.with_untracked(f)
	}

	/// Borrow the current value without tracking.
	pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
		f(&self.value.borrow())
	}

	/// Set the signal to a new value
	///
	/// Every effect that read this signal re-runs before `set` returns.
	pub fn set(&self, value: T) {
		*self.value.borrow_mut() = value;
		run_subscribers(self.id);
	}

	/// Update the signal's value in place and notify dependents once.
	pub fn update<F>(&self, f: F)
	where
		F: FnOnce(&mut T),
	{
		f(&mut *self.value.borrow_mut());
		run_subscribers(self.id);
	}

	/// Get the NodeId of this signal
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Returns `true` when both handles share one underlying value.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.value, &other.value)
	}

	/// Address of the shared value, stable for as long as any clone is alive.
	pub fn identity(&self) -> usize {
		Rc::as_ptr(&self.value) as *const () as usize
	}
}

impl<T: 'static> Clone for Signal<T> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			value: Rc::clone(&self.value),
		}
	}
}

impl<T: 'static> Drop for Signal<T> {
	fn drop(&mut self) {
		// Last clone going away
		if Rc::strong_count(&self.value) == 1 {
			let _ = try_with_runtime(|rt| rt.remove_node(self.id));
		}
	}
}

impl<T: fmt::Debug + 'static> fmt::Debug for Signal<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.value.try_borrow() {
			Ok(value) => f
				.debug_struct("Signal")
				.field("id", &self.id)
				.field("value", &*value)
				.finish(),
			Err(_) => f
				.debug_struct("Signal")
				.field("id", &self.id)
				.finish_non_exhaustive(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Effect;
	use rstest::rstest;
	use serial_test::serial;
	use std::cell::Cell;

	#[rstest]
	#[serial]
	fn test_signal_get_set() {
		let signal = Signal::new(3);
		assert_eq!(signal.get(), 3);

		signal.set(4);
		assert_eq!(signal.get_untracked(), 4);
	}

	#[rstest]
	#[serial]
	fn test_signal_clones_share_value() {
		let signal = Signal::new(String::from("a"));
		let alias = signal.clone();

		alias.update(|s| s.push('b'));

		assert_eq!(signal.get(), "ab");
		assert!(signal.ptr_eq(&alias));
		assert_eq!(signal.identity(), alias.identity());
		assert_eq!(signal.id(), alias.id());
	}

	#[rstest]
	#[serial]
	fn test_distinct_signals_have_distinct_identity() {
		let a = Signal::new(0);
		let b = Signal::new(0);

		assert!(!a.ptr_eq(&b));
		assert_ne!(a.identity(), b.identity());
	}

	#[rstest]
	#[serial]
	fn test_signal_with_tracks() {
		let signal = Signal::new(vec![1, 2, 3]);
		let total = Rc::new(Cell::new(0));

		let _effect = Effect::new({
			let signal = signal.clone();
			let total = total.clone();
			move || total.set(signal.with(|v| v.iter().sum::<i32>()))
		});
		assert_eq!(total.get(), 6);

		signal.update(|v| v.push(4));
		assert_eq!(total.get(), 10);
	}

	#[rstest]
	#[serial]
	fn test_last_clone_drop_removes_node() {
		let signal = Signal::new(0);
		let id = signal.id();
		with_runtime(|rt| {
			rt.push_observer(NodeId::new());
			rt.track_dependency(id);
			rt.pop_observer();
		});
		assert!(with_runtime(|rt| rt.has_node(id)));

		let alias = signal.clone();
		drop(signal);
		assert!(with_runtime(|rt| rt.has_node(id)));

		drop(alias);
		assert!(!with_runtime(|rt| rt.has_node(id)));
	}
}
