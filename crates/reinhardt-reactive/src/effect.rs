//! Effect - Reactive Side Effects
//!
//! `Effect` runs a closure immediately and again every time a signal read
//! during the previous run changes. Dependencies are re-collected on each run.
//!
//! An effect that is already running is never re-entered: a signal write made
//! from inside an effect's own closure does not re-trigger that effect.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::runtime::{NodeId, try_with_runtime, with_runtime};

type EffectFn = Box<dyn FnMut() + 'static>;

// Effect closures by node id. A slot is `None` while its closure is running.
thread_local! {
	static EFFECT_FUNCTIONS: RefCell<BTreeMap<NodeId, Option<EffectFn>>> = RefCell::new(BTreeMap::new());
}

/// A reactive effect that re-runs when its dependencies change
///
/// Dropping the `Effect` disposes it.
///
/// ```
/// use reinhardt_reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let doubled = Signal::new(0);
///
/// let _sync = Effect::new({
///     let count = count.clone();
///     let doubled = doubled.clone();
///     move || doubled.set(count.get() * 2)
/// });
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Effect {
	/// Unique identifier for this effect
	id: NodeId,
	/// Whether this effect has been disposed
	disposed: Rc<Cell<bool>>,
}

impl Effect {
	/// Create a new Effect and run it once.
	pub fn new<F>(mut f: F) -> Self
	where
		F: FnMut() + 'static,
	{
		let id = NodeId::new();
		let disposed = Rc::new(Cell::new(false));

		let disposed_clone = disposed.clone();
		EFFECT_FUNCTIONS.with(|storage| {
			storage.borrow_mut().insert(
				id,
				Some(Box::new(move || {
					if !disposed_clone.get() {
						f();
					}
				})),
			);
		});

		Self::execute_effect(id);

		Self { id, disposed }
	}

	/// Execute an effect by its ID
	///
	/// Does nothing when the effect is unknown, disposed or already running.
	pub(crate) fn execute_effect(effect_id: NodeId) {
		let taken = EFFECT_FUNCTIONS.with(|storage| {
			storage
				.borrow_mut()
				.get_mut(&effect_id)
				.and_then(Option::take)
		});
		let Some(mut effect_fn) = taken else {
			return;
		};

		with_runtime(|rt| {
			rt.clear_dependencies(effect_id);
			rt.push_observer(effect_id);
		});

		effect_fn();

		with_runtime(|rt| {
			rt.pop_observer();
		});

		// Disposed while running: the closure is dropped outside the storage borrow.
		let leftover = EFFECT_FUNCTIONS.with(|storage| {
			match storage.borrow_mut().get_mut(&effect_id) {
				Some(slot) => {
					*slot = Some(effect_fn);
					None
				}
				None => Some(effect_fn),
			}
		});
		drop(leftover);
	}

	/// Get the NodeId of this effect
	pub fn id(&self) -> NodeId {
		self.id
	}

	/// Whether [`dispose`](Self::dispose) has been called.
	pub fn is_disposed(&self) -> bool {
		self.disposed.get()
	}

	/// Dispose this effect
	///
	/// After calling this, the effect will no longer run.
	pub fn dispose(&self) {
		self.disposed.set(true);

		let _ = try_with_runtime(|rt| rt.remove_node(self.id));

		let removed = EFFECT_FUNCTIONS
			.try_with(|storage| storage.borrow_mut().remove(&self.id))
			.ok()
			.flatten();
		drop(removed);
	}
}

impl Drop for Effect {
	fn drop(&mut self) {
		self.dispose();
	}
}

impl std::fmt::Debug for Effect {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Effect")
			.field("id", &self.id)
			.field("disposed", &self.disposed.get())
			.finish()
	}
}

/// Re-run every effect subscribed to `signal_id`.
pub(crate) fn run_subscribers(signal_id: NodeId) {
	let subscribers = with_runtime(|rt| rt.subscribers_of(signal_id));
	for effect_id in subscribers {
		Effect::execute_effect(effect_id);
	}
}
