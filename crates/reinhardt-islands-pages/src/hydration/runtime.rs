//! Revival completion state.
//!
//! Tracks whether the page's islands have been revived on the current
//! thread and notifies listeners once they are.

use std::cell::RefCell;

type RevivalListener = Box<dyn Fn(bool) + 'static>;
type RevivalListeners = Vec<RevivalListener>;

thread_local! {
	static REVIVAL_COMPLETE: RefCell<bool> = const { RefCell::new(false) };
	static REVIVAL_LISTENERS: RefCell<RevivalListeners> = const { RefCell::new(Vec::new()) };
}

/// Resets the revival state (called before revival starts).
pub fn init_revival_state() {
	REVIVAL_COMPLETE.with(|state| {
		*state.borrow_mut() = false;
	});
}

/// Checks if revival is complete.
pub fn is_revival_complete() -> bool {
	REVIVAL_COMPLETE.with(|state| *state.borrow())
}

/// Registers a callback run when revival completes.
///
/// The callback receives `true` when every island on the page was revived.
pub fn on_revival_complete<F>(callback: F)
where
	F: Fn(bool) + 'static,
{
	REVIVAL_LISTENERS.with(|listeners| {
		listeners.borrow_mut().push(Box::new(callback));
	});
}

/// Marks revival as complete and notifies all listeners.
pub(crate) fn mark_revival_complete(all_revived: bool) {
	REVIVAL_COMPLETE.with(|state| {
		*state.borrow_mut() = true;
	});

	// Listeners may register further listeners while running.
	let listeners = REVIVAL_LISTENERS.with(|listeners| std::mem::take(&mut *listeners.borrow_mut()));
	for listener in &listeners {
		listener(all_revived);
	}
	REVIVAL_LISTENERS.with(|current| {
		let mut current = current.borrow_mut();
		let added = std::mem::replace(&mut *current, listeners);
		current.extend(added);
	});

	tracing::info!(all_revived, "island revival complete");
}
