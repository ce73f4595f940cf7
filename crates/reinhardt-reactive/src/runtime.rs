//! Reactive Runtime
//!
//! This module holds the dependency graph between signals and the effects
//! that read them.
//!
//! ## Architecture
//!
//! 1. **Observer Stack**: tracks the currently executing effects
//! 2. **Dependency Tracking**: `Signal::get()` records an edge from the signal to the
//!    observer on top of the stack
//! 3. **Synchronous Notification**: a signal change re-runs every subscribed effect
//!    before `set()` returns
//!
//! Islands are revived in a single pass and re-render in response to user
//! events, so there is no scheduler: effects always run in the caller's stack.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Unique identifier for reactive nodes (Signals and Effects)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
	/// Create a new unique NodeId
	pub fn new() -> Self {
		static COUNTER: AtomicUsize = AtomicUsize::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl Default for NodeId {
	fn default() -> Self {
		Self::new()
	}
}

/// Dependency graph node
#[derive(Debug, Default)]
pub(crate) struct DependencyNode {
	/// IDs of nodes that depend on this node
	pub(crate) subscribers: Vec<NodeId>,
	/// IDs of nodes this node depends on
	pub(crate) dependencies: Vec<NodeId>,
}

/// Per-thread reactive runtime.
///
/// The runtime owns the observer stack and the dependency graph. It lives in
/// thread-local storage, so signals and effects never cross threads.
pub struct Runtime {
	/// Observer stack for tracking currently executing effects
	observer_stack: RefCell<Vec<NodeId>>,
	/// Dependency graph: NodeId -> DependencyNode
	pub(crate) dependency_graph: RefCell<BTreeMap<NodeId, DependencyNode>>,
}

impl Runtime {
	/// Create a new Runtime instance
	pub fn new() -> Self {
		Self {
			observer_stack: RefCell::new(Vec::new()),
			dependency_graph: RefCell::new(BTreeMap::new()),
		}
	}

	/// Get the current observer (the currently executing Effect)
	pub fn current_observer(&self) -> Option<NodeId> {
		self.observer_stack.borrow().last().copied()
	}

	/// Push an observer onto the stack
	pub fn push_observer(&self, observer: NodeId) {
		self.observer_stack.borrow_mut().push(observer);
	}

	/// Pop an observer from the stack
	pub fn pop_observer(&self) -> Option<NodeId> {
		self.observer_stack.borrow_mut().pop()
	}

	/// Track a dependency between the current observer and a signal
	///
	/// Called by `Signal::get()`. Does nothing outside of an effect.
	pub fn track_dependency(&self, signal_id: NodeId) {
		if let Some(observer_id) = self.current_observer() {
			let mut graph = self.dependency_graph.borrow_mut();

			let signal_node = graph.entry(signal_id).or_default();
			if !signal_node.subscribers.contains(&observer_id) {
				signal_node.subscribers.push(observer_id);
			}

			let observer_node = graph.entry(observer_id).or_default();
			if !observer_node.dependencies.contains(&signal_id) {
				observer_node.dependencies.push(signal_id);
			}
		}
	}

	/// Returns the effects currently subscribed to `signal_id`.
	pub(crate) fn subscribers_of(&self, signal_id: NodeId) -> Vec<NodeId> {
		self.dependency_graph
			.borrow()
			.get(&signal_id)
			.map(|node| node.subscribers.clone())
			.unwrap_or_default()
	}

	/// Clear dependencies for a node
	///
	/// Called before an effect re-runs so that it only keeps the signals it
	/// reads on the new run.
	pub fn clear_dependencies(&self, node_id: NodeId) {
		let mut graph = self.dependency_graph.borrow_mut();

		if let Some(node) = graph.get(&node_id) {
			let dependencies = node.dependencies.clone();
			for dep_id in dependencies {
				if let Some(dep_node) = graph.get_mut(&dep_id) {
					dep_node.subscribers.retain(|&id| id != node_id);
				}
			}
		}

		if let Some(node) = graph.get_mut(&node_id) {
			node.dependencies.clear();
		}
	}

	/// Remove a node from the dependency graph
	pub fn remove_node(&self, node_id: NodeId) {
		self.clear_dependencies(node_id);
		let mut graph = self.dependency_graph.borrow_mut();
		if let Some(node) = graph.remove(&node_id) {
			for subscriber in node.subscribers {
				if let Some(sub_node) = graph.get_mut(&subscriber) {
					sub_node.dependencies.retain(|&id| id != node_id);
				}
			}
		}
	}

	/// Check if a node exists in the dependency graph (for testing)
	pub fn has_node(&self, node_id: NodeId) -> bool {
		self.dependency_graph.borrow().contains_key(&node_id)
	}

	/// Get the number of subscribers for a node (for testing)
	pub fn subscriber_count(&self, node_id: NodeId) -> usize {
		self.dependency_graph
			.borrow()
			.get(&node_id)
			.map(|node| node.subscribers.len())
			.unwrap_or(0)
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

/// Run `f` with the thread's runtime.
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.with(f)
}

/// Try to access the runtime (safe version for Drop implementations)
///
/// Returns None if the thread-local storage has been destroyed.
pub(crate) fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.try_with(f).ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_node_id_uniqueness() {
		let id1 = NodeId::new();
		let id2 = NodeId::new();
		let id3 = NodeId::new();

		assert_ne!(id1, id2);
		assert_ne!(id2, id3);
		assert_ne!(id1, id3);
	}

	#[rstest]
	fn test_runtime_observer_stack() {
		let runtime = Runtime::new();
		assert!(runtime.current_observer().is_none());

		let outer = NodeId::new();
		let inner = NodeId::new();

		runtime.push_observer(outer);
		assert_eq!(runtime.current_observer(), Some(outer));
		runtime.push_observer(inner);
		assert_eq!(runtime.current_observer(), Some(inner));

		runtime.pop_observer();
		assert_eq!(runtime.current_observer(), Some(outer));
		runtime.pop_observer();
		assert!(runtime.current_observer().is_none());
	}

	#[rstest]
	fn test_dependency_tracking() {
		let runtime = Runtime::new();
		let signal_id = NodeId::new();
		let effect_id = NodeId::new();

		runtime.push_observer(effect_id);
		runtime.track_dependency(signal_id);
		runtime.track_dependency(signal_id);
		runtime.pop_observer();

		assert_eq!(runtime.subscribers_of(signal_id), vec![effect_id]);
		let graph = runtime.dependency_graph.borrow();
		assert_eq!(graph[&effect_id].dependencies, vec![signal_id]);
	}

	#[rstest]
	fn test_track_outside_observer_is_noop() {
		let runtime = Runtime::new();
		let signal_id = NodeId::new();

		runtime.track_dependency(signal_id);

		assert!(!runtime.has_node(signal_id));
	}

	#[rstest]
	fn test_clear_dependencies() {
		let runtime = Runtime::new();
		let signal_id = NodeId::new();
		let effect_id = NodeId::new();

		runtime.push_observer(effect_id);
		runtime.track_dependency(signal_id);
		runtime.pop_observer();
		assert_eq!(runtime.subscriber_count(signal_id), 1);

		runtime.clear_dependencies(effect_id);

		assert_eq!(runtime.subscriber_count(signal_id), 0);
	}

	#[rstest]
	fn test_remove_signal_node_detaches_subscribers() {
		let runtime = Runtime::new();
		let signal_id = NodeId::new();
		let effect_id = NodeId::new();

		runtime.push_observer(effect_id);
		runtime.track_dependency(signal_id);
		runtime.pop_observer();

		runtime.remove_node(signal_id);

		assert!(!runtime.has_node(signal_id));
		let graph = runtime.dependency_graph.borrow();
		assert!(graph[&effect_id].dependencies.is_empty());
	}
}
