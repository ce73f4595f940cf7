//! Island component trait.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use super::view::View;
use crate::props::Props;

/// A component that can be revived on the client.
///
/// Any `Fn(&Props) -> View` that is `Send + Sync` is an island:
///
/// ```
/// use reinhardt_islands_pages::{ElementView, IntoView, Props, View};
///
/// fn greeting(props: &Props) -> View {
///     let name = props.get("name").and_then(|p| p.as_str()).unwrap_or("world");
///     ElementView::new("p").child(format!("Hello, {name}!")).into_view()
/// }
/// # let _ = reinhardt_islands_pages::ComponentRef::new(greeting);
/// ```
pub trait Island: Send + Sync + 'static {
	/// Renders the island for the given props.
	fn render(&self, props: &Props) -> View;
}

impl<F> Island for F
where
	F: Fn(&Props) -> View + Send + Sync + 'static,
{
	fn render(&self, props: &Props) -> View {
		self(props)
	}
}

/// Type-erased handle to an island component.
///
/// Two handles name the same component when the underlying Rust types are
/// the same (every function item and closure has its own type).
#[derive(Clone)]
pub struct ComponentRef {
	type_id: TypeId,
	type_name: &'static str,
	inner: Arc<dyn Island>,
}

impl ComponentRef {
	/// Wraps a component.
	pub fn new<C: Island>(component: C) -> Self {
		Self {
			type_id: TypeId::of::<C>(),
			type_name: std::any::type_name::<C>(),
			inner: Arc::new(component),
		}
	}

	/// Identity of the component type.
	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	/// Rust type name, for diagnostics.
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	/// Whether both handles wrap the same component type.
	pub fn same_component(&self, other: &Self) -> bool {
		self.type_id == other.type_id
	}

	/// Renders the component.
	pub fn render(&self, props: &Props) -> View {
		self.inner.render(props)
	}
}

impl fmt::Debug for ComponentRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentRef")
			.field("type_name", &self.type_name)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::IntoView;
	use rstest::rstest;

	fn first(_: &Props) -> View {
		"first".into_view()
	}

	fn second(_: &Props) -> View {
		"second".into_view()
	}

	#[rstest]
	fn test_component_identity_is_type_based() {
		let a = ComponentRef::new(first);
		let b = ComponentRef::new(first);
		let c = ComponentRef::new(second);

		assert!(a.same_component(&b));
		assert!(!a.same_component(&c));
		assert!(a.type_name().ends_with("first"));
	}

	#[rstest]
	fn test_closure_island_renders() {
		let greeting = ComponentRef::new(|props: &Props| {
			let name = props.get("name").and_then(|p| p.as_str()).unwrap_or("?").to_string();
			View::text(name)
		});

		let view = greeting.render(&Props::new().with("name", "ada"));
		assert!(matches!(view, View::Text(ref t) if t == "ada"));
	}
}
