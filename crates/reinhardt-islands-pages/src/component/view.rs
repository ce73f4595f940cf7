//! IntoView trait and View enum for island rendering.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use crate::dom::EventType;
use crate::props::Props;
use crate::registry::IslandId;

/// Type alias for event handler functions.
pub type ViewEventHandler = Rc<dyn Fn() + 'static>;

/// A unified representation of renderable content.
pub enum View {
	/// A DOM element.
	Element(ElementView),
	/// A text node.
	Text(Cow<'static, str>),
	/// A fragment containing multiple views (no wrapper element).
	Fragment(Vec<View>),
	/// An empty view (renders nothing).
	Empty,
	/// A registered island with its render-time props.
	Island(IslandView),
	/// A view that is only known once the future resolves.
	Suspend(LocalBoxFuture<'static, View>),
}

impl fmt::Debug for View {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Element(el) => f.debug_tuple("Element").field(el).finish(),
			Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Self::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
			Self::Empty => f.write_str("Empty"),
			Self::Island(island) => f.debug_tuple("Island").field(island).finish(),
			Self::Suspend(_) => f.write_str("Suspend(..)"),
		}
	}
}

/// An island placed in the view tree.
#[derive(Debug, Clone)]
pub struct IslandView {
	/// Registered island id.
	pub island: IslandId,
	/// Props passed to the island component.
	pub props: Props,
}

/// Represents a DOM element in the view tree.
pub struct ElementView {
	/// The tag name (e.g., "div", "span").
	tag: Cow<'static, str>,
	/// HTML attributes.
	attrs: Vec<(Cow<'static, str>, Cow<'static, str>)>,
	/// Child views.
	children: Vec<View>,
	/// Whether this is a void element (no closing tag).
	is_void: bool,
	/// Event handlers attached to this element.
	event_handlers: Vec<(EventType, ViewEventHandler)>,
}

impl fmt::Debug for ElementView {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ElementView")
			.field("tag", &self.tag)
			.field("attrs", &self.attrs)
			.field("children", &self.children)
			.field("is_void", &self.is_void)
			.field("event_handlers_count", &self.event_handlers.len())
			.finish()
	}
}

/// Returns `true` for elements that never have children or a closing tag.
pub fn is_void_element(tag: &str) -> bool {
	matches!(
		tag,
		"area"
			| "base" | "br"
			| "col" | "embed"
			| "hr" | "img"
			| "input" | "link"
			| "meta" | "source"
			| "track" | "wbr"
	)
}

impl ElementView {
	/// Creates a new element view.
	pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
		let tag = tag.into();
		let is_void = is_void_element(&tag);
		Self {
			tag,
			attrs: Vec::new(),
			children: Vec::new(),
			is_void,
			event_handlers: Vec::new(),
		}
	}

	/// Adds an attribute.
	pub fn attr(
		mut self,
		name: impl Into<Cow<'static, str>>,
		value: impl Into<Cow<'static, str>>,
	) -> Self {
		self.attrs.push((name.into(), value.into()));
		self
	}

	/// Adds a child view.
	pub fn child(mut self, child: impl IntoView) -> Self {
		self.children.push(child.into_view());
		self
	}

	/// Adds multiple child views.
	pub fn children(mut self, children: impl IntoIterator<Item = impl IntoView>) -> Self {
		self.children
			.extend(children.into_iter().map(|c| c.into_view()));
		self
	}

	/// Adds an event handler. Handlers only run on the client.
	pub fn on(mut self, event_type: EventType, handler: impl Fn() + 'static) -> Self {
		self.event_handlers.push((event_type, Rc::new(handler)));
		self
	}

	/// Returns the tag name.
	pub fn tag_name(&self) -> &str {
		&self.tag
	}

	/// Returns the attributes.
	pub fn attrs(&self) -> &[(Cow<'static, str>, Cow<'static, str>)] {
		&self.attrs
	}

	/// Returns the child views.
	pub fn child_views(&self) -> &[View] {
		&self.children
	}

	/// Returns whether this is a void element.
	pub fn is_void(&self) -> bool {
		self.is_void
	}

	/// Returns the event handlers.
	pub fn event_handlers(&self) -> &[(EventType, ViewEventHandler)] {
		&self.event_handlers
	}

	/// Splits the element into its parts.
	pub(crate) fn into_parts(self) -> ElementParts {
		ElementParts {
			tag: self.tag,
			attrs: self.attrs,
			children: self.children,
			is_void: self.is_void,
			event_handlers: self.event_handlers,
		}
	}
}

/// Owned fields of an [`ElementView`].
pub(crate) struct ElementParts {
	pub(crate) tag: Cow<'static, str>,
	pub(crate) attrs: Vec<(Cow<'static, str>, Cow<'static, str>)>,
	pub(crate) children: Vec<View>,
	pub(crate) is_void: bool,
	pub(crate) event_handlers: Vec<(EventType, ViewEventHandler)>,
}

impl View {
	/// Creates an element view.
	pub fn element(tag: impl Into<Cow<'static, str>>) -> ElementView {
		ElementView::new(tag)
	}

	/// Creates a text view.
	pub fn text(content: impl Into<Cow<'static, str>>) -> Self {
		Self::Text(content.into())
	}

	/// Creates a fragment view.
	pub fn fragment(children: impl IntoIterator<Item = impl IntoView>) -> Self {
		Self::Fragment(children.into_iter().map(|c| c.into_view()).collect())
	}

	/// Creates an empty view.
	pub fn empty() -> Self {
		Self::Empty
	}

	/// Places a registered island.
	pub fn island(island: impl Into<IslandId>, props: Props) -> Self {
		Self::Island(IslandView {
			island: island.into(),
			props,
		})
	}

	/// Creates a view from an async computation.
	///
	/// The server renderer awaits it in place, so everything rendered after
	/// it in document order waits for it.
	pub fn suspend<F, V>(future: F) -> Self
	where
		F: Future<Output = V> + 'static,
		V: IntoView + 'static,
	{
		Self::Suspend(future.map(IntoView::into_view).boxed_local())
	}
}

/// Conversion into a [`View`].
pub trait IntoView {
	/// Converts self into a View.
	fn into_view(self) -> View;
}

impl IntoView for View {
	fn into_view(self) -> View {
		self
	}
}

impl IntoView for ElementView {
	fn into_view(self) -> View {
		View::Element(self)
	}
}

impl IntoView for IslandView {
	fn into_view(self) -> View {
		View::Island(self)
	}
}

impl IntoView for String {
	fn into_view(self) -> View {
		View::Text(Cow::Owned(self))
	}
}

impl IntoView for &'static str {
	fn into_view(self) -> View {
		View::Text(Cow::Borrowed(self))
	}
}

impl<T: IntoView> IntoView for Option<T> {
	fn into_view(self) -> View {
		match self {
			Some(v) => v.into_view(),
			None => View::Empty,
		}
	}
}

impl<T: IntoView> IntoView for Vec<T> {
	fn into_view(self) -> View {
		View::Fragment(self.into_iter().map(|v| v.into_view()).collect())
	}
}

impl IntoView for () {
	fn into_view(self) -> View {
		View::Empty
	}
}

impl<A: IntoView, B: IntoView> IntoView for (A, B) {
	fn into_view(self) -> View {
		View::Fragment(vec![self.0.into_view(), self.1.into_view()])
	}
}

impl<A: IntoView, B: IntoView, C: IntoView> IntoView for (A, B, C) {
	fn into_view(self) -> View {
		View::Fragment(vec![
			self.0.into_view(),
			self.1.into_view(),
			self.2.into_view(),
		])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_element_view_creation() {
		let el = ElementView::new("div");
		assert_eq!(el.tag_name(), "div");
		assert!(!el.is_void());
		assert!(el.attrs().is_empty());
		assert!(el.child_views().is_empty());
	}

	#[rstest]
	#[case("br", true)]
	#[case("input", true)]
	#[case("pre", false)]
	#[case("span", false)]
	fn test_void_element_detection(#[case] tag: &'static str, #[case] expected: bool) {
		assert_eq!(ElementView::new(tag).is_void(), expected);
	}

	#[rstest]
	fn test_builder_collects_children_and_handlers() {
		let el = ElementView::new("button")
			.attr("class", "increment")
			.on(EventType::Click, || {})
			.child("+")
			.children(vec!["a", "b"]);

		assert_eq!(el.attrs().len(), 1);
		assert_eq!(el.child_views().len(), 3);
		assert_eq!(el.event_handlers().len(), 1);
		assert_eq!(el.event_handlers()[0].0, EventType::Click);
	}

	#[rstest]
	fn test_option_and_unit_into_view() {
		assert!(matches!(None::<String>.into_view(), View::Empty));
		assert!(matches!(().into_view(), View::Empty));
		assert!(matches!(Some("x").into_view(), View::Text(_)));
	}

	#[rstest]
	fn test_island_view() {
		let view = View::island("Counter", Props::new().with("count", 1));
		let View::Island(island) = view else {
			panic!("expected island");
		};
		assert_eq!(island.island.as_str(), "Counter");
		assert_eq!(island.props.len(), 1);
	}

	#[rstest]
	fn test_suspend_resolves_to_view() {
		let view = View::suspend(async { ElementView::new("p").child("late") });
		let View::Suspend(future) = view else {
			panic!("expected suspended view");
		};
		let resolved = futures::executor::block_on(future);
		assert!(matches!(resolved, View::Element(ref el) if el.tag_name() == "p"));
	}

	#[rstest]
	fn test_suspend_accepts_owned_output() {
		let label = String::from("owned");
		let view = View::suspend(async move { Some(label) });
		let View::Suspend(future) = view else {
			panic!("expected suspended view");
		};
		let resolved = futures::executor::block_on(future);
		assert!(matches!(resolved, View::Text(ref text) if text == "owned"));
	}
}
