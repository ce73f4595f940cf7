//! Shared fixtures for island integration tests.
//!
//! Island components and helpers that render a page on the "server" and
//! revive it on the "client" in the same process.

// Allow dead_code: each test binary uses a different subset of the fixtures
#![allow(dead_code)]

use std::rc::Rc;

use reinhardt_islands_pages::{
	Document, ElementView, EventType, IntoView, IslandRegistry, PageRenderer, Prop, Props,
	RevivalReport, Signal, View, revive_document,
};
use rstest::fixture;

pub const COUNTER_MODULE: &str = "islands/Counter.rs";
pub const MULTIPLE_MODULE: &str = "islands/Multiple.rs";
pub const JSON_MODULE: &str = "islands/JsonIsland.rs";
pub const NULL_MODULE: &str = "islands/NullIsland.rs";

fn increment(count: Option<Signal<Prop>>) -> impl Fn() + 'static {
	move || {
		if let Some(count) = &count {
			count.update(|c| *c = Prop::from(c.as_i64().unwrap_or(0) + 1));
		}
	}
}

fn current(count: Option<&Signal<Prop>>) -> i64 {
	count.and_then(|c| c.get().as_i64()).unwrap_or(0)
}

/// `<div class="counter"><p id={id}>{count}</p><button>+1</button></div>`
pub fn counter(props: &Props) -> View {
	let count = props.signal("count").cloned();
	let id = props.get("id").and_then(Prop::as_str).unwrap_or("counter").to_string();
	ElementView::new("div")
		.attr("class", "counter")
		.child(ElementView::new("p").attr("id", id).child(current(count.as_ref()).to_string()))
		.child(
			ElementView::new("button")
				.attr("class", "increment")
				.on(EventType::Click, increment(count))
				.child("+1"),
		)
		.into_view()
}

pub fn multiple_1(props: &Props) -> View {
	let count = props.signal("count").cloned();
	ElementView::new("div")
		.attr("id", "multiple-1")
		.child(ElementView::new("p").child(current(count.as_ref()).to_string()))
		.child(ElementView::new("button").on(EventType::Click, increment(count)).child("+1"))
		.into_view()
}

pub fn multiple_2(props: &Props) -> View {
	let count = props.signal("count").cloned();
	ElementView::new("div")
		.attr("id", "multiple-2")
		.child(ElementView::new("p").child(current(count.as_ref()).to_string()))
		.child(ElementView::new("button").on(EventType::Click, increment(count)).child("+1"))
		.into_view()
}

/// Shows its props as JSON.
pub fn json_island(props: &Props) -> View {
	ElementView::new("pre")
		.attr("class", "json")
		.child(props.to_json().to_string())
		.into_view()
}

/// Renders nothing.
pub fn null_island(_: &Props) -> View {
	View::empty()
}

#[fixture]
pub fn island_registry() -> IslandRegistry {
	let registry = IslandRegistry::new();
	registry.register(COUNTER_MODULE, "default", counter).unwrap();
	registry.register(MULTIPLE_MODULE, "Multiple1", multiple_1).unwrap();
	registry.register(MULTIPLE_MODULE, "Multiple2", multiple_2).unwrap();
	registry.register(JSON_MODULE, "default", json_island).unwrap();
	registry.register(NULL_MODULE, "default", null_island).unwrap();
	registry
}

/// Renders `view` into a complete document on the server side.
pub fn server_render(registry: &IslandRegistry, view: impl IntoView) -> String {
	let renderer = PageRenderer::new(registry);
	futures::executor::block_on(renderer.render_document(view)).unwrap()
}

/// Parses `html` and revives its islands on the client side.
pub fn client_revive(registry: &IslandRegistry, html: &str) -> (Rc<Document>, RevivalReport) {
	let document = Document::parse(html);
	let report = revive_document(registry, &document, "rh-islands").unwrap();
	(document, report)
}

/// Clicks the first element matching `selector`.
pub fn click(document: &Document, selector: &str) {
	let target = document
		.query_selector(selector)
		.unwrap_or_else(|| panic!("no element matches {selector}"));
	document.dispatch(target, &EventType::Click);
}

/// Text of the first element matching `selector`.
pub fn text(document: &Document, selector: &str) -> String {
	let node = document
		.query_selector(selector)
		.unwrap_or_else(|| panic!("no element matches {selector}"));
	document.text_content(node)
}
