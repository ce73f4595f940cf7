//! Page renderer for views containing islands.

use futures::FutureExt;
use futures::future::LocalBoxFuture;

use super::markers::{SlotAllocator, anchor_end, anchor_start, html_escape_attr};
use super::payload::{IslandInstance, PagePayload};
use crate::component::{IntoView, IslandView, View};
use crate::config::IslandOptions;
use crate::error::{IslandError, IslandResult};
use crate::registry::{IslandId, IslandRegistry};
use crate::serialization::{ReferenceTable, SerializedValue, serialize_props};

/// An island that was left out of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandFailure {
	/// The island that failed.
	pub island: IslandId,
	/// Why it failed.
	pub error: IslandError,
}

/// Output of one page render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
	/// Rendered markup with anchors around each island.
	pub html: String,
	/// Payload for the client.
	pub payload: PagePayload,
	/// Islands omitted because they failed.
	pub failures: Vec<IslandFailure>,
}

#[derive(Default)]
struct RenderState {
	slots: SlotAllocator,
	table: ReferenceTable,
	instances: Vec<IslandInstance>,
	failures: Vec<IslandFailure>,
	island_depth: usize,
}

/// Renders views to HTML and collects the island payload.
///
/// Rendering is a depth-first walk. Suspended views are awaited in place, so
/// a parent's output always wraps the complete output of its children.
///
/// ```
/// use reinhardt_islands_pages::{ElementView, IntoView, IslandRegistry, PageRenderer, Prop, Props, View};
///
/// fn counter(props: &Props) -> View {
///     let count = props.get("count").and_then(Prop::as_signal).map(|s| s.get());
///     ElementView::new("button").child(format!("{}", count.and_then(|c| c.as_i64()).unwrap_or(0))).into_view()
/// }
///
/// let registry = IslandRegistry::new();
/// let id = registry.register("islands/counter.rs", "Counter", counter).unwrap();
/// let renderer = PageRenderer::new(&registry);
///
/// let view = ElementView::new("main").child(View::island(id, Props::new().with("count", Prop::state(3))));
/// let page = futures::executor::block_on(renderer.render(view)).unwrap();
///
/// assert_eq!(page.html, "<main><!--rh-start:rh-0--><button>3</button><!--rh-end:rh-0--></main>");
/// assert_eq!(page.payload.refs.len(), 1);
/// ```
pub struct PageRenderer<'r> {
	registry: &'r IslandRegistry,
	options: IslandOptions,
}

impl<'r> PageRenderer<'r> {
	/// Creates a renderer with default options.
	pub fn new(registry: &'r IslandRegistry) -> Self {
		Self::with_options(registry, IslandOptions::default())
	}

	/// Creates a renderer with custom options.
	pub fn with_options(registry: &'r IslandRegistry, options: IslandOptions) -> Self {
		Self { registry, options }
	}

	/// Returns the options.
	pub fn options(&self) -> &IslandOptions {
		&self.options
	}

	/// Renders a view tree.
	///
	/// With `isolate_island_errors` a failing island is dropped from the
	/// output and reported in [`RenderedPage::failures`]; otherwise the first
	/// failure aborts the render.
	pub async fn render(&self, view: impl IntoView) -> IslandResult<RenderedPage> {
		let mut state = RenderState::default();
		let mut html = String::new();
		self.render_node(view.into_view(), &mut html, &mut state).await?;

		let RenderState {
			table,
			mut instances,
			failures,
			..
		} = state;
		let mut roots: Vec<SerializedValue> = instances
			.iter_mut()
			.map(|instance| std::mem::replace(&mut instance.props, SerializedValue::SpecialNull))
			.collect();
		let refs = table.finalize(&mut roots);
		for (instance, props) in instances.iter_mut().zip(roots) {
			instance.props = props;
		}

		Ok(RenderedPage {
			html,
			payload: PagePayload { refs, instances },
			failures,
		})
	}

	/// Renders a view tree into a complete HTML document with the payload
	/// block embedded.
	pub async fn render_document(&self, view: impl IntoView) -> IslandResult<String> {
		let page = self.render(view).await?;
		self.embed(&page)
	}

	/// Embeds the payload of `page` into its markup.
	///
	/// The payload goes before the last `</body>` when the markup is a full
	/// document; other markup is wrapped in a minimal document first. Fails
	/// with [`IslandError::Config`] when the options do not validate.
	pub fn embed(&self, page: &RenderedPage) -> IslandResult<String> {
		self.options.validate()?;
		let script = page.payload.to_script_tag(&self.options.payload_id)?;
		let html = match page.html.to_ascii_lowercase().rfind("</body>") {
			Some(index) => {
				let mut html = String::with_capacity(page.html.len() + script.len());
				html.push_str(&page.html[..index]);
				html.push_str(&script);
				html.push_str(&page.html[index..]);
				html
			}
			None => self.wrap_in_html(&page.html, &script),
		};

		if self.options.minify {
			Ok(minify_html(&html))
		} else {
			Ok(html)
		}
	}

	/// Wraps content in a minimal HTML document.
	pub fn wrap_in_html(&self, content: &str, script: &str) -> String {
		let mut html = String::with_capacity(content.len() + script.len() + 256);

		html.push_str("<!DOCTYPE html>\n");
		html.push_str(&format!("<html lang=\"{}\">\n", html_escape_attr(&self.options.lang)));

		html.push_str("<head>\n");
		html.push_str("<meta charset=\"UTF-8\">\n");
		html.push_str(
			"<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
		);
		html.push_str("</head>\n");

		html.push_str("<body>\n");
		html.push_str("<div id=\"app\">");
		html.push_str(content);
		html.push_str("</div>\n");
		html.push_str(script);
		html.push('\n');
		html.push_str("</body>\n");
		html.push_str("</html>");
		html
	}

	fn render_node<'a>(
		&'a self,
		view: View,
		out: &'a mut String,
		state: &'a mut RenderState,
	) -> LocalBoxFuture<'a, IslandResult<()>> {
		async move {
			match view {
				View::Element(element) => {
					let parts = element.into_parts();
					out.push('<');
					out.push_str(&parts.tag);
					for (name, value) in &parts.attrs {
						out.push_str(&format!(" {}=\"{}\"", name, html_escape_attr(value)));
					}
					out.push('>');
					if parts.is_void {
						return Ok(());
					}
					for child in parts.children {
						self.render_node(child, out, state).await?;
					}
					out.push_str("</");
					out.push_str(&parts.tag);
					out.push('>');
				}
				View::Text(text) => out.push_str(&html_escape(&text)),
				View::Fragment(children) => {
					for child in children {
						self.render_node(child, out, state).await?;
					}
				}
				View::Empty => {}
				View::Suspend(future) => {
					let resolved = future.await;
					self.render_node(resolved, out, state).await?;
				}
				View::Island(island) => self.render_island(island, out, state).await?,
			}
			Ok(())
		}
		.boxed_local()
	}

	async fn render_island(
		&self,
		island: IslandView,
		out: &mut String,
		state: &mut RenderState,
	) -> IslandResult<()> {
		if state.island_depth > 0 {
			return self.render_island_body(&island, out, state).await;
		}

		let checkpoint = state.table.checkpoint();
		let mut body = String::new();
		let props = match serialize_props(&island.props, &mut state.table) {
			Ok(props) => self
				.render_island_body(&island, &mut body, state)
				.await
				.map(|()| props),
			Err(error) => Err(error),
		};

		match props {
			Ok(props) => {
				let slot = state.slots.allocate();
				tracing::debug!(slot = %slot, island = %island.island, "rendered island");
				out.push_str(&anchor_start(&slot));
				out.push_str(&body);
				out.push_str(&anchor_end(&slot));
				state.instances.push(IslandInstance {
					slot,
					island: island.island,
					props,
				});
				Ok(())
			}
			Err(error) => {
				state.table.rollback(checkpoint);
				if !self.options.isolate_island_errors {
					return Err(error);
				}
				tracing::warn!(island = %island.island, error = %error, "island omitted from page");
				state.failures.push(IslandFailure {
					island: island.island,
					error,
				});
				Ok(())
			}
		}
	}

	async fn render_island_body(
		&self,
		island: &IslandView,
		out: &mut String,
		state: &mut RenderState,
	) -> IslandResult<()> {
		let definition = self.registry.resolve(&island.island)?;
		let view = definition.component.render(&island.props);
		state.island_depth += 1;
		let result = self.render_node(view, out, state).await;
		state.island_depth -= 1;
		result
	}
}

/// Simple HTML escape function.
pub(crate) fn html_escape(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
		.replace('"', "&quot;")
		.replace('\'', "&#x27;")
}

/// Maximum input size for HTML minification (1 MiB).
///
/// Inputs exceeding this limit are returned unmodified.
const MINIFY_HTML_MAX_INPUT_SIZE: usize = 1024 * 1024;

/// Elements whose contents are copied verbatim by the minifier.
const PRESERVED_ELEMENTS: [&str; 4] = ["pre", "textarea", "script", "style"];

/// Simple HTML minification (collapses whitespace runs to one space).
///
/// Contents of `<pre>`, `<textarea>`, `<script>` and `<style>` are kept as is.
/// Comments contain no whitespace of their own here, so anchors survive.
fn minify_html(html: &str) -> String {
	if html.len() > MINIFY_HTML_MAX_INPUT_SIZE {
		return html.to_string();
	}

	let mut result = String::with_capacity(html.len());
	let mut prev_was_whitespace = false;
	let mut preserved: Option<&str> = None;
	let mut chars = html.char_indices();

	while let Some((byte_pos, c)) = chars.next() {
		let remaining = &html[byte_pos..];

		if preserved.is_none() && c == '<' {
			preserved = PRESERVED_ELEMENTS
				.iter()
				.copied()
				.find(|tag| opens_element(remaining, tag));
		}

		if let Some(tag) = preserved
			&& c == '<'
		{
			let close = format!("</{}>", tag);
			if remaining.starts_with(&close) {
				result.push_str(&close);
				// '<' is already consumed
				for _ in 1..close.len() {
					chars.next();
				}
				preserved = None;
				prev_was_whitespace = false;
				continue;
			}
		}

		if preserved.is_some() {
			result.push(c);
		} else if c.is_whitespace() {
			if !prev_was_whitespace {
				result.push(' ');
				prev_was_whitespace = true;
			}
		} else {
			result.push(c);
			prev_was_whitespace = false;
		}
	}

	result
}

fn opens_element(remaining: &str, tag: &str) -> bool {
	remaining
		.strip_prefix('<')
		.and_then(|rest| rest.strip_prefix(tag))
		.is_some_and(|after| {
			after.is_empty() || after.starts_with(|ch: char| ch == '>' || ch.is_ascii_whitespace())
		})
}
