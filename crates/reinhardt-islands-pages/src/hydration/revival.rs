//! Revival engine.
//!
//! Walks the document for island anchors, pairs each with its payload entry
//! by slot, decodes the props and mounts the component between the anchors.
//!
//! ## Architecture
//!
//! ```text
//! Document ── island_anchors() ──┐
//!                                ├─ match by slot ─ resolve island ─ reify props ─ Effect(render → replace_between)
//! Payload ─── decode() ──────────┘
//! ```
//!
//! Each mounted island is an [`Effect`]: signals read while rendering are
//! tracked, and a change re-renders the region between the anchors.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use futures::FutureExt;
use indexmap::IndexMap;
use reinhardt_reactive::Effect;

use super::decoder::{DecodedPayload, decode};
use super::refs::ClientReferenceTable;
use super::runtime::{init_revival_state, mark_revival_complete};
use crate::component::View;
use crate::dom::{AnchorSite, Document, NodeKey};
use crate::error::{IslandError, IslandResult};
use crate::registry::{IslandId, IslandRegistry};
use crate::ssr::{IslandInstance, READY_ATTR, SlotId};

/// An island that could not be revived.
#[derive(Debug, Clone, PartialEq)]
pub struct RevivalFailure {
	/// Slot of the failed instance.
	pub slot: SlotId,
	/// Island id, when the payload named one.
	pub island: Option<IslandId>,
	/// What went wrong.
	pub error: IslandError,
}

/// Outcome of one revival pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevivalReport {
	/// Revived slots in mount order.
	pub revived: Vec<SlotId>,
	/// Islands left static.
	pub failures: Vec<RevivalFailure>,
}

impl RevivalReport {
	/// Whether every island was revived.
	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Mounts the islands of one page.
pub struct RevivalEngine {
	registry: IslandRegistry,
	document: Rc<Document>,
}

impl RevivalEngine {
	/// Creates an engine for `document`.
	pub fn new(registry: IslandRegistry, document: Rc<Document>) -> Self {
		Self { registry, document }
	}

	/// The document being revived.
	pub fn document(&self) -> &Rc<Document> {
		&self.document
	}

	/// Revives every island of `payload`, in document order.
	///
	/// A failing island is reported and left as rendered by the server; the
	/// others are still mounted.
	pub fn revive(&self, payload: DecodedPayload) -> RevivalReport {
		let DecodedPayload { instances, table } = payload;
		let sites = self.document.island_anchors();
		warn_on_order_mismatch(&sites, &instances);

		let mut pending: IndexMap<SlotId, IslandInstance> = instances
			.into_iter()
			.map(|instance| (instance.slot.clone(), instance))
			.collect();
		let mut report = RevivalReport::default();

		for site in sites {
			let Some(instance) = pending.shift_remove(&site.slot) else {
				report.failures.push(RevivalFailure {
					error: IslandError::malformed(format!("anchor {} has no payload entry", site.slot)),
					slot: site.slot,
					island: None,
				});
				continue;
			};

			match self.mount(&site, &instance, &table) {
				Ok(()) => {
					if let Some(host) = site.parent {
						self.document.add_token(host, READY_ATTR, instance.slot.as_str());
					}
					tracing::debug!(slot = %instance.slot, island = %instance.island, "mounted island");
					report.revived.push(instance.slot);
				}
				Err(error) => {
					tracing::warn!(slot = %instance.slot, island = %instance.island, error = %error, "island not revived");
					report.failures.push(RevivalFailure {
						slot: instance.slot,
						island: Some(instance.island),
						error,
					});
				}
			}
		}

		for (slot, instance) in pending {
			tracing::warn!(slot = %slot, island = %instance.island, "payload entry without anchor");
			report.failures.push(RevivalFailure {
				error: IslandError::malformed(format!("payload entry {} has no anchor", slot)),
				slot,
				island: Some(instance.island),
			});
		}

		report
	}

	fn mount(
		&self,
		site: &AnchorSite,
		instance: &IslandInstance,
		table: &ClientReferenceTable,
	) -> IslandResult<()> {
		let end = site
			.end
			.ok_or_else(|| IslandError::malformed(format!("anchor {} has no end marker", site.slot)))?;
		let definition = self.registry.resolve(&instance.island)?;
		let props = table.reify_props(&instance.props)?;

		let start = site.start;
		let slot = instance.slot.clone();
		let document = Rc::downgrade(&self.document);
		let registry = self.registry.clone();
		let component = definition.component;
		let mounted = Rc::new(Cell::new(false));
		let first_error: Rc<RefCell<Option<IslandError>>> = Rc::new(RefCell::new(None));

		let effect = {
			let mounted = Rc::clone(&mounted);
			let first_error = Rc::clone(&first_error);
			Effect::new(move || {
				let Some(document) = document.upgrade() else {
					return;
				};
				let view = component.render(&props);
				let mut nodes = Vec::new();
				match build_nodes(&document, &registry, view, &mut nodes) {
					Ok(()) => document.replace_between(start, end, &nodes),
					Err(error) if mounted.get() => {
						tracing::warn!(slot = %slot, error = %error, "island re-render failed");
					}
					Err(error) => *first_error.borrow_mut() = Some(error),
				}
			})
		};
		mounted.set(true);

		if let Some(error) = first_error.borrow_mut().take() {
			return Err(error);
		}
		self.document.retain_effect(effect);
		Ok(())
	}
}

/// Builds detached document nodes for a view.
fn build_nodes(
	document: &Document,
	registry: &IslandRegistry,
	view: View,
	out: &mut Vec<NodeKey>,
) -> IslandResult<()> {
	match view {
		View::Element(element) => {
			let parts = element.into_parts();
			let node = document.create_element(&parts.tag);
			for (name, value) in &parts.attrs {
				document.set_attribute(node, name, value);
			}
			for (event, handler) in parts.event_handlers {
				document.add_listener(node, event, handler);
			}
			if !parts.is_void {
				let mut children = Vec::new();
				for child in parts.children {
					build_nodes(document, registry, child, &mut children)?;
				}
				for child in children {
					document.append_child(node, child);
				}
			}
			out.push(node);
		}
		View::Text(text) => out.push(document.create_text(&text)),
		View::Fragment(children) => {
			for child in children {
				build_nodes(document, registry, child, out)?;
			}
		}
		View::Empty => {}
		View::Island(island) => {
			let definition = registry.resolve(&island.island)?;
			build_nodes(document, registry, definition.component.render(&island.props), out)?;
		}
		// Revival is synchronous; a pending view keeps the server markup.
		View::Suspend(future) => match future.now_or_never() {
			Some(view) => build_nodes(document, registry, view, out)?,
			None => return Err(IslandError::PendingView),
		},
	}
	Ok(())
}

fn warn_on_order_mismatch(sites: &[AnchorSite], instances: &[IslandInstance]) {
	let in_payload: HashSet<&SlotId> = instances.iter().map(|i| &i.slot).collect();
	let in_document: HashSet<&SlotId> = sites.iter().map(|s| &s.slot).collect();
	let dom_order = sites.iter().map(|s| &s.slot).filter(|slot| in_payload.contains(slot));
	let payload_order = instances.iter().map(|i| &i.slot).filter(|slot| in_document.contains(slot));
	if !dom_order.eq(payload_order) {
		tracing::warn!("island anchors and payload instances are in different orders; matching by slot");
	}
}

/// Reads the payload block `#payload_id` from `document` and revives its
/// islands.
///
/// Resets and then completes the revival state of the current thread; see
/// [`on_revival_complete`](super::on_revival_complete). A missing or
/// malformed payload block leaves every island static and is returned as an
/// error.
pub fn revive_document(
	registry: &IslandRegistry,
	document: &Rc<Document>,
	payload_id: &str,
) -> IslandResult<RevivalReport> {
	init_revival_state();

	let decoded = document
		.get_element_by_id(payload_id)
		.ok_or_else(|| IslandError::malformed(format!("payload element #{} not found", payload_id)))
		.and_then(|script| decode(&document.text_content(script)));
	let decoded = match decoded {
		Ok(decoded) => decoded,
		Err(error) => {
			tracing::warn!(error = %error, "island payload unusable; page stays static");
			mark_revival_complete(false);
			return Err(error);
		}
	};

	let report = RevivalEngine::new(registry.clone(), Rc::clone(document)).revive(decoded);
	mark_revival_complete(report.is_complete());
	Ok(report)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::component::{ElementView, IntoView};
	use crate::dom::EventType;
	use crate::props::{Prop, Props};
	use rstest::rstest;
	use serial_test::serial;

	fn counter(props: &Props) -> View {
		let Some(count) = props.signal("count").cloned() else {
			return View::empty();
		};
		let value = count.get().as_i64().unwrap_or(0);
		ElementView::new("button")
			.on(EventType::Click, move || {
				count.update(|c| *c = Prop::from(c.as_i64().unwrap_or(0) + 1));
			})
			.child(value.to_string())
			.into_view()
	}

	fn page(body: &str, payload: &str) -> Rc<Document> {
		Document::parse(&format!(
			"<html><body>{}<script id=\"rh-islands\" type=\"application/json\">{}</script></body></html>",
			body, payload
		))
	}

	fn registry() -> IslandRegistry {
		let registry = IslandRegistry::new();
		registry.register("/islands/counter.rs", "Counter", counter).unwrap();
		registry
	}

	#[rstest]
	#[serial(revival_state)]
	fn test_revive_mounts_and_reacts() {
		let doc = page(
			r#"<div id="host"><!--rh-start:rh-0--><button>3</button><!--rh-end:rh-0--></div>"#,
			r#"{"refs":[{"refId":0,"kind":"state","value":3}],"instances":[{"slot":"rh-0","island":"Counter","props":{"count":{"$ref":0}}}]}"#,
		);

		let report = revive_document(&registry(), &doc, "rh-islands").unwrap();

		assert!(report.is_complete());
		let host = doc.get_element_by_id("host").unwrap();
		assert_eq!(doc.attribute(host, READY_ATTR).as_deref(), Some("rh-0"));

		let button = doc.query_selector("#host button").unwrap();
		assert_eq!(doc.text_content(button), "3");
		doc.dispatch(button, &EventType::Click);

		let button = doc.query_selector("#host button").unwrap();
		assert_eq!(doc.text_content(button), "4");
	}

	#[rstest]
	#[serial(revival_state)]
	fn test_missing_pieces_are_reported() {
		let doc = page(
			r#"<p id="a"><!--rh-start:rh-0--><!--rh-end:rh-0--></p><p id="b"><!--rh-start:rh-9--><!--rh-end:rh-9--></p><p id="c"><!--rh-start:rh-2--></p>"#,
			r#"{"instances":[
				{"slot":"rh-0","island":"Nope","props":{}},
				{"slot":"rh-1","island":"Counter","props":{}},
				{"slot":"rh-2","island":"Counter","props":{}}
			]}"#,
		);

		let report = revive_document(&registry(), &doc, "rh-islands").unwrap();

		assert!(report.revived.is_empty());
		let failed: Vec<_> = report.failures.iter().map(|f| f.slot.as_str()).collect();
		assert_eq!(failed, ["rh-0", "rh-9", "rh-2", "rh-1"]);
		assert_eq!(report.failures[0].error, IslandError::UnknownIsland("Nope".to_string()));
		assert!(doc.query_selector_all("[data-rh-ready]").is_empty());
	}

	fn later(_: &Props) -> View {
		let mut polled = false;
		View::suspend(futures::future::poll_fn(move |cx| {
			if polled {
				return std::task::Poll::Ready(ElementView::new("span").child("done"));
			}
			polled = true;
			cx.waker().wake_by_ref();
			std::task::Poll::Pending
		}))
	}

	#[rstest]
	#[serial(revival_state)]
	fn test_pending_island_keeps_server_markup() {
		let registry = registry();
		registry.register("/islands/later.rs", "Later", later).unwrap();
		let doc = page(
			r#"<div id="host"><!--rh-start:rh-0--><span>done</span><!--rh-end:rh-0--></div>"#,
			r#"{"instances":[{"slot":"rh-0","island":"Later","props":{}}]}"#,
		);

		let report = revive_document(&registry, &doc, "rh-islands").unwrap();

		assert_eq!(report.failures.len(), 1);
		assert_eq!(report.failures[0].error, IslandError::PendingView);
		let host = doc.get_element_by_id("host").unwrap();
		assert_eq!(doc.attribute(host, READY_ATTR), None);
		assert_eq!(
			doc.inner_html(host),
			"<!--rh-start:rh-0--><span>done</span><!--rh-end:rh-0-->"
		);
	}

	#[rstest]
	#[serial(revival_state)]
	fn test_ready_suspended_island_mounts() {
		let registry = registry();
		registry
			.register("/islands/ready.rs", "Ready", |_: &Props| {
				View::suspend(async { ElementView::new("em").child("now") })
			})
			.unwrap();
		let doc = page(
			r#"<div id="host"><!--rh-start:rh-0--><em>now</em><!--rh-end:rh-0--></div>"#,
			r#"{"instances":[{"slot":"rh-0","island":"Ready","props":{}}]}"#,
		);

		let report = revive_document(&registry, &doc, "rh-islands").unwrap();

		assert!(report.is_complete());
		assert_eq!(doc.text_content(doc.query_selector("#host em").unwrap()), "now");
	}

	#[rstest]
	#[serial(revival_state)]
	fn test_missing_payload_block() {
		let doc = Document::parse("<html><body></body></html>");
		let err = revive_document(&registry(), &doc, "rh-islands").unwrap_err();
		assert!(matches!(err, IslandError::MalformedPayload(_)));
		assert!(crate::hydration::is_revival_complete());
	}

	#[rstest]
	#[serial(revival_state)]
	fn test_dropping_document_stops_effects() {
		let doc = page(
			r#"<div><!--rh-start:rh-0--><!--rh-end:rh-0--></div>"#,
			r#"{"refs":[{"refId":0,"kind":"state","value":0}],"instances":[{"slot":"rh-0","island":"Counter","props":{"count":{"$ref":0}}}]}"#,
		);
		let decoded = decode(&doc.text_content(doc.get_element_by_id("rh-islands").unwrap())).unwrap();
		let signal = decoded.table.resolve(0).unwrap().as_signal().unwrap().clone();

		let report = RevivalEngine::new(registry(), Rc::clone(&doc)).revive(decoded);
		assert!(report.is_complete());

		drop(doc);
		signal.set(Prop::from(5));
		assert_eq!(signal.get_untracked(), Prop::from(5));
	}
}
