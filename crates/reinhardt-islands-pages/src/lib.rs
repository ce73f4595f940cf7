//! Reinhardt Islands - island serialization and revival
//!
//! A server renders a page where only some components ("islands") run on the
//! client. This crate renders those pages, records each island's props in a
//! payload embedded in the HTML, and revives the islands on the client while
//! keeping reactive state that several islands share as one object.
//!
//! ## Architecture
//!
//! - [`registry`]: `(module, export)` to island id and component
//! - [`props`]: render-time prop values, including shared [`Signal`]s
//! - [`serialization`]: props to a transferable value tree with a reference table
//! - [`ssr`]: page rendering, anchor comments and the payload block
//! - [`dom`]: the client document model
//! - [`hydration`]: payload decoding and island revival
//! - [`config`]: rendering options
//!
//! ```text
//! register ─► PageRenderer::render ─► <!--rh-start:rh-0-->…<!--rh-end:rh-0-->
//!                                     <script id="rh-islands">{refs, instances}</script>
//!                                                     │
//!                         Document::parse ─► revive_document ─► mounted islands
//! ```
//!
//! ## Example
//!
//! ```
//! use reinhardt_islands_pages::{
//!     Document, ElementView, EventType, IntoView, IslandRegistry, PageRenderer, Prop, Props, View,
//!     revive_document,
//! };
//!
//! fn counter(props: &Props) -> View {
//!     let count = props.signal("count").cloned();
//!     let shown = count.as_ref().and_then(|c| c.get().as_i64()).unwrap_or(0);
//!     ElementView::new("button")
//!         .attr("class", "counter")
//!         .on(EventType::Click, move || {
//!             if let Some(count) = &count {
//!                 count.update(|c| *c = Prop::from(c.as_i64().unwrap_or(0) + 1));
//!             }
//!         })
//!         .child(shown.to_string())
//!         .into_view()
//! }
//!
//! let registry = IslandRegistry::new();
//! let id = registry.register("islands/counter.rs", "Counter", counter).unwrap();
//!
//! // Server
//! let renderer = PageRenderer::new(&registry);
//! let page = ElementView::new("div")
//!     .attr("id", "host")
//!     .child(View::island(id, Props::new().with("count", Prop::state(3))));
//! let html = futures::executor::block_on(renderer.render_document(page)).unwrap();
//!
//! // Client
//! let document = Document::parse(&html);
//! let report = revive_document(&registry, &document, "rh-islands").unwrap();
//! assert!(report.is_complete());
//!
//! let button = document.query_selector(".counter").unwrap();
//! document.dispatch(button, &EventType::Click);
//! let button = document.query_selector(".counter").unwrap();
//! assert_eq!(document.text_content(button), "4");
//! ```

#![warn(missing_docs)]

pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod hydration;
pub mod props;
pub mod registry;
pub mod serialization;
pub mod ssr;

// Re-export commonly used types
pub use component::{
	ComponentRef, ElementView, IntoView, Island, IslandView, View, ViewEventHandler,
};
pub use config::{DEFAULT_PAYLOAD_ID, IslandOptions};
pub use dom::{AnchorSite, Document, EventType, NodeKey, NodeKind};
pub use error::{IslandError, IslandResult};
pub use hydration::{
	ClientReferenceTable, DecodedPayload, RevivalEngine, RevivalFailure, RevivalReport, decode,
	init_revival_state, is_revival_complete, on_revival_complete, revive_document,
};
pub use props::{Callback, HostObject, Prop, Props};
pub use registry::{
	IslandDefinition, IslandExport, IslandId, IslandRegistry, ModuleId, register_static_islands,
};
pub use serialization::{
	RefId, RefKind, ReferenceTable, ReferenceTableEntry, SerializedValue, serialize,
	serialize_props,
};
pub use ssr::{
	IslandFailure, IslandInstance, PagePayload, PageRenderer, READY_ATTR, RenderedPage, SlotId,
};

// Reactive primitives used by island props
pub use reinhardt_reactive::{Effect, Signal};

// Used by `inventory::submit!` in downstream crates
#[doc(hidden)]
pub use inventory;
