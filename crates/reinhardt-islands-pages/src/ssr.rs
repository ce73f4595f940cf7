//! Server-side rendering of pages with islands.
//!
//! - [`markers`]: slot ids and the anchor comments around each island
//! - [`payload`]: the JSON block read by the client
//! - [`renderer`]: view tree to HTML plus payload

pub mod markers;
pub mod payload;
pub mod renderer;

pub use markers::{Anchor, READY_ATTR, SlotAllocator, SlotId, anchor_end, anchor_start, parse_anchor};
pub use payload::{IslandInstance, PagePayload, escape_json_for_script};
pub use renderer::{IslandFailure, PageRenderer, RenderedPage};
