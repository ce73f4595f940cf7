//! Island anchor markers.
//!
//! Each top-level island's output is wrapped in a pair of HTML comments that
//! carry its slot id:
//!
//! ```text
//! <div data-rh-ready="rh-0">
//!   <!--rh-start:rh-0--><button>0</button><!--rh-end:rh-0-->
//! </div>
//! ```
//!
//! The client finds islands by walking the document for these comments. The
//! parent element of a pair receives the ready marker once the island is
//! revived.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute listing the revived slots of an element, space separated.
pub const READY_ATTR: &str = "data-rh-ready";

const START_PREFIX: &str = "rh-start:";
const END_PREFIX: &str = "rh-end:";

/// Identifies one island instance within a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
	/// Wraps a slot id string.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// The id as a string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for SlotId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for SlotId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

/// Hands out slot ids for one page render.
#[derive(Debug, Default)]
pub struct SlotAllocator {
	next: u64,
}

impl SlotAllocator {
	/// Creates an allocator starting at `rh-0`.
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocates the next slot id.
	pub fn allocate(&mut self) -> SlotId {
		let id = self.next;
		self.next += 1;
		SlotId(format!("rh-{}", id))
	}

	/// Number of slots allocated so far.
	pub fn allocated(&self) -> u64 {
		self.next
	}
}

/// Start anchor comment for `slot`.
pub fn anchor_start(slot: &SlotId) -> String {
	format!("<!--{}{}-->", START_PREFIX, slot)
}

/// End anchor comment for `slot`.
pub fn anchor_end(slot: &SlotId) -> String {
	format!("<!--{}{}-->", END_PREFIX, slot)
}

/// A parsed anchor comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
	/// `rh-start:{slot}`
	Start(SlotId),
	/// `rh-end:{slot}`
	End(SlotId),
}

/// Parses the text of an HTML comment (without `<!--` and `-->`).
pub fn parse_anchor(comment: &str) -> Option<Anchor> {
	let comment = comment.trim();
	if let Some(slot) = comment.strip_prefix(START_PREFIX) {
		return (!slot.is_empty()).then(|| Anchor::Start(SlotId::from(slot)));
	}
	if let Some(slot) = comment.strip_prefix(END_PREFIX) {
		return (!slot.is_empty()).then(|| Anchor::End(SlotId::from(slot)));
	}
	None
}

/// Escapes a string for use in an HTML attribute value.
pub(crate) fn html_escape_attr(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('"', "&quot;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_slot_allocation_is_sequential() {
		let mut slots = SlotAllocator::new();
		assert_eq!(slots.allocate().as_str(), "rh-0");
		assert_eq!(slots.allocate().as_str(), "rh-1");
		assert_eq!(slots.allocated(), 2);
	}

	#[rstest]
	fn test_anchor_comments() {
		let slot = SlotId::from("rh-42");
		assert_eq!(anchor_start(&slot), "<!--rh-start:rh-42-->");
		assert_eq!(anchor_end(&slot), "<!--rh-end:rh-42-->");
	}

	#[rstest]
	#[case("rh-start:rh-3", Some(Anchor::Start(SlotId::from("rh-3"))))]
	#[case(" rh-end:rh-3 ", Some(Anchor::End(SlotId::from("rh-3"))))]
	#[case("rh-start:", None)]
	#[case("just a comment", None)]
	fn test_parse_anchor(#[case] comment: &str, #[case] expected: Option<Anchor>) {
		assert_eq!(parse_anchor(comment), expected);
	}

	#[rstest]
	fn test_html_escape_attr() {
		assert_eq!(html_escape_attr("hello"), "hello");
		assert_eq!(html_escape_attr("a&b"), "a&amp;b");
		assert_eq!(html_escape_attr("a\"b"), "a&quot;b");
		assert_eq!(html_escape_attr("<script>"), "&lt;script&gt;");
	}
}
