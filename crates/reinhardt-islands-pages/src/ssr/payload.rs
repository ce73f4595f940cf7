//! Page payload embedded next to the rendered islands.
//!
//! ```text
//! <script id="rh-islands" type="application/json">
//! {"refs":[{"refId":0,"kind":"state","value":3}],
//!  "instances":[{"slot":"rh-0","island":"Counter","props":{"count":{"$ref":0}}}]}
//! </script>
//! ```

use serde::{Deserialize, Serialize};

use super::markers::{SlotId, html_escape_attr};
use crate::error::{IslandError, IslandResult};
use crate::registry::IslandId;
use crate::serialization::{ReferenceTableEntry, SerializedValue};

/// One rendered island.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IslandInstance {
	/// Slot of the anchor pair wrapping the island's output.
	pub slot: SlotId,
	/// Registered island id.
	pub island: IslandId,
	/// Serialized props.
	pub props: SerializedValue,
}

/// Reference table and instances of one page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PagePayload {
	/// Finalized reference table.
	#[serde(default)]
	pub refs: Vec<ReferenceTableEntry>,
	/// Island instances.
	#[serde(default)]
	pub instances: Vec<IslandInstance>,
}

impl PagePayload {
	/// Whether the page has no islands.
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}

	/// Serializes the payload to JSON.
	pub fn to_json_string(&self) -> IslandResult<String> {
		serde_json::to_string(self).map_err(IslandError::malformed)
	}

	/// Generates the `<script>` tag carrying the payload.
	pub fn to_script_tag(&self, id: &str) -> IslandResult<String> {
		let json = self.to_json_string()?;
		Ok(format!(
			"<script id=\"{}\" type=\"application/json\">{}</script>",
			html_escape_attr(id),
			escape_json_for_script(&json)
		))
	}
}

/// Escapes JSON for embedding in a `<script>` element.
///
/// `<`, `>` and `&` become `\u003c`, `\u003e` and `\u0026`, which keeps
/// `</script>` and `<!--` out of the element while leaving the JSON value
/// unchanged. U+2028 and U+2029 are escaped as well.
pub fn escape_json_for_script(json: &str) -> String {
	let mut escaped = String::with_capacity(json.len());
	for c in json.chars() {
		match c {
			'<' => escaped.push_str("\\u003c"),
			'>' => escaped.push_str("\\u003e"),
			'&' => escaped.push_str("\\u0026"),
			'\u{2028}' => escaped.push_str("\\u2028"),
			'\u{2029}' => escaped.push_str("\\u2029"),
			other => escaped.push(other),
		}
	}
	escaped
}
