//! Payload decoder.

use std::collections::HashSet;

use serde_json::Value;

use super::refs::ClientReferenceTable;
use crate::error::{IslandError, IslandResult};
use crate::ssr::{IslandInstance, PagePayload};

/// A decoded page payload.
#[derive(Debug)]
pub struct DecodedPayload {
	/// Island instances in payload order.
	pub instances: Vec<IslandInstance>,
	/// Reference table backing the instances' props.
	pub table: ClientReferenceTable,
}

/// Parses the text of the payload block.
///
/// Structural problems (invalid JSON, unknown entry kinds, malformed
/// reserved objects, duplicate slots or `refId`s) fail the whole payload.
/// References to missing entries are only detected when the instance using
/// them is revived.
pub fn decode(text: &str) -> IslandResult<DecodedPayload> {
	let root: Value = serde_json::from_str(text.trim()).map_err(IslandError::malformed)?;
	let Value::Object(fields) = &root else {
		return Err(IslandError::malformed("payload root must be an object"));
	};
	// Derived deserializers also accept positional arrays; the format does not.
	for key in ["refs", "instances"] {
		if let Some(Value::Array(items)) = fields.get(key)
			&& let Some(index) = items.iter().position(|item| !item.is_object())
		{
			return Err(IslandError::malformed(format!("{key}[{index}] must be an object")));
		}
	}
	let payload: PagePayload = serde_json::from_value(root).map_err(IslandError::malformed)?;

	let mut slots = HashSet::with_capacity(payload.instances.len());
	for instance in &payload.instances {
		if !slots.insert(&instance.slot) {
			return Err(IslandError::malformed(format!(
				"duplicate slot {}",
				instance.slot
			)));
		}
	}

	let table = ClientReferenceTable::new(payload.refs)?;
	tracing::debug!(
		instances = payload.instances.len(),
		refs = table.len(),
		"decoded island payload"
	);
	Ok(DecodedPayload {
		instances: payload.instances,
		table,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_decode_valid_payload() {
		let decoded = decode(
			r#"{"refs":[{"refId":0,"kind":"state","value":3}],
			"instances":[{"slot":"rh-0","island":"Counter","props":{"count":{"$ref":0}}}]}"#,
		)
		.unwrap();

		assert_eq!(decoded.instances.len(), 1);
		assert_eq!(decoded.instances[0].island.as_str(), "Counter");
		assert_eq!(decoded.table.len(), 1);
	}

	#[rstest]
	fn test_decode_escaped_script_text() {
		let decoded = decode(
			r#"{"refs":[],"instances":[{"slot":"rh-0","island":"Json","props":{"html":"</script>"}}]}"#,
		)
		.unwrap();

		let props = decoded.table.reify_props(&decoded.instances[0].props).unwrap();
		assert_eq!(props.get("html").and_then(|p| p.as_str()), Some("</script>"));
	}

	#[rstest]
	#[case::not_json("{")]
	#[case::wrong_root("[]")]
	#[case::positional_root("[[],[]]")]
	#[case::scalar_root("null")]
	#[case::positional_instance(r#"{"instances":[["rh-0","A",{}]]}"#)]
	#[case::positional_ref(r#"{"refs":[[0,"value",1]],"instances":[]}"#)]
	#[case::unknown_kind(r#"{"refs":[{"refId":0,"kind":"weird","value":1}],"instances":[]}"#)]
	#[case::duplicate_ref(r#"{"refs":[{"refId":0,"kind":"value","value":1},{"refId":0,"kind":"value","value":2}],"instances":[]}"#)]
	#[case::duplicate_slot(r#"{"instances":[{"slot":"rh-0","island":"A","props":{}},{"slot":"rh-0","island":"B","props":{}}]}"#)]
	#[case::bad_ref_shape(r#"{"instances":[{"slot":"rh-0","island":"A","props":{"x":{"$ref":"zero"}}}]}"#)]
	#[case::bad_nil_shape(r#"{"instances":[{"slot":"rh-0","island":"A","props":{"x":{"$nil":2}}}]}"#)]
	#[case::unknown_field(r#"{"instances":[],"extra":true}"#)]
	fn test_decode_malformed(#[case] text: &str) {
		assert!(matches!(decode(text), Err(IslandError::MalformedPayload(_))));
	}

	#[rstest]
	fn test_decode_empty_object() {
		let decoded = decode("{}").unwrap();
		assert!(decoded.instances.is_empty());
		assert!(decoded.table.is_empty());
	}
}
