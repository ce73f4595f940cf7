//! Prop serializer.

use std::fmt::{self, Write as _};

use indexmap::IndexMap;

use super::reference_table::{RefKind, ReferenceTable};
use super::value::{MAX_DEPTH, Scalar, SerializedValue};
use crate::error::{IslandError, IslandResult};
use crate::props::{Prop, Props};

/// Serializes one value against `table`.
///
/// On error the table may hold partially recorded entries; callers take a
/// [`checkpoint`](ReferenceTable::checkpoint) first and roll back on failure.
/// [`serialize_props`] does this itself.
pub fn serialize(value: &Prop, table: &mut ReferenceTable) -> IslandResult<SerializedValue> {
	let mut path = PropPath::new("value");
	encode(value, table, &mut path)
}

/// Serializes the props of one island.
///
/// Error paths are rooted at `props`, e.g. `props.items[2]`. A failure leaves
/// `table` exactly as it was before the call.
pub fn serialize_props(props: &Props, table: &mut ReferenceTable) -> IslandResult<SerializedValue> {
	let checkpoint = table.checkpoint();
	let mut path = PropPath::new("props");
	encode_fields(props, table, &mut path).map_err(|err| {
		table.rollback(checkpoint);
		err
	})
}

fn encode(value: &Prop, table: &mut ReferenceTable, path: &mut PropPath) -> IslandResult<SerializedValue> {
	if path.depth >= MAX_DEPTH {
		return Err(IslandError::UnserializableValue {
			path: path.to_string(),
			kind: "value nested too deeply",
		});
	}
	path.depth += 1;
	let encoded = encode_value(value, table, path);
	path.depth -= 1;
	encoded
}

fn encode_value(value: &Prop, table: &mut ReferenceTable, path: &mut PropPath) -> IslandResult<SerializedValue> {
	match value {
		Prop::Undefined => Ok(SerializedValue::SpecialNull),
		Prop::Null => Ok(SerializedValue::Primitive(Scalar::Null)),
		Prop::Bool(b) => Ok(SerializedValue::Primitive(Scalar::Bool(*b))),
		Prop::Number(n) => Ok(SerializedValue::Primitive(Scalar::Number(n.clone()))),
		Prop::String(s) => Ok(SerializedValue::Primitive(Scalar::String(s.clone()))),
		Prop::Array(_) | Prop::Object(_) => {
			encode_shared(value, RefKind::SharedValue, table, path, |table, path| match value {
				Prop::Array(items) => encode_items(items, table, path),
				Prop::Object(props) => encode_fields(props, table, path),
				_ => Ok(SerializedValue::SpecialNull),
			})
		}
		Prop::State(signal) => {
			encode_shared(value, RefKind::ReactiveState, table, path, |table, path| {
				let current = signal.get_untracked();
				encode(&current, table, path)
			})
		}
		Prop::Callback(_) | Prop::Host(_) => Err(IslandError::UnserializableValue {
			path: path.to_string(),
			kind: value.kind_name(),
		}),
	}
}

fn encode_shared<F>(
	value: &Prop,
	kind: RefKind,
	table: &mut ReferenceTable,
	path: &mut PropPath,
	contents: F,
) -> IslandResult<SerializedValue>
where
	F: FnOnce(&mut ReferenceTable, &mut PropPath) -> IslandResult<SerializedValue>,
{
	let Some(identity) = value.identity() else {
		return contents(table, path);
	};
	if let Some(id) = table.lookup(identity) {
		table.note_use(id);
		return Ok(SerializedValue::Reference(id));
	}

	let id = table.reserve(identity, kind, value);
	let encoded = contents(table, path)?;
	table.fill(id, encoded);
	table.note_use(id);
	Ok(SerializedValue::Reference(id))
}

fn encode_items(items: &[Prop], table: &mut ReferenceTable, path: &mut PropPath) -> IslandResult<SerializedValue> {
	let mut encoded = Vec::with_capacity(items.len());
	for (index, item) in items.iter().enumerate() {
		path.push(Segment::Index(index));
		let result = encode(item, table, path);
		path.pop();
		encoded.push(result?);
	}
	Ok(SerializedValue::Array(encoded))
}

fn encode_fields(props: &Props, table: &mut ReferenceTable, path: &mut PropPath) -> IslandResult<SerializedValue> {
	let mut encoded = IndexMap::with_capacity(props.len());
	for (key, item) in props {
		path.push(Segment::Key(key.clone()));
		let result = encode(item, table, path);
		path.pop();
		encoded.insert(key.clone(), result?);
	}
	Ok(SerializedValue::Object(encoded))
}

enum Segment {
	Key(String),
	Index(usize),
}

/// Location of the value being encoded, for error messages.
struct PropPath {
	root: &'static str,
	segments: Vec<Segment>,
	depth: usize,
}

impl PropPath {
	fn new(root: &'static str) -> Self {
		Self {
			root,
			segments: Vec::new(),
			depth: 0,
		}
	}

	fn push(&mut self, segment: Segment) {
		self.segments.push(segment);
	}

	fn pop(&mut self) {
		self.segments.pop();
	}
}

impl fmt::Display for PropPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.root)?;
		for segment in &self.segments {
			match segment {
				Segment::Key(key) => {
					f.write_char('.')?;
					f.write_str(key)?;
				}
				Segment::Index(index) => write!(f, "[{index}]")?,
			}
		}
		Ok(())
	}
}
