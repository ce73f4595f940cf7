//! Transferable value tree and its JSON encoding.
//!
//! The JSON form is plain JSON plus two reserved single-key objects:
//! `{"$ref": n}` for a reference-table entry and `{"$nil": 1}` for the
//! special null. Object keys that start with `$` are escaped by doubling the
//! leading `$`, so user data can never be mistaken for a reserved object.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::error::{IslandError, IslandResult};

/// Index of an entry in a page's reference table.
pub type RefId = u32;

/// Reserved key of a reference object.
pub const REF_KEY: &str = "$ref";

/// Reserved key of the special null object.
pub const NIL_KEY: &str = "$nil";

/// Deepest nesting of prop values the serializer accepts.
///
/// Each array, object and state level counts once. Keeps encoded payloads
/// well inside the JSON parser's own nesting limit.
pub const MAX_DEPTH: usize = 64;

/// A JSON scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
	/// `null`
	Null,
	/// `true` / `false`
	Bool(bool),
	/// Any JSON number
	Number(Number),
	/// A string
	String(String),
}

impl Scalar {
	fn to_json(&self) -> Value {
		match self {
			Self::Null => Value::Null,
			Self::Bool(b) => Value::Bool(*b),
			Self::Number(n) => Value::Number(n.clone()),
			Self::String(s) => Value::String(s.clone()),
		}
	}
}

/// Serialized form of a prop value.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedValue {
	/// A JSON scalar.
	Primitive(Scalar),
	/// A sequence.
	Array(Vec<SerializedValue>),
	/// An ordered map.
	Object(IndexMap<String, SerializedValue>),
	/// A reference-table entry.
	Reference(RefId),
	/// The "nothing" value, distinct from `null` and from a missing field.
	SpecialNull,
}

impl SerializedValue {
	/// Shorthand for a string primitive.
	pub fn string(value: impl Into<String>) -> Self {
		Self::Primitive(Scalar::String(value.into()))
	}

	/// Shorthand for an integer primitive.
	pub fn int(value: i64) -> Self {
		Self::Primitive(Scalar::Number(value.into()))
	}

	/// Encodes into the wire JSON.
	pub fn to_json(&self) -> Value {
		match self {
			Self::Primitive(scalar) => scalar.to_json(),
			Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
			Self::Object(fields) => Value::Object(
				fields
					.iter()
					.map(|(key, value)| (escape_key(key), value.to_json()))
					.collect(),
			),
			Self::Reference(id) => reserved(REF_KEY, Value::from(*id)),
			Self::SpecialNull => reserved(NIL_KEY, Value::from(1)),
		}
	}

	/// Decodes from the wire JSON.
	pub fn from_json(value: Value) -> IslandResult<Self> {
		Ok(match value {
			Value::Null => Self::Primitive(Scalar::Null),
			Value::Bool(b) => Self::Primitive(Scalar::Bool(b)),
			Value::Number(n) => Self::Primitive(Scalar::Number(n)),
			Value::String(s) => Self::Primitive(Scalar::String(s)),
			Value::Array(items) => Self::Array(
				items
					.into_iter()
					.map(Self::from_json)
					.collect::<IslandResult<_>>()?,
			),
			Value::Object(map) => decode_object(map)?,
		})
	}

	/// Whether this is [`SerializedValue::SpecialNull`].
	pub fn is_special_null(&self) -> bool {
		matches!(self, Self::SpecialNull)
	}
}

fn reserved(key: &str, value: Value) -> Value {
	let mut map = Map::with_capacity(1);
	map.insert(key.to_string(), value);
	Value::Object(map)
}

fn escape_key(key: &str) -> String {
	if key.starts_with('$') {
		format!("${key}")
	} else {
		key.to_string()
	}
}

fn decode_object(map: Map<String, Value>) -> IslandResult<SerializedValue> {
	if map.len() == 1 {
		if let Some(raw) = map.get(REF_KEY) {
			let id = raw
				.as_u64()
				.and_then(|id| RefId::try_from(id).ok())
				.ok_or_else(|| IslandError::malformed(format!("invalid {REF_KEY} value: {raw}")))?;
			return Ok(SerializedValue::Reference(id));
		}
		if let Some(marker) = map.get(NIL_KEY) {
			if marker.as_u64() != Some(1) {
				return Err(IslandError::malformed(format!(
					"invalid {NIL_KEY} value: {marker}"
				)));
			}
			return Ok(SerializedValue::SpecialNull);
		}
	}

	let mut fields = IndexMap::with_capacity(map.len());
	for (key, value) in map {
		let key = match key.strip_prefix('$') {
			Some(rest) if rest.starts_with('$') => rest.to_string(),
			Some(_) => {
				return Err(IslandError::malformed(format!(
					"unexpected reserved key {key:?}"
				)));
			}
			None => key,
		};
		fields.insert(key, SerializedValue::from_json(value)?);
	}
	Ok(SerializedValue::Object(fields))
}

impl Serialize for SerializedValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.to_json().serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for SerializedValue {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = Value::deserialize(deserializer)?;
		Self::from_json(value).map_err(D::Error::custom)
	}
}
