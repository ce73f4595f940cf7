//! Client-side reference table.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

use reinhardt_reactive::Signal;

use crate::error::{IslandError, IslandResult};
use crate::props::{Prop, Props};
use crate::serialization::{MAX_DEPTH, RefId, RefKind, ReferenceTableEntry, Scalar, SerializedValue};

// Reference hops add a level here that the serializer does not count.
const MAX_REIFY_DEPTH: usize = 2 * MAX_DEPTH;

/// Live objects decoded from a page's reference table.
///
/// The first use of a `refId` constructs its object; every later use returns
/// that same object, so islands that shared a signal on the server share one
/// signal after revival.
pub struct ClientReferenceTable {
	entries: HashMap<RefId, ReferenceTableEntry>,
	live: RefCell<HashMap<RefId, Prop>>,
	constructing: RefCell<HashSet<RefId>>,
}

impl ClientReferenceTable {
	/// Builds the table. Fails on duplicate `refId`s.
	pub fn new(entries: Vec<ReferenceTableEntry>) -> IslandResult<Self> {
		let mut by_id = HashMap::with_capacity(entries.len());
		for entry in entries {
			let ref_id = entry.ref_id;
			if by_id.insert(ref_id, entry).is_some() {
				return Err(IslandError::malformed(format!("duplicate refId {}", ref_id)));
			}
		}
		Ok(Self {
			entries: by_id,
			live: RefCell::new(HashMap::new()),
			constructing: RefCell::new(HashSet::new()),
		})
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the table has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Whether `id` has already been constructed.
	pub fn is_live(&self, id: RefId) -> bool {
		self.live.borrow().contains_key(&id)
	}

	/// Returns the live object for `id`, constructing it on first use.
	pub fn resolve(&self, id: RefId) -> IslandResult<Prop> {
		self.resolve_at(id, 0)
	}

	fn resolve_at(&self, id: RefId, depth: usize) -> IslandResult<Prop> {
		if let Some(live) = self.live.borrow().get(&id) {
			return Ok(live.clone());
		}
		let entry = self
			.entries
			.get(&id)
			.ok_or_else(|| IslandError::malformed(format!("reference {} is not in the table", id)))?;

		match entry.kind {
			RefKind::ReactiveState => {
				// Cached before its value is decoded so the value may refer back to it.
				let signal = Signal::new(Prop::Null);
				self.live.borrow_mut().insert(id, Prop::State(signal.clone()));
				match self.reify_at(&entry.value, depth + 1) {
					Ok(value) => {
						signal.set(value);
						Ok(Prop::State(signal))
					}
					Err(error) => {
						let removed = self.live.borrow_mut().remove(&id);
						drop(removed);
						Err(error)
					}
				}
			}
			RefKind::SharedValue => {
				if !self.constructing.borrow_mut().insert(id) {
					return Err(IslandError::malformed(format!(
						"shared value {} contains itself",
						id
					)));
				}
				let result = self.reify_at(&entry.value, depth + 1);
				self.constructing.borrow_mut().remove(&id);
				let value = result?;
				self.live.borrow_mut().insert(id, value.clone());
				Ok(value)
			}
		}
	}

	/// Decodes a value, resolving references through the table.
	///
	/// Values nested (or chained through references) too deeply are rejected
	/// as malformed.
	pub fn reify(&self, value: &SerializedValue) -> IslandResult<Prop> {
		self.reify_at(value, 0)
	}

	fn reify_at(&self, value: &SerializedValue, depth: usize) -> IslandResult<Prop> {
		if depth >= MAX_REIFY_DEPTH {
			return Err(IslandError::malformed(format!(
				"value nested deeper than {} levels",
				MAX_REIFY_DEPTH
			)));
		}
		Ok(match value {
			SerializedValue::Primitive(Scalar::Null) => Prop::Null,
			SerializedValue::Primitive(Scalar::Bool(b)) => Prop::Bool(*b),
			SerializedValue::Primitive(Scalar::Number(n)) => Prop::Number(n.clone()),
			SerializedValue::Primitive(Scalar::String(s)) => Prop::String(s.clone()),
			SerializedValue::Array(items) => Prop::array(
				items
					.iter()
					.map(|item| self.reify_at(item, depth + 1))
					.collect::<IslandResult<Vec<_>>>()?,
			),
			SerializedValue::Object(_) => Prop::object(self.reify_fields(value, depth + 1)?),
			SerializedValue::Reference(id) => self.resolve_at(*id, depth)?,
			SerializedValue::SpecialNull => Prop::Undefined,
		})
	}

	/// Decodes an island's props, which must be an object.
	pub fn reify_props(&self, value: &SerializedValue) -> IslandResult<Props> {
		self.reify_fields(value, 0)
	}

	fn reify_fields(&self, value: &SerializedValue, depth: usize) -> IslandResult<Props> {
		let SerializedValue::Object(fields) = value else {
			return Err(IslandError::malformed("island props must be an object"));
		};
		let mut props = Props::new();
		for (key, field) in fields {
			props.insert(key.clone(), self.reify_at(field, depth)?);
		}
		Ok(props)
	}
}

impl fmt::Debug for ClientReferenceTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ClientReferenceTable")
			.field("entries", &self.entries.len())
			.field("live", &self.live.borrow().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn entry(ref_id: RefId, kind: RefKind, value: serde_json::Value) -> ReferenceTableEntry {
		ReferenceTableEntry {
			ref_id,
			kind,
			value: SerializedValue::from_json(value).unwrap(),
		}
	}

	fn value(json: serde_json::Value) -> SerializedValue {
		SerializedValue::from_json(json).unwrap()
	}

	#[rstest]
	fn test_state_is_constructed_once() {
		let table = ClientReferenceTable::new(vec![entry(0, RefKind::ReactiveState, json!(3))]).unwrap();

		let first = table.reify_props(&value(json!({"count": {"$ref": 0}}))).unwrap();
		let second = table.reify_props(&value(json!({"count": {"$ref": 0}}))).unwrap();

		let a = first.signal("count").unwrap();
		let b = second.signal("count").unwrap();
		assert!(a.ptr_eq(b));
		assert_eq!(a.get_untracked(), Prop::from(3));

		a.set(Prop::from(4));
		assert_eq!(b.get_untracked(), Prop::from(4));
	}

	#[rstest]
	fn test_shared_value_keeps_identity() {
		let table =
			ClientReferenceTable::new(vec![entry(0, RefKind::SharedValue, json!({"k": [1, 2]}))]).unwrap();

		let props = table
			.reify_props(&value(json!({"a": {"$ref": 0}, "b": {"$ref": 0}})))
			.unwrap();

		let a = props.get("a").unwrap();
		let b = props.get("b").unwrap();
		assert_eq!(a.identity(), b.identity());
		assert_eq!(a.to_json(), json!({"k": [1, 2]}));
	}

	#[rstest]
	fn test_self_referencing_state() {
		let table =
			ClientReferenceTable::new(vec![entry(0, RefKind::ReactiveState, json!({"me": {"$ref": 0}}))])
				.unwrap();

		let state = table.resolve(0).unwrap();
		let signal = state.as_signal().unwrap().clone();
		let inner = signal.get_untracked();
		assert!(inner.as_object().unwrap().signal("me").unwrap().ptr_eq(&signal));

		// break the cycle
		signal.set(Prop::Null);
	}

	#[rstest]
	fn test_special_null_and_scalars() {
		let table = ClientReferenceTable::new(Vec::new()).unwrap();
		let props = table
			.reify_props(&value(json!({"nil": {"$nil": 1}, "n": null, "s": "x", "f": 1.5})))
			.unwrap();

		assert!(props.get("nil").unwrap().is_undefined());
		assert!(props.get("n").unwrap().is_null());
		assert_eq!(props.get("s").and_then(Prop::as_str), Some("x"));
		assert_eq!(props.get("f").and_then(Prop::as_f64), Some(1.5));
	}

	#[rstest]
	fn test_duplicate_ref_id_is_rejected() {
		let err = ClientReferenceTable::new(vec![
			entry(0, RefKind::SharedValue, json!(1)),
			entry(0, RefKind::ReactiveState, json!(2)),
		])
		.unwrap_err();
		assert!(matches!(err, IslandError::MalformedPayload(ref m) if m.contains("duplicate refId 0")));
	}

	#[rstest]
	fn test_dangling_reference_is_malformed() {
		let table = ClientReferenceTable::new(Vec::new()).unwrap();
		let err = table.reify_props(&value(json!({"x": {"$ref": 7}}))).unwrap_err();
		assert!(matches!(err, IslandError::MalformedPayload(_)));
	}

	#[rstest]
	fn test_shared_value_cycle_is_malformed() {
		let table =
			ClientReferenceTable::new(vec![entry(0, RefKind::SharedValue, json!([{"$ref": 0}]))]).unwrap();
		assert!(matches!(table.resolve(0), Err(IslandError::MalformedPayload(_))));
		assert!(!table.is_live(0));
	}

	#[rstest]
	fn test_failed_state_is_not_cached() {
		let table = ClientReferenceTable::new(vec![entry(0, RefKind::ReactiveState, json!({"x": {"$ref": 9}}))])
			.unwrap();

		assert!(table.resolve(0).is_err());
		assert!(!table.is_live(0));
	}

	fn ref_chain(len: RefId, kind: RefKind) -> Vec<ReferenceTableEntry> {
		(0..len)
			.map(|id| {
				let value = if id + 1 < len { json!({"$ref": id + 1}) } else { json!("end") };
				entry(id, kind, value)
			})
			.collect()
	}

	#[rstest]
	#[case::state(RefKind::ReactiveState)]
	#[case::value(RefKind::SharedValue)]
	fn test_long_reference_chain_is_malformed(#[case] kind: RefKind) {
		let table = ClientReferenceTable::new(ref_chain(5000, kind)).unwrap();

		let err = table.reify_props(&value(json!({"head": {"$ref": 0}}))).unwrap_err();

		assert!(matches!(err, IslandError::MalformedPayload(ref m) if m.contains("nested deeper")));
		assert!(!table.is_live(0));
	}

	#[rstest]
	fn test_short_reference_chain_resolves() {
		let table = ClientReferenceTable::new(ref_chain(MAX_DEPTH as RefId, RefKind::ReactiveState)).unwrap();

		let head = table.resolve(0).unwrap();
		assert_eq!(head.to_json(), json!("end"));
	}

	#[rstest]
	fn test_props_must_be_object() {
		let table = ClientReferenceTable::new(Vec::new()).unwrap();
		assert!(table.reify_props(&value(json!([1]))).is_err());
	}
}
