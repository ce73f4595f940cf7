//! Page-scoped reference table.
//!
//! The table deduplicates values by object identity while a page is being
//! rendered. Every composite prop is recorded on first sight; a second sighting
//! of the same allocation returns the existing id. [`ReferenceTable::finalize`]
//! then inlines shared-value entries that turned out to be used once and
//! renumbers the survivors densely, so the payload only carries references for
//! values that are really shared (and for all reactive state).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::value::{RefId, SerializedValue};
use crate::props::Prop;

/// Kind of a reference-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
	/// A plain value shared by identity.
	#[serde(rename = "value")]
	SharedValue,
	/// Reactive state, revived as one live signal.
	#[serde(rename = "state")]
	ReactiveState,
}

/// One entry of the wire `refs` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceTableEntry {
	/// Entry id, referenced as `{"$ref": ref_id}`.
	#[serde(rename = "refId")]
	pub ref_id: RefId,
	/// Entry kind.
	pub kind: RefKind,
	/// Serialized value (for state, the value at render time).
	pub value: SerializedValue,
}

struct Slot {
	kind: RefKind,
	value: Option<SerializedValue>,
	uses: usize,
	// Keeps the allocation alive so its address cannot be reused by another
	// value during the same render.
	_pin: Prop,
}

/// Saved table position, see [`ReferenceTable::checkpoint`].
#[derive(Debug, Clone)]
pub struct Checkpoint {
	len: usize,
	uses: Vec<usize>,
}

/// Identity-keyed table built while serializing one page.
#[derive(Default)]
pub struct ReferenceTable {
	slots: Vec<Slot>,
	by_identity: HashMap<usize, RefId>,
}

impl ReferenceTable {
	/// Creates an empty table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of recorded entries (before finalization).
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Whether nothing has been recorded.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Id previously reserved for `identity`.
	pub fn lookup(&self, identity: usize) -> Option<RefId> {
		self.by_identity.get(&identity).copied()
	}

	/// Reserves an id for `value` before its contents are encoded.
	///
	/// Reserving first is what lets a state that (indirectly) contains itself
	/// encode as a reference to its own entry.
	pub fn reserve(&mut self, identity: usize, kind: RefKind, value: &Prop) -> RefId {
		let id = self.slots.len() as RefId;
		self.slots.push(Slot {
			kind,
			value: None,
			uses: 0,
			_pin: value.clone(),
		});
		self.by_identity.insert(identity, id);
		id
	}

	/// Stores the encoded contents of a reserved entry.
	pub fn fill(&mut self, id: RefId, value: SerializedValue) {
		if let Some(slot) = self.slots.get_mut(id as usize) {
			slot.value = Some(value);
		}
	}

	/// Records one more occurrence of `id` in the output.
	pub fn note_use(&mut self, id: RefId) {
		if let Some(slot) = self.slots.get_mut(id as usize) {
			slot.uses += 1;
		}
	}

	/// Kind of a recorded entry.
	pub fn kind(&self, id: RefId) -> Option<RefKind> {
		self.slots.get(id as usize).map(|slot| slot.kind)
	}

	/// Occurrences of a recorded entry so far.
	pub fn uses(&self, id: RefId) -> usize {
		self.slots.get(id as usize).map_or(0, |slot| slot.uses)
	}

	/// Saves the current position so a failed island can be undone.
	pub fn checkpoint(&self) -> Checkpoint {
		Checkpoint {
			len: self.slots.len(),
			uses: self.slots.iter().map(|slot| slot.uses).collect(),
		}
	}

	/// Drops everything recorded since `checkpoint`, including uses of older entries.
	pub fn rollback(&mut self, checkpoint: Checkpoint) {
		self.slots.truncate(checkpoint.len);
		for (slot, uses) in self.slots.iter_mut().zip(checkpoint.uses) {
			slot.uses = uses;
		}
		let len = checkpoint.len as RefId;
		self.by_identity.retain(|_, id| *id < len);
	}

	/// Produces the wire entries and rewrites `roots` to match them.
	///
	/// Shared values used exactly once are inlined at their single use site.
	/// Reactive state always stays in the table. Remaining entries are
	/// renumbered from zero in recording order.
	pub fn finalize(self, roots: &mut [SerializedValue]) -> Vec<ReferenceTableEntry> {
		let mut next: RefId = 0;
		let mut mapping = Vec::with_capacity(self.slots.len());
		let mut kinds = Vec::with_capacity(self.slots.len());
		let mut values = Vec::with_capacity(self.slots.len());
		for slot in self.slots {
			let inline = slot.kind == RefKind::SharedValue && slot.uses == 1;
			if inline {
				mapping.push(None);
			} else {
				mapping.push(Some(next));
				next += 1;
			}
			kinds.push(slot.kind);
			values.push(slot.value);
		}

		for root in roots.iter_mut() {
			relink(root, &mut values, &mapping);
		}

		let mut entries = Vec::with_capacity(next as usize);
		for (index, ref_id) in mapping.iter().enumerate() {
			let Some(ref_id) = *ref_id else {
				continue;
			};
			let mut value = values[index].take().unwrap_or(SerializedValue::SpecialNull);
			relink(&mut value, &mut values, &mapping);
			entries.push(ReferenceTableEntry {
				ref_id,
				kind: kinds[index],
				value,
			});
		}

		tracing::debug!(
			recorded = mapping.len(),
			emitted = entries.len(),
			"finalized reference table"
		);
		entries
	}
}

fn relink(
	value: &mut SerializedValue,
	values: &mut [Option<SerializedValue>],
	mapping: &[Option<RefId>],
) {
	match value {
		SerializedValue::Reference(id) => {
			let index = *id as usize;
			match mapping.get(index).copied().flatten() {
				Some(new_id) => *id = new_id,
				None => {
					if let Some(mut inner) = values.get_mut(index).and_then(Option::take) {
						relink(&mut inner, values, mapping);
						*value = inner;
					}
				}
			}
		}
		SerializedValue::Array(items) => {
			for item in items {
				relink(item, values, mapping);
			}
		}
		SerializedValue::Object(fields) => {
			for item in fields.values_mut() {
				relink(item, values, mapping);
			}
		}
		SerializedValue::Primitive(_) | SerializedValue::SpecialNull => {}
	}
}

impl std::fmt::Debug for ReferenceTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReferenceTable")
			.field("len", &self.slots.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn record(table: &mut ReferenceTable, prop: &Prop, kind: RefKind, value: SerializedValue) -> RefId {
		let identity = prop.identity().unwrap();
		let id = table.reserve(identity, kind, prop);
		table.fill(id, value);
		table.note_use(id);
		id
	}

	#[rstest]
	fn test_single_use_value_is_inlined() {
		let mut table = ReferenceTable::new();
		let list = Prop::array([1]);
		let id = record(&mut table, &list, RefKind::SharedValue, SerializedValue::string("x"));
		let mut roots = vec![SerializedValue::Reference(id)];

		let entries = table.finalize(&mut roots);

		assert!(entries.is_empty());
		assert_eq!(roots, vec![SerializedValue::string("x")]);
	}

	#[rstest]
	fn test_shared_value_and_state_are_renumbered() {
		let mut table = ReferenceTable::new();
		let once = Prop::array([1]);
		let shared = Prop::array([2]);
		let state = Prop::state(3);

		let once_id = record(&mut table, &once, RefKind::SharedValue, SerializedValue::int(1));
		let shared_id = record(&mut table, &shared, RefKind::SharedValue, SerializedValue::int(2));
		table.note_use(shared_id);
		let state_id = record(&mut table, &state, RefKind::ReactiveState, SerializedValue::int(3));

		let mut roots = vec![
			SerializedValue::Array(vec![
				SerializedValue::Reference(once_id),
				SerializedValue::Reference(shared_id),
			]),
			SerializedValue::Array(vec![
				SerializedValue::Reference(shared_id),
				SerializedValue::Reference(state_id),
			]),
		];
		let entries = table.finalize(&mut roots);

		assert_eq!(
			entries,
			vec![
				ReferenceTableEntry {
					ref_id: 0,
					kind: RefKind::SharedValue,
					value: SerializedValue::int(2),
				},
				ReferenceTableEntry {
					ref_id: 1,
					kind: RefKind::ReactiveState,
					value: SerializedValue::int(3),
				},
			]
		);
		assert_eq!(
			roots[0],
			SerializedValue::Array(vec![SerializedValue::int(1), SerializedValue::Reference(0)])
		);
		assert_eq!(
			roots[1],
			SerializedValue::Array(vec![SerializedValue::Reference(0), SerializedValue::Reference(1)])
		);
	}

	#[rstest]
	fn test_lookup_by_identity() {
		let mut table = ReferenceTable::new();
		let state = Prop::state(0);
		let id = record(&mut table, &state, RefKind::ReactiveState, SerializedValue::int(0));

		assert_eq!(table.lookup(state.identity().unwrap()), Some(id));
		assert_eq!(table.kind(id), Some(RefKind::ReactiveState));
		assert_eq!(table.uses(id), 1);
	}

	#[rstest]
	fn test_rollback_discards_entries_and_uses() {
		let mut table = ReferenceTable::new();
		let state = Prop::state(0);
		let id = record(&mut table, &state, RefKind::ReactiveState, SerializedValue::int(0));

		let checkpoint = table.checkpoint();
		table.note_use(id);
		let later = Prop::array([9]);
		record(&mut table, &later, RefKind::SharedValue, SerializedValue::int(9));
		assert_eq!(table.len(), 2);

		table.rollback(checkpoint);

		assert_eq!(table.len(), 1);
		assert_eq!(table.uses(id), 1);
		assert_eq!(table.lookup(later.identity().unwrap()), None);
		assert_eq!(table.lookup(state.identity().unwrap()), Some(id));
	}

	#[rstest]
	fn test_entry_wire_shape() {
		let entry = ReferenceTableEntry {
			ref_id: 4,
			kind: RefKind::ReactiveState,
			value: SerializedValue::SpecialNull,
		};
		assert_eq!(
			serde_json::to_string(&entry).unwrap(),
			r#"{"refId":4,"kind":"state","value":{"$nil":1}}"#
		);
	}
}
