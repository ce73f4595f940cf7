//! Render-time prop values.
//!
//! Islands receive their inputs as [`Props`], an insertion-ordered map of
//! [`Prop`] values. Composite values are reference counted: cloning an
//! `Array` or `Object` prop shares the allocation, and that sharing is what the
//! payload serializer preserves across islands.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use reinhardt_reactive::Signal;
use serde_json::{Map, Number, Value};

/// Event callback carried by a prop. Never transferable to the client.
pub type Callback = Rc<dyn Fn()>;

/// Opaque server-side object, such as a database handle, passed as a prop.
#[derive(Clone)]
pub struct HostObject {
	type_name: &'static str,
	inner: Rc<dyn Any>,
}

impl HostObject {
	/// Wraps any value.
	pub fn new<T: Any>(value: T) -> Self {
		Self {
			type_name: std::any::type_name::<T>(),
			inner: Rc::new(value),
		}
	}

	/// Rust type name of the wrapped value.
	pub fn type_name(&self) -> &'static str {
		self.type_name
	}

	/// Returns the wrapped value if it is a `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.inner.downcast_ref()
	}
}

/// A single prop value.
#[derive(Clone)]
pub enum Prop {
	/// No value at all. Encoded as the special null.
	Undefined,
	/// JSON `null`.
	Null,
	/// Boolean.
	Bool(bool),
	/// Number.
	Number(Number),
	/// String.
	String(String),
	/// Shared sequence.
	Array(Rc<Vec<Prop>>),
	/// Shared ordered map.
	Object(Rc<Props>),
	/// Reactive state shared by reference.
	State(Signal<Prop>),
	/// Function value.
	Callback(Callback),
	/// Opaque host object.
	Host(HostObject),
}

impl Prop {
	/// Creates an array prop.
	pub fn array<I, T>(items: I) -> Self
	where
		I: IntoIterator<Item = T>,
		T: Into<Prop>,
	{
		Self::Array(Rc::new(items.into_iter().map(Into::into).collect()))
	}

	/// Creates an object prop.
	pub fn object(props: Props) -> Self {
		Self::Object(Rc::new(props))
	}

	/// Creates a fresh signal holding `initial` and wraps it.
	pub fn state(initial: impl Into<Prop>) -> Self {
		Self::State(Signal::new(initial.into()))
	}

	/// Creates a callback prop.
	pub fn callback(f: impl Fn() + 'static) -> Self {
		Self::Callback(Rc::new(f))
	}

	/// Short name of the variant, used in error messages.
	pub fn kind_name(&self) -> &'static str {
		match self {
			Self::Undefined => "undefined",
			Self::Null => "null",
			Self::Bool(_) => "boolean",
			Self::Number(_) => "number",
			Self::String(_) => "string",
			Self::Array(_) => "array",
			Self::Object(_) => "object",
			Self::State(_) => "state",
			Self::Callback(_) => "function",
			Self::Host(_) => "host object",
		}
	}

	/// Allocation identity of composite and reactive values.
	///
	/// Two props with the same identity are the same object.
	pub fn identity(&self) -> Option<usize> {
		match self {
			Self::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
			Self::Object(props) => Some(Rc::as_ptr(props) as *const () as usize),
			Self::State(signal) => Some(signal.identity()),
			_ => None,
		}
	}

	/// Returns `true` for [`Prop::Undefined`].
	pub fn is_undefined(&self) -> bool {
		matches!(self, Self::Undefined)
	}

	/// Returns `true` for [`Prop::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	/// Boolean value, if any.
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	/// Integer value, if the number fits.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Number(n) => n.as_i64(),
			_ => None,
		}
	}

	/// Floating point value of a number.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Self::Number(n) => n.as_f64(),
			_ => None,
		}
	}

	/// String value, if any.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Array items, if any.
	pub fn as_array(&self) -> Option<&[Prop]> {
		match self {
			Self::Array(items) => Some(items),
			_ => None,
		}
	}

	/// Object fields, if any.
	pub fn as_object(&self) -> Option<&Props> {
		match self {
			Self::Object(props) => Some(props),
			_ => None,
		}
	}

	/// Signal behind a state prop.
	pub fn as_signal(&self) -> Option<&Signal<Prop>> {
		match self {
			Self::State(signal) => Some(signal),
			_ => None,
		}
	}

	/// Callback, if any.
	pub fn as_callback(&self) -> Option<&Callback> {
		match self {
			Self::Callback(f) => Some(f),
			_ => None,
		}
	}

	/// Plain JSON view of the value.
	///
	/// State is read through its signal (so an effect calling this re-runs when
	/// it changes). Values JSON cannot hold become `null` in arrays and are
	/// skipped in objects.
	pub fn to_json(&self) -> Value {
		self.to_json_inner(&mut Vec::new())
			.unwrap_or(Value::Null)
	}

	fn to_json_inner(&self, active: &mut Vec<usize>) -> Option<Value> {
		match self {
			Self::Undefined | Self::Callback(_) | Self::Host(_) => None,
			Self::Null => Some(Value::Null),
			Self::Bool(b) => Some(Value::Bool(*b)),
			Self::Number(n) => Some(Value::Number(n.clone())),
			Self::String(s) => Some(Value::String(s.clone())),
			Self::Array(items) => Some(Value::Array(
				items
					.iter()
					.map(|item| item.to_json_inner(active).unwrap_or(Value::Null))
					.collect(),
			)),
			Self::Object(props) => Some(Value::Object(props.to_json_map(active))),
			Self::State(signal) => {
				let identity = signal.identity();
				if active.contains(&identity) {
					return Some(Value::Null);
				}
				active.push(identity);
				let value = signal.with(|value| value.to_json_inner(active));
				active.pop();
				value
			}
		}
	}
}

impl PartialEq for Prop {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Number(a), Self::Number(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b) || a == b,
			(Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b) || a == b,
			(Self::State(a), Self::State(b)) => a.ptr_eq(b),
			(Self::Callback(a), Self::Callback(b)) => Rc::ptr_eq(a, b),
			(Self::Host(a), Self::Host(b)) => Rc::ptr_eq(&a.inner, &b.inner),
			_ => false,
		}
	}
}

impl fmt::Debug for Prop {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Undefined => f.write_str("Undefined"),
			Self::Null => f.write_str("Null"),
			Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
			Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
			Self::String(s) => f.debug_tuple("String").field(s).finish(),
			Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
			Self::Object(props) => f.debug_tuple("Object").field(props).finish(),
			// The value may contain the state itself
			Self::State(signal) => f.debug_tuple("State").field(&signal.id()).finish(),
			Self::Callback(_) => f.write_str("Callback(..)"),
			Self::Host(host) => f.debug_tuple("Host").field(&host.type_name).finish(),
		}
	}
}

impl From<bool> for Prop {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i32> for Prop {
	fn from(value: i32) -> Self {
		Self::Number(value.into())
	}
}

impl From<i64> for Prop {
	fn from(value: i64) -> Self {
		Self::Number(value.into())
	}
}

impl From<u64> for Prop {
	fn from(value: u64) -> Self {
		Self::Number(value.into())
	}
}

impl From<f64> for Prop {
	/// Non-finite numbers become `null`, as in JSON.
	fn from(value: f64) -> Self {
		Number::from_f64(value).map_or(Self::Null, Self::Number)
	}
}

impl From<&str> for Prop {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for Prop {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<Vec<Prop>> for Prop {
	fn from(value: Vec<Prop>) -> Self {
		Self::Array(Rc::new(value))
	}
}

impl From<Props> for Prop {
	fn from(value: Props) -> Self {
		Self::Object(Rc::new(value))
	}
}

impl From<Signal<Prop>> for Prop {
	fn from(value: Signal<Prop>) -> Self {
		Self::State(value)
	}
}

impl From<HostObject> for Prop {
	fn from(value: HostObject) -> Self {
		Self::Host(value)
	}
}

impl<T: Into<Prop>> From<Option<T>> for Prop {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Undefined, Into::into)
	}
}

impl From<Value> for Prop {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(b) => Self::Bool(b),
			Value::Number(n) => Self::Number(n),
			Value::String(s) => Self::String(s),
			Value::Array(items) => Self::Array(Rc::new(items.into_iter().map(Prop::from).collect())),
			Value::Object(map) => Self::Object(Rc::new(
				map.into_iter().map(|(k, v)| (k, Prop::from(v))).collect(),
			)),
		}
	}
}

/// Insertion-ordered props of one island.
#[derive(Clone, Default, PartialEq)]
pub struct Props(IndexMap<String, Prop>);

impl Props {
	/// Creates empty props.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Prop>) -> Self {
		self.0.insert(key.into(), value.into());
		self
	}

	/// Inserts a value, returning the previous one.
	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Prop>) -> Option<Prop> {
		self.0.insert(key.into(), value.into())
	}

	/// Looks up a prop.
	pub fn get(&self, key: &str) -> Option<&Prop> {
		self.0.get(key)
	}

	/// Looks up a state prop and returns its signal.
	pub fn signal(&self, key: &str) -> Option<&Signal<Prop>> {
		self.get(key).and_then(Prop::as_signal)
	}

	/// Whether `key` is present (even if undefined).
	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	/// Number of props.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether there are no props.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates in insertion order.
	pub fn iter(&self) -> indexmap::map::Iter<'_, String, Prop> {
		self.0.iter()
	}

	/// Plain JSON object view; see [`Prop::to_json`].
	pub fn to_json(&self) -> Value {
		Value::Object(self.to_json_map(&mut Vec::new()))
	}

	fn to_json_map(&self, active: &mut Vec<usize>) -> Map<String, Value> {
		self.0
			.iter()
			.filter_map(|(key, value)| Some((key.clone(), value.to_json_inner(active)?)))
			.collect()
	}
}

impl fmt::Debug for Props {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.0.iter()).finish()
	}
}

impl<K: Into<String>, V: Into<Prop>> FromIterator<(K, V)> for Props {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

impl<'a> IntoIterator for &'a Props {
	type Item = (&'a String, &'a Prop);
	type IntoIter = indexmap::map::Iter<'a, String, Prop>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_props_preserve_insertion_order() {
		let props = Props::new().with("z", 1).with("a", 2).with("m", 3);
		let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
		assert_eq!(keys, vec!["z", "a", "m"]);
	}

	#[rstest]
	fn test_identity_follows_allocation() {
		let shared = Prop::array([1, 2]);
		let alias = shared.clone();
		let copy = Prop::array([1, 2]);

		assert_eq!(shared.identity(), alias.identity());
		assert_ne!(shared.identity(), copy.identity());
		assert_eq!(shared, copy);
		assert_eq!(Prop::from(1).identity(), None);
	}

	#[rstest]
	fn test_state_equality_is_by_reference() {
		let a = Prop::state(1);
		let b = Prop::state(1);
		assert_eq!(a, a.clone());
		assert_ne!(a, b);
	}

	#[rstest]
	fn test_to_json_reads_state_and_skips_untransferable() {
		let props = Props::new()
			.with("count", Prop::state(3))
			.with("missing", Prop::Undefined)
			.with("onClick", Prop::callback(|| {}))
			.with("list", Prop::array([Prop::from("a"), Prop::Undefined]));

		assert_eq!(props.to_json(), json!({"count": 3, "list": ["a", null]}));
	}

	#[rstest]
	fn test_to_json_handles_self_referencing_state() {
		let signal = Signal::new(Prop::Null);
		signal.set(Prop::from(Props::new().with("me", signal.clone())));

		assert_eq!(Prop::State(signal.clone()).to_json(), json!({"me": null}));

		// Break the cycle so the signal is freed.
		signal.set(Prop::Null);
	}

	#[rstest]
	fn test_from_json_value() {
		let prop = Prop::from(json!({"foo": 123, "tags": ["x"], "ok": true}));
		let object = prop.as_object().unwrap();

		assert_eq!(object.get("foo").and_then(Prop::as_i64), Some(123));
		assert_eq!(object.get("tags").and_then(Prop::as_array).map(<[Prop]>::len), Some(1));
		assert_eq!(object.get("ok").and_then(Prop::as_bool), Some(true));
	}

	#[rstest]
	#[case(f64::NAN)]
	#[case(f64::INFINITY)]
	fn test_non_finite_numbers_become_null(#[case] value: f64) {
		assert!(Prop::from(value).is_null());
	}

	#[rstest]
	fn test_host_object_downcast() {
		let host = HostObject::new(42_u8);
		assert_eq!(host.downcast_ref::<u8>(), Some(&42));
		assert!(host.type_name().contains("u8"));
		assert_eq!(Prop::from(host).kind_name(), "host object");
	}
}
