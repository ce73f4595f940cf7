//! Island error types.
//!
//! One error enum covers registration, serialization, payload decoding and
//! configuration. Errors are `Clone` so a render or revival pass can collect
//! them per island instead of stopping at the first one.

use thiserror::Error;

/// Result type for island operations.
pub type IslandResult<T> = Result<T, IslandError>;

/// Island system errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum IslandError {
	/// The same module export was registered with a different component.
	#[error("island export '{export_name}' of module '{module_id}' is already registered with a different component")]
	DuplicateRegistration {
		/// Canonical module identity.
		module_id: String,
		/// Export name within the module.
		export_name: String,
	},

	/// No island is registered under this id.
	#[error("unknown island: {0}")]
	UnknownIsland(String),

	/// A prop value cannot be transferred to the client.
	#[error("cannot serialize {kind} at {path}")]
	UnserializableValue {
		/// Prop path, e.g. `props.items[2]`.
		path: String,
		/// What kind of value was found.
		kind: &'static str,
	},

	/// The embedded payload does not follow the wire format.
	#[error("malformed island payload: {0}")]
	MalformedPayload(String),

	/// A suspended view had not resolved when the island was revived.
	#[error("island view is still pending")]
	PendingView,

	/// Invalid island options.
	#[error("invalid island configuration: {0}")]
	Config(String),
}

impl IslandError {
	/// Builds a [`IslandError::MalformedPayload`] from anything displayable.
	pub fn malformed(message: impl std::fmt::Display) -> Self {
		Self::MalformedPayload(message.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_duplicate_registration_display() {
		let err = IslandError::DuplicateRegistration {
			module_id: "/app/islands/Counter.rs".to_string(),
			export_name: "Counter".to_string(),
		};
		assert_eq!(
			err.to_string(),
			"island export 'Counter' of module '/app/islands/Counter.rs' is already registered with a different component"
		);
	}

	#[rstest]
	fn test_unserializable_value_display() {
		let err = IslandError::UnserializableValue {
			path: "props.onClick".to_string(),
			kind: "function",
		};
		assert_eq!(err.to_string(), "cannot serialize function at props.onClick");
	}

	#[rstest]
	#[case(IslandError::UnknownIsland("Missing".into()), "unknown island: Missing")]
	#[case(IslandError::malformed("bad kind"), "malformed island payload: bad kind")]
	#[case(IslandError::Config("lang".into()), "invalid island configuration: lang")]
	#[case(IslandError::PendingView, "island view is still pending")]
	fn test_simple_error_display(#[case] err: IslandError, #[case] expected: &str) {
		assert_eq!(err.to_string(), expected);
	}
}
