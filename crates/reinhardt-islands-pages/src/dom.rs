//! Client document model.
//!
//! Revival runs against an in-memory arena of DOM nodes parsed from the
//! server's HTML. It offers the node operations the revival engine needs
//! (anchor lookup, insertion, removal, attributes, event dispatch) and
//! serializes back to HTML for inspection.

mod document;

pub use document::{AnchorSite, Document, NodeKey, NodeKind};

use std::fmt;

/// DOM event types handled by views.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
	/// `click`
	Click,
	/// `dblclick`
	DblClick,
	/// `input`
	Input,
	/// `change`
	Change,
	/// `submit`
	Submit,
	/// `focus`
	Focus,
	/// `blur`
	Blur,
	/// `keydown`
	KeyDown,
	/// `keyup`
	KeyUp,
	/// Any other event, by name.
	Custom(String),
}

impl EventType {
	/// The DOM event name.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Click => "click",
			Self::DblClick => "dblclick",
			Self::Input => "input",
			Self::Change => "change",
			Self::Submit => "submit",
			Self::Focus => "focus",
			Self::Blur => "blur",
			Self::KeyDown => "keydown",
			Self::KeyUp => "keyup",
			Self::Custom(name) => name,
		}
	}

	/// Parses a DOM event name. Unknown names become [`EventType::Custom`].
	pub fn from_name(name: &str) -> Self {
		match name {
			"click" => Self::Click,
			"dblclick" => Self::DblClick,
			"input" => Self::Input,
			"change" => Self::Change,
			"submit" => Self::Submit,
			"focus" => Self::Focus,
			"blur" => Self::Blur,
			"keydown" => Self::KeyDown,
			"keyup" => Self::KeyUp,
			other => Self::Custom(other.to_string()),
		}
	}
}

impl fmt::Display for EventType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
