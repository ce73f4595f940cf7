//! Options for rendering pages that contain islands.

use serde::{Deserialize, Serialize};

use crate::error::{IslandError, IslandResult};

/// Default id of the payload `<script>` element.
pub const DEFAULT_PAYLOAD_ID: &str = "rh-islands";

/// Options for island rendering.
///
/// Options can be built in code or loaded from TOML:
///
/// ```
/// use reinhardt_islands_pages::IslandOptions;
///
/// let options = IslandOptions::from_toml_str(r#"
/// lang = "ja"
/// minify = true
/// "#).unwrap();
///
/// assert_eq!(options.lang, "ja");
/// assert!(options.isolate_island_errors);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IslandOptions {
	/// Language attribute for the generated `<html>` element.
	pub lang: String,
	/// Whether to collapse whitespace in the rendered document.
	pub minify: bool,
	/// Whether a failing island is dropped from the page instead of failing the whole render.
	pub isolate_island_errors: bool,
	/// Id of the payload `<script>` element.
	pub payload_id: String,
}

impl Default for IslandOptions {
	fn default() -> Self {
		Self {
			lang: "en".to_string(),
			minify: false,
			isolate_island_errors: true,
			payload_id: DEFAULT_PAYLOAD_ID.to_string(),
		}
	}
}

impl IslandOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses options from a TOML document. Missing keys take their defaults.
	pub fn from_toml_str(source: &str) -> IslandResult<Self> {
		let options: Self = toml::from_str(source).map_err(|e| IslandError::Config(e.to_string()))?;
		options.validate()?;
		Ok(options)
	}

	/// Sets the language.
	pub fn lang(mut self, lang: impl Into<String>) -> Self {
		self.lang = lang.into();
		self
	}

	/// Enables minification.
	pub fn minify(mut self) -> Self {
		self.minify = true;
		self
	}

	/// Chooses whether island failures are isolated.
	pub fn isolate_island_errors(mut self, isolate: bool) -> Self {
		self.isolate_island_errors = isolate;
		self
	}

	/// Sets the payload element id.
	pub fn payload_id(mut self, id: impl Into<String>) -> Self {
		self.payload_id = id.into();
		self
	}

	/// Checks values that would produce broken markup.
	pub fn validate(&self) -> IslandResult<()> {
		let valid_id = !self.payload_id.is_empty()
			&& self
				.payload_id
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
		if !valid_id {
			return Err(IslandError::Config(format!(
				"payload_id must be a non-empty [A-Za-z0-9_-] identifier, got {:?}",
				self.payload_id
			)));
		}
		if self.lang.contains(['"', '<', '>']) {
			return Err(IslandError::Config(format!(
				"lang contains markup characters: {:?}",
				self.lang
			)));
		}
		Ok(())
	}
}
