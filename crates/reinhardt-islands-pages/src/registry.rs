//! Island Registry
//!
//! Maps `(module, export name)` pairs to stable island ids and the component
//! they name. Registration happens at configuration time, before any page is
//! rendered; afterwards the registry is only read.
//!
//! ## Static registration
//!
//! Islands can also be declared next to their component with `inventory` and
//! loaded in one call:
//!
//! ```ignore
//! use reinhardt_islands_pages::{ComponentRef, IslandExport, IslandRegistry, register_static_islands};
//!
//! fn counter_export() -> ComponentRef {
//!     ComponentRef::new(counter)
//! }
//!
//! inventory::submit! {
//!     IslandExport::new(file!(), "Counter", counter_export)
//! }
//!
//! register_static_islands(IslandRegistry::global())?;
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::component::{ComponentRef, Island};
use crate::error::{IslandError, IslandResult};

/// Export name that falls back to the module's file stem.
pub const DEFAULT_EXPORT: &str = "default";

/// Canonical identity of the module (source file) an island is exported from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(String);

impl ModuleId {
	/// Derives the module identity from a path.
	///
	/// Existing files are canonicalized by the file system. Other paths are
	/// made absolute against the working directory and normalized lexically,
	/// so `a/./b.rs` and `a/c/../b.rs` name the same module either way.
	pub fn from_path(path: impl AsRef<Path>) -> Self {
		let path = path.as_ref();
		let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| normalize(path));
		Self(resolved.to_string_lossy().into_owned())
	}

	/// The canonical path as a string.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// File name without extension.
	pub fn file_stem(&self) -> Option<&str> {
		Path::new(&self.0).file_stem().and_then(|stem| stem.to_str())
	}
}

impl fmt::Display for ModuleId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

fn normalize(path: &Path) -> PathBuf {
	let absolute = if path.is_absolute() {
		path.to_path_buf()
	} else {
		std::env::current_dir()
			.map(|cwd| cwd.join(path))
			.unwrap_or_else(|_| path.to_path_buf())
	};

	let mut normalized = PathBuf::new();
	for component in absolute.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				normalized.pop();
			}
			other => normalized.push(other.as_os_str()),
		}
	}
	normalized
}

/// Stable island id as written in payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IslandId(String);

impl IslandId {
	/// Wraps an id string.
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	/// The id as a string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for IslandId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for IslandId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for IslandId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&IslandId> for IslandId {
	fn from(id: &IslandId) -> Self {
		id.clone()
	}
}

/// A registered island. Immutable once registered.
#[derive(Debug, Clone)]
pub struct IslandDefinition {
	/// Island id.
	pub id: IslandId,
	/// Module the island is exported from.
	pub module_id: ModuleId,
	/// Export name within the module.
	pub export_name: String,
	/// The component.
	pub component: ComponentRef,
}

#[derive(Default)]
struct RegistryState {
	by_export: HashMap<(ModuleId, String), IslandId>,
	definitions: IndexMap<IslandId, IslandDefinition>,
	by_type: HashMap<TypeId, IslandId>,
}

/// Append-only island registry.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct IslandRegistry {
	state: Arc<RwLock<RegistryState>>,
}

impl IslandRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Process-wide registry.
	pub fn global() -> &'static IslandRegistry {
		static GLOBAL: OnceLock<IslandRegistry> = OnceLock::new();
		GLOBAL.get_or_init(IslandRegistry::new)
	}

	/// Registers `component` as export `export_name` of the module at `module_path`.
	///
	/// Registering the same pair again with the same component returns the
	/// existing id; with a different component it fails.
	pub fn register<C: Island>(
		&self,
		module_path: impl AsRef<Path>,
		export_name: &str,
		component: C,
	) -> IslandResult<IslandId> {
		self.register_component(module_path, export_name, ComponentRef::new(component))
	}

	/// Type-erased form of [`register`](Self::register).
	pub fn register_component(
		&self,
		module_path: impl AsRef<Path>,
		export_name: &str,
		component: ComponentRef,
	) -> IslandResult<IslandId> {
		let module_id = ModuleId::from_path(module_path);
		let key = (module_id.clone(), export_name.to_string());

		let mut state = self.state.write();
		if let Some(id) = state.by_export.get(&key) {
			let existing = &state.definitions[id];
			if existing.component.same_component(&component) {
				return Ok(id.clone());
			}
			return Err(IslandError::DuplicateRegistration {
				module_id: module_id.to_string(),
				export_name: export_name.to_string(),
			});
		}

		let base = if export_name == DEFAULT_EXPORT {
			module_id.file_stem().unwrap_or(export_name)
		} else {
			export_name
		};
		let id = unique_id(&sanitize(base), &state.definitions);

		tracing::debug!(
			island = %id,
			module = %module_id,
			export = export_name,
			component = component.type_name(),
			"registered island"
		);

		state
			.by_type
			.entry(component.type_id())
			.or_insert_with(|| id.clone());
		state.by_export.insert(key, id.clone());
		state.definitions.insert(
			id.clone(),
			IslandDefinition {
				id: id.clone(),
				module_id,
				export_name: export_name.to_string(),
				component,
			},
		);
		Ok(id)
	}

	/// Looks up a definition.
	pub fn resolve(&self, id: &IslandId) -> IslandResult<IslandDefinition> {
		self.state
			.read()
			.definitions
			.get(id)
			.cloned()
			.ok_or_else(|| IslandError::UnknownIsland(id.to_string()))
	}

	/// Id of the first registration of component type `C`.
	pub fn island_id_of<C: Island>(&self) -> Option<IslandId> {
		self.state.read().by_type.get(&TypeId::of::<C>()).cloned()
	}

	/// Same as [`island_id_of`](Self::island_id_of), inferring `C` from a value.
	///
	/// Handy for function items, whose types cannot be named.
	pub fn id_of<C: Island>(&self, _component: &C) -> Option<IslandId> {
		self.island_id_of::<C>()
	}

	/// Whether `id` is registered.
	pub fn contains(&self, id: &IslandId) -> bool {
		self.state.read().definitions.contains_key(id)
	}

	/// All definitions in registration order.
	pub fn definitions(&self) -> Vec<IslandDefinition> {
		self.state.read().definitions.values().cloned().collect()
	}

	/// Number of registered islands.
	pub fn len(&self) -> usize {
		self.state.read().definitions.len()
	}

	/// Whether no island is registered.
	pub fn is_empty(&self) -> bool {
		self.state.read().definitions.is_empty()
	}
}

impl fmt::Debug for IslandRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.read();
		f.debug_struct("IslandRegistry")
			.field("islands", &state.definitions.keys().collect::<Vec<_>>())
			.finish()
	}
}

fn sanitize(name: &str) -> String {
	let mut id: String = name
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
		.collect();
	if id.is_empty() || id.starts_with(|c: char| c.is_ascii_digit()) {
		id.insert(0, '_');
	}
	id
}

fn unique_id(base: &str, taken: &IndexMap<IslandId, IslandDefinition>) -> IslandId {
	let candidate = IslandId::new(base);
	if !taken.contains_key(&candidate) {
		return candidate;
	}
	(1..)
		.map(|n| IslandId::new(format!("{base}_{n}")))
		.find(|candidate| !taken.contains_key(candidate))
		.unwrap_or(candidate)
}

/// Compile-time island declaration, collected with `inventory`.
pub struct IslandExport {
	/// Path of the module exporting the island (usually `file!()`).
	pub module_path: &'static str,
	/// Export name.
	pub export_name: &'static str,
	/// Builds the component handle.
	pub component: fn() -> ComponentRef,
}

impl IslandExport {
	/// Creates a declaration, usable inside `inventory::submit!`.
	pub const fn new(
		module_path: &'static str,
		export_name: &'static str,
		component: fn() -> ComponentRef,
	) -> Self {
		Self {
			module_path,
			export_name,
			component,
		}
	}
}

inventory::collect!(IslandExport);

/// Registers every [`IslandExport`] linked into the binary.
///
/// Exports are registered sorted by module path and export name, so ids do
/// not depend on link order.
pub fn register_static_islands(registry: &IslandRegistry) -> IslandResult<Vec<IslandId>> {
	let mut exports: Vec<&IslandExport> = inventory::iter::<IslandExport>.into_iter().collect();
	exports.sort_by(|a, b| {
		(a.module_path, a.export_name).cmp(&(b.module_path, b.export_name))
	});

	let mut ids = Vec::with_capacity(exports.len());
	for export in exports {
		ids.push(registry.register_component(
			export.module_path,
			export.export_name,
			(export.component)(),
		)?);
	}
	tracing::info!(count = ids.len(), "registered static islands");
	Ok(ids)
}
