//! Client-side island revival.
//!
//! - [`decoder`]: payload text to instances plus reference table
//! - [`refs`]: live objects shared between revived islands
//! - [`revival`]: anchor matching and mounting
//! - [`runtime`]: revival-complete state and listeners
//!
//! ## Example
//!
//! ```
//! use reinhardt_islands_pages::{Document, IslandRegistry, revive_document};
//!
//! let document = Document::parse(
//!     r#"<html><body><script id="rh-islands" type="application/json">{"refs":[],"instances":[]}</script></body></html>"#,
//! );
//! let report = revive_document(&IslandRegistry::new(), &document, "rh-islands").unwrap();
//! assert!(report.is_complete());
//! ```

pub mod decoder;
pub mod refs;
pub mod revival;
pub mod runtime;

pub use decoder::{DecodedPayload, decode};
pub use refs::ClientReferenceTable;
pub use revival::{RevivalEngine, RevivalFailure, RevivalReport, revive_document};
pub use runtime::{init_revival_state, is_revival_complete, on_revival_complete};
