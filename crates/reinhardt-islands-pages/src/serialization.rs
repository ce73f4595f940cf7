//! Island prop serialization.
//!
//! - [`value`]: the transferable value tree and its wire JSON
//! - [`reference_table`]: identity deduplication for one page
//! - [`serializer`]: props to [`SerializedValue`]

pub mod reference_table;
pub mod serializer;
pub mod value;

pub use reference_table::{Checkpoint, RefKind, ReferenceTable, ReferenceTableEntry};
pub use serializer::{serialize, serialize_props};
pub use value::{MAX_DEPTH, NIL_KEY, REF_KEY, RefId, Scalar, SerializedValue};
