//! Delegation of a composite object's remaining fields to the sources that
//! own them, and reconciliation of what comes back.

mod external;
pub mod incremental;
pub(crate) mod merge_fields;
mod receiver;
mod registry;
mod resolver;
mod sources;

pub use external::CompositeObject;
pub use merge_fields::merge_fields;
pub use receiver::Receiver;
pub use registry::SourceRegistry;
pub use registry::SourceResolver;
pub use resolver::resolve_merged_field;
pub use sources::fields_not_in_source;
pub use sources::FieldType;
pub use sources::MergedTypeInfo;
pub use sources::Source;
pub use sources::SourceType;
