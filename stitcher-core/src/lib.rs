//! Execution-time engine for stitched/federated composite results.
//!
//! Given a composite type whose fields are spread across several independent
//! sources, this crate decides which sources still need to be queried to fill
//! in missing fields, merges whatever those sources return into one
//! provenance-tracked object, and reconciles incremental (`@defer`-style)
//! source streams into point-queryable state.
//!
//! Parsing and validating the query language, the wire transport used to
//! execute a selection against a source, and the construction of the
//! per-type field-ownership tables are all owned by external collaborators.

macro_rules! failfast_debug {
    ($($tokens:tt)+) => {{
        tracing::debug!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

macro_rules! failfast_error {
    ($($tokens:tt)+) => {{
        tracing::error!($($tokens)+);
        #[cfg(feature = "failfast")]
        panic!(
            "failfast triggered. \
            Please remove the feature failfast if you don't want to see these panics"
        );
    }};
}

mod context;
pub mod delegate;
mod error;
mod json_ext;
mod response;
mod spec;

pub use context::Context;
pub use error::Error;
pub use error::FetchError;
pub use error::Location;
pub use json_ext::Object;
pub use json_ext::Path;
pub use json_ext::PathElement;
pub use json_ext::ValueExt;
pub use response::Response;
pub use response::ResponseStream;
pub use spec::collect_fields_and_patches;
pub use spec::Condition;
pub use spec::Defer;
pub use spec::Field;
pub use spec::FieldGroup;
pub use spec::Fragment;
pub use spec::Fragments;
pub use spec::FragmentSpread;
pub use spec::InlineFragment;
pub use spec::PatchGroup;
pub use spec::RequestedFields;
pub use spec::Selection;
pub use spec::SelectionSet;
