mod collect;
mod fragments;
mod selection;

pub use collect::collect_fields_and_patches;
pub(crate) use collect::response_keys;
pub use collect::FieldGroup;
pub use collect::PatchGroup;
pub use collect::RequestedFields;
pub use fragments::Fragment;
pub use fragments::Fragments;
pub use selection::Condition;
pub use selection::Defer;
pub use selection::Field;
pub use selection::FragmentSpread;
pub use selection::InlineFragment;
pub use selection::Selection;
pub use selection::SelectionSet;
