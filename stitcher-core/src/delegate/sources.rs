//! Sources and the per-type field-ownership tables the planner consumes.
//!
//! The tables are precomputed by a stitching/configuration phase; this
//! module only defines their shape and the structural satisfiability check
//! used to decide whether a source is proxiable.

use crate::spec::RequestedFields;
use crate::spec::Selection;
use crate::spec::SelectionSet;
use std::collections::HashMap;
use std::sync::Arc;

/// An independent backend capable of resolving a subset of a composite
/// type's fields, together with the structural view of the types it
/// exposes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Source {
    pub name: String,
    types: HashMap<String, SourceType>,
}

impl Source {
    pub fn new(name: impl Into<String>, types: HashMap<String, SourceType>) -> Self {
        Source {
            name: name.into(),
            types,
        }
    }

    pub(crate) fn object_type(&self, name: &str) -> Option<&SourceType> {
        self.types.get(name)
    }
}

/// An object type as exposed by one source.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SourceType {
    pub fields: HashMap<String, FieldType>,
}

impl FromIterator<(String, FieldType)> for SourceType {
    fn from_iter<I: IntoIterator<Item = (String, FieldType)>>(iter: I) -> Self {
        SourceType {
            fields: iter.into_iter().collect(),
        }
    }
}

// Primitives are taken from scalars: https://spec.graphql.org/draft/#sec-Scalars
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Named(String),
    List(Box<FieldType>),
    NonNull(Box<FieldType>),
    String,
    Int,
    Float,
    Id,
    Boolean,
}

impl FieldType {
    /// return the name of the type on which selections happen
    ///
    /// Example if we get the field `list: [User!]!`, it will return "User"
    pub fn inner_type_name(&self) -> Option<&str> {
        match self {
            FieldType::Named(name) => Some(name.as_str()),
            FieldType::List(inner) | FieldType::NonNull(inner) => inner.inner_type_name(),
            FieldType::String
            | FieldType::Int
            | FieldType::Float
            | FieldType::Id
            | FieldType::Boolean => None,
        }
    }
}

/// The field-ownership tables for one composite type.
///
/// `unique_fields` maps a field to its single owning source;
/// `non_unique_fields` maps a shared field to its candidate sources in
/// declared preference order. `selection_sets` holds, per source, the
/// selection that source requires already satisfied on the composite object
/// before it can be queried at all, and `field_selection_sets` the same
/// requirement per individual field.
#[derive(Debug, Default)]
pub struct MergedTypeInfo {
    pub type_name: String,
    pub unique_fields: HashMap<String, Arc<Source>>,
    pub non_unique_fields: HashMap<String, Vec<Arc<Source>>>,
    pub selection_sets: HashMap<String, SelectionSet>,
    pub field_selection_sets: HashMap<String, HashMap<String, SelectionSet>>,
}

impl MergedTypeInfo {
    pub fn new(type_name: impl Into<String>) -> Self {
        MergedTypeInfo {
            type_name: type_name.into(),
            ..Default::default()
        }
    }
}

/// True if every field, recursively, named in `selection_set` exists on the
/// view of `type_name` exposed by at least one of `sources`.
pub(crate) fn sources_contain_selection_set(
    sources: &[Arc<Source>],
    type_name: &str,
    selection_set: &[Selection],
) -> bool {
    let types: Vec<&SourceType> = sources
        .iter()
        .filter_map(|source| source.object_type(type_name))
        .collect();
    types_contain_selection_set(sources, &types, type_name, selection_set)
}

fn types_contain_selection_set(
    sources: &[Arc<Source>],
    types: &[&SourceType],
    type_name: &str,
    selection_set: &[Selection],
) -> bool {
    for selection in selection_set {
        match selection {
            Selection::Field(field) => {
                let field_types: Vec<&FieldType> = types
                    .iter()
                    .filter_map(|ty| ty.fields.get(&field.name))
                    .collect();
                if field_types.is_empty() {
                    return false;
                }

                if let Some(subselections) = &field.selections {
                    let inner_name = match field_types.iter().find_map(|ty| ty.inner_type_name()) {
                        Some(name) => name,
                        // sub-selecting a scalar field can never be satisfied
                        None => return false,
                    };
                    let inner_types: Vec<&SourceType> = sources
                        .iter()
                        .filter_map(|source| source.object_type(inner_name))
                        .collect();
                    if !types_contain_selection_set(sources, &inner_types, inner_name, subselections)
                    {
                        return false;
                    }
                }
            }
            Selection::InlineFragment(fragment) => {
                if fragment.condition_matches(type_name)
                    && !types_contain_selection_set(sources, types, type_name, &fragment.selections)
                {
                    return false;
                }
            }
            // requires selections are concrete and carry no named spreads
            Selection::FragmentSpread(_) => {}
        }
    }
    true
}

/// Filter a classified field set down to the fields, immediate and per
/// patch, whose field name the given source cannot serve.
pub fn fields_not_in_source(
    requested: &RequestedFields,
    source: &Source,
    type_name: &str,
) -> RequestedFields {
    let served = match source.object_type(type_name) {
        Some(ty) => ty,
        None => return requested.clone(),
    };

    let mut missing = RequestedFields::default();
    for (key, nodes) in &requested.fields {
        if !served.fields.contains_key(&nodes[0].name) {
            missing.fields.insert(key.clone(), nodes.clone());
        }
    }
    for patch in &requested.patches {
        let mut group = crate::spec::PatchGroup {
            label: patch.label.clone(),
            fields: Default::default(),
        };
        for (key, nodes) in &patch.fields {
            if !served.fields.contains_key(&nodes[0].name) {
                group.fields.insert(key.clone(), nodes.clone());
            }
        }
        missing.patches.push(group);
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_ext::Object;
    use crate::spec::collect_fields_and_patches;
    use crate::spec::Fragments;

    fn selections(value: serde_json::Value) -> Vec<Selection> {
        serde_json::from_value(value).unwrap()
    }

    fn source(name: &str, type_name: &str, fields: &[(&str, FieldType)]) -> Arc<Source> {
        let ty: SourceType = fields
            .iter()
            .map(|(name, field_type)| (name.to_string(), field_type.clone()))
            .collect();
        Arc::new(Source::new(name, [(type_name.to_string(), ty)].into()))
    }

    #[test]
    fn containment_checks_fields_recursively() {
        let reviews = Arc::new(Source::new(
            "reviews",
            [
                (
                    "User".to_string(),
                    [
                        ("id".to_string(), FieldType::Id),
                        (
                            "address".to_string(),
                            FieldType::Named("Address".to_string()),
                        ),
                    ]
                    .into_iter()
                    .collect::<SourceType>(),
                ),
                (
                    "Address".to_string(),
                    [("street".to_string(), FieldType::String)]
                        .into_iter()
                        .collect::<SourceType>(),
                ),
            ]
            .into(),
        ));

        let requires = selections(serde_json::json!([
            {"kind": "Field", "name": "id"},
            {"kind": "Field", "name": "address", "selections": [
                {"kind": "Field", "name": "street"},
            ]},
        ]));
        assert!(sources_contain_selection_set(
            &[reviews.clone()],
            "User",
            &requires
        ));

        let missing_street = selections(serde_json::json!([
            {"kind": "Field", "name": "address", "selections": [
                {"kind": "Field", "name": "zip"},
            ]},
        ]));
        assert!(!sources_contain_selection_set(
            &[reviews],
            "User",
            &missing_street
        ));
    }

    #[test]
    fn containment_unions_multiple_origins() {
        let s1 = source("s1", "User", &[("id", FieldType::Id)]);
        let s2 = source("s2", "User", &[("age", FieldType::Int)]);

        let requires = selections(serde_json::json!([
            {"kind": "Field", "name": "id"},
            {"kind": "Field", "name": "age"},
        ]));

        assert!(!sources_contain_selection_set(
            &[s1.clone()],
            "User",
            &requires
        ));
        // adding an origin can only make more selections satisfiable
        assert!(sources_contain_selection_set(&[s1, s2], "User", &requires));
    }

    #[test]
    fn missing_fields_are_filtered_per_group() {
        let s1 = source("s1", "User", &[("id", FieldType::Id)]);

        let requested = collect_fields_and_patches(
            "User",
            &selections(serde_json::json!([
                {"kind": "Field", "name": "id"},
                {"kind": "Field", "name": "age"},
                {
                    "kind": "InlineFragment",
                    "typeCondition": "User",
                    "defer": {},
                    "selections": [
                        {"kind": "Field", "name": "id"},
                        {"kind": "Field", "name": "email"},
                    ],
                },
            ])),
            &Object::default(),
            &Fragments::default(),
        );

        let missing = fields_not_in_source(&requested, &s1, "User");
        assert_eq!(
            missing.fields.keys().collect::<Vec<_>>(),
            vec![&"age".to_string()]
        );
        assert_eq!(missing.patches.len(), 1);
        assert_eq!(
            missing.patches[0].fields.keys().collect::<Vec<_>>(),
            vec![&"email".to_string()]
        );
    }
}
