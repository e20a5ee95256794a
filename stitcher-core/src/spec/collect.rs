//! Classification of a selection set into an immediate field group and an
//! ordered list of deferred patch groups.

use crate::json_ext::Object;
use crate::spec::fragments::Fragments;
use crate::spec::selection::Field;
use crate::spec::selection::Selection;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Field nodes grouped by response key, in first-occurrence order. Multiple
/// nodes may share a response key when a field is selected more than once
/// within one selection set.
pub type FieldGroup = IndexMap<String, Vec<Field>>;

/// The fields of one deferred fragment, delivered as a later patch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchGroup {
    /// The label carried by the defer directive, if any.
    pub label: Option<String>,

    pub fields: FieldGroup,
}

/// The classified form of a selection set: the fields to resolve
/// immediately, and one group per deferred fragment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestedFields {
    pub fields: FieldGroup,
    pub patches: Vec<PatchGroup>,
}

impl RequestedFields {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.patches.iter().all(|patch| patch.fields.is_empty())
    }
}

/// Walk `selection_set` against the runtime type `type_name`, splitting it
/// into an immediate field group and deferred patch groups.
///
/// Fragments (inline or spread) whose type condition does not match the
/// runtime type are skipped, as are selections excluded by `@skip` /
/// `@include`. A fragment carrying `@defer` with `if` not explicitly false
/// starts a new, empty group: deferred content is isolated from the
/// immediate group and from sibling patches.
#[tracing::instrument(skip_all, level = "trace")]
pub fn collect_fields_and_patches(
    type_name: &str,
    selection_set: &[Selection],
    variables: &Object,
    fragments: &Fragments,
) -> RequestedFields {
    let mut requested = RequestedFields::default();
    let mut visited = HashSet::new();
    collect_into(
        type_name,
        selection_set,
        variables,
        fragments,
        &mut requested.fields,
        &mut requested.patches,
        &mut visited,
    );
    requested
}

fn collect_into(
    type_name: &str,
    selection_set: &[Selection],
    variables: &Object,
    fragments: &Fragments,
    fields: &mut FieldGroup,
    patches: &mut Vec<PatchGroup>,
    visited: &mut HashSet<String>,
) {
    for selection in selection_set {
        match selection {
            Selection::Field(field) => {
                if !field.included(variables) {
                    continue;
                }
                fields
                    .entry(field.response_key().to_string())
                    .or_default()
                    .push(field.clone());
            }
            Selection::InlineFragment(fragment) => {
                if !fragment.included(variables) || !fragment.condition_matches(type_name) {
                    continue;
                }

                match fragment
                    .defer
                    .as_ref()
                    .filter(|defer| defer.is_active(variables))
                {
                    Some(defer) => {
                        let mut patch_fields = FieldGroup::default();
                        collect_into(
                            type_name,
                            &fragment.selections,
                            variables,
                            fragments,
                            &mut patch_fields,
                            patches,
                            visited,
                        );
                        patches.push(PatchGroup {
                            label: defer.label.clone(),
                            fields: patch_fields,
                        });
                    }
                    None => collect_into(
                        type_name,
                        &fragment.selections,
                        variables,
                        fragments,
                        fields,
                        patches,
                        visited,
                    ),
                }
            }
            Selection::FragmentSpread(spread) => {
                if !spread.included(variables) {
                    continue;
                }

                let defer = spread
                    .defer
                    .as_ref()
                    .filter(|defer| defer.is_active(variables));

                // cannot short-circuit an already-visited spread when it is
                // deferred, because its fields must be recollected for the patch
                if visited.contains(&spread.name) && defer.is_none() {
                    continue;
                }
                visited.insert(spread.name.clone());

                let fragment = match fragments.get(&spread.name) {
                    Some(fragment) => fragment,
                    None => {
                        failfast_debug!("cannot find fragment {:?}", spread.name);
                        continue;
                    }
                };
                if fragment.type_condition != type_name {
                    continue;
                }

                match defer {
                    Some(defer) => {
                        let mut patch_fields = FieldGroup::default();
                        collect_into(
                            type_name,
                            &fragment.selection_set,
                            variables,
                            fragments,
                            &mut patch_fields,
                            patches,
                            visited,
                        );
                        patches.push(PatchGroup {
                            label: defer.label.clone(),
                            fields: patch_fields,
                        });
                    }
                    None => collect_into(
                        type_name,
                        &fragment.selection_set,
                        variables,
                        fragments,
                        fields,
                        patches,
                        visited,
                    ),
                }
            }
        }
    }
}

/// All response keys a selection set asks of the given type, immediate and
/// deferred alike, in first-occurrence order.
pub(crate) fn response_keys(type_name: &str, selection_set: &[Selection]) -> Vec<String> {
    let requested = collect_fields_and_patches(
        type_name,
        selection_set,
        &Object::default(),
        &Fragments::default(),
    );
    let mut keys: Vec<String> = requested.fields.keys().cloned().collect();
    for patch in &requested.patches {
        for key in patch.fields.keys() {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::fragments::Fragment;
    use serde_json_bytes::json;

    fn selections(value: serde_json::Value) -> Vec<Selection> {
        serde_json::from_value(value).unwrap()
    }

    fn keys(group: &FieldGroup) -> Vec<&str> {
        group.keys().map(|k| k.as_str()).collect()
    }

    #[test]
    fn plain_selection_has_no_patches() {
        let selection_set = selections(serde_json::json!([
            {"kind": "Field", "name": "id"},
            {"kind": "Field", "name": "name", "alias": "title"},
            {
                "kind": "InlineFragment",
                "typeCondition": "User",
                "selections": [{"kind": "Field", "name": "email"}],
            },
        ]));

        let requested = collect_fields_and_patches(
            "User",
            &selection_set,
            &Object::default(),
            &Fragments::default(),
        );

        assert!(requested.patches.is_empty());
        assert_eq!(keys(&requested.fields), vec!["id", "title", "email"]);
    }

    #[test]
    fn top_level_defer_is_isolated() {
        let selection_set = selections(serde_json::json!([
            {"kind": "Field", "name": "id"},
            {
                "kind": "InlineFragment",
                "typeCondition": "Query",
                "defer": {"label": "slow"},
                "selections": [{"kind": "Field", "name": "test"}],
            },
        ]));

        let requested = collect_fields_and_patches(
            "Query",
            &selection_set,
            &Object::default(),
            &Fragments::default(),
        );

        assert_eq!(keys(&requested.fields), vec!["id"]);
        assert_eq!(requested.patches.len(), 1);
        assert_eq!(requested.patches[0].label.as_deref(), Some("slow"));
        assert_eq!(keys(&requested.patches[0].fields), vec!["test"]);
    }

    #[test]
    fn defer_disabled_by_if_false() {
        let selection_set = selections(serde_json::json!([
            {
                "kind": "InlineFragment",
                "typeCondition": "Query",
                "defer": {"if": false},
                "selections": [{"kind": "Field", "name": "test"}],
            },
        ]));

        let requested = collect_fields_and_patches(
            "Query",
            &selection_set,
            &Object::default(),
            &Fragments::default(),
        );

        assert!(requested.patches.is_empty());
        assert_eq!(keys(&requested.fields), vec!["test"]);
    }

    #[test]
    fn skip_and_include_variables() {
        let selection_set = selections(serde_json::json!([
            {"kind": "Field", "name": "a", "skipIf": "omit"},
            {"kind": "Field", "name": "b", "includeIf": "omit"},
            {"kind": "Field", "name": "c", "includeIf": "keep"},
        ]));

        let mut variables = Object::default();
        variables.insert("omit", json!(true));
        variables.insert("keep", json!(true));

        let requested = collect_fields_and_patches(
            "Query",
            &selection_set,
            &variables,
            &Fragments::default(),
        );

        assert_eq!(keys(&requested.fields), vec!["b", "c"]);
    }

    #[test]
    fn mismatched_type_condition_is_skipped() {
        let selection_set = selections(serde_json::json!([
            {
                "kind": "InlineFragment",
                "typeCondition": "Droid",
                "selections": [{"kind": "Field", "name": "primaryFunction"}],
            },
        ]));

        let requested = collect_fields_and_patches(
            "Human",
            &selection_set,
            &Object::default(),
            &Fragments::default(),
        );

        assert!(requested.is_empty());
    }

    #[test]
    fn visited_spread_is_expanded_once() {
        let fragments: Fragments = [(
            "Details".to_string(),
            Fragment {
                type_condition: "User".to_string(),
                selection_set: selections(serde_json::json!([
                    {"kind": "Field", "name": "email"},
                ])),
            },
        )]
        .into_iter()
        .collect();

        let selection_set = selections(serde_json::json!([
            {"kind": "FragmentSpread", "name": "Details"},
            {"kind": "FragmentSpread", "name": "Details"},
        ]));

        let requested =
            collect_fields_and_patches("User", &selection_set, &Object::default(), &fragments);

        assert_eq!(requested.fields.get("email").map(Vec::len), Some(1));
    }

    #[test]
    fn deferred_spread_is_recollected() {
        let fragments: Fragments = [(
            "Details".to_string(),
            Fragment {
                type_condition: "User".to_string(),
                selection_set: selections(serde_json::json!([
                    {"kind": "Field", "name": "email"},
                ])),
            },
        )]
        .into_iter()
        .collect();

        // the spread was already expanded into the immediate group, but its
        // deferred re-appearance must still produce a patch
        let selection_set = selections(serde_json::json!([
            {"kind": "FragmentSpread", "name": "Details"},
            {"kind": "FragmentSpread", "name": "Details", "defer": {}},
        ]));

        let requested =
            collect_fields_and_patches("User", &selection_set, &Object::default(), &fragments);

        assert_eq!(keys(&requested.fields), vec!["email"]);
        assert_eq!(requested.patches.len(), 1);
        assert_eq!(keys(&requested.patches[0].fields), vec!["email"]);
    }

    #[test]
    fn merged_response_keys_are_retained_as_a_list() {
        let selection_set = selections(serde_json::json!([
            {"kind": "Field", "name": "friend", "selections": [{"kind": "Field", "name": "id"}]},
            {"kind": "Field", "name": "friend", "selections": [{"kind": "Field", "name": "name"}]},
        ]));

        let requested = collect_fields_and_patches(
            "User",
            &selection_set,
            &Object::default(),
            &Fragments::default(),
        );

        assert_eq!(requested.fields.get("friend").map(Vec::len), Some(2));
    }

    #[test]
    fn response_keys_flatten_patches() {
        let selection_set = selections(serde_json::json!([
            {"kind": "Field", "name": "id"},
            {
                "kind": "InlineFragment",
                "typeCondition": "User",
                "defer": {},
                "selections": [
                    {"kind": "Field", "name": "id"},
                    {"kind": "Field", "name": "email"},
                ],
            },
        ]));

        assert_eq!(response_keys("User", &selection_set), vec!["id", "email"]);
    }
}
