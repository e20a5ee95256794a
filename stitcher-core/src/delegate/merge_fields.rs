//! The field-ownership-aware delegation planner.
//!
//! Given a composite object, a remaining field/patch set and the sources
//! already consulted, each round partitions the candidate sources by
//! proxiability, assigns fields to sources, executes the assembled
//! selections concurrently, folds the answers back into the object and
//! recurses over whatever could not be delegated this round.

use crate::context::Context;
use crate::delegate::external::CompositeObject;
use crate::delegate::external::SourceResult;
use crate::delegate::incremental::receive_initial;
use crate::delegate::registry::SourceRegistry;
use crate::delegate::sources::sources_contain_selection_set;
use crate::delegate::sources::MergedTypeInfo;
use crate::delegate::sources::Source;
use crate::error::FetchError;
use crate::json_ext::Path;
use crate::spec::Defer;
use crate::spec::FieldGroup;
use crate::spec::InlineFragment;
use crate::spec::PatchGroup;
use crate::spec::RequestedFields;
use crate::spec::Selection;
use crate::spec::SelectionSet;
use futures::future::join_all;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json_bytes::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;

/// Per-request cache tables for the planner's pure functions, keyed by the
/// stable identities of their inputs.
#[derive(Debug, Default)]
pub(crate) struct PlanCache {
    proxiability: Mutex<HashMap<ProxiabilityKey, (Vec<String>, Vec<String>)>>,
    plans: Mutex<HashMap<PlanKey, Arc<DelegationPlan>>>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct ProxiabilityKey {
    type_name: String,
    origins: Vec<String>,
    candidates: Vec<String>,
    requested: Vec<String>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct PlanKey {
    type_name: String,
    proxiable: Vec<String>,
    requested: Vec<String>,
}

/// The selections to ask of each source this round, and whatever could not
/// be assigned to any proxiable source.
#[derive(Debug)]
pub(crate) struct DelegationPlan {
    map: Vec<(Arc<Source>, SelectionSet)>,
    unproxiable: RequestedFields,
}

fn fingerprint(requested: &RequestedFields) -> Vec<String> {
    let mut out = Vec::new();
    for (key, nodes) in &requested.fields {
        out.push(format!("{}:{}", key, nodes[0].name));
    }
    for patch in &requested.patches {
        out.push(format!("@defer:{}", patch.label.as_deref().unwrap_or("")));
        for (key, nodes) in &patch.fields {
            out.push(format!("{}:{}", key, nodes[0].name));
        }
    }
    out
}

fn names(sources: &[Arc<Source>]) -> Vec<String> {
    sources.iter().map(|source| source.name.clone()).collect()
}

/// Partition the candidate sources into those whose data requirements are
/// already satisfied by the origin sources (proxiable this round) and the
/// rest.
///
/// A source is proxiable if its type-level requires selection, and the
/// per-field requires selection of every requested field, are structurally
/// satisfiable by the types the origin sources expose.
fn sort_sources_by_proxiability(
    merged_type: &MergedTypeInfo,
    origins: &[Arc<Source>],
    candidates: &[Arc<Source>],
    requested: &RequestedFields,
    context: &Context,
) -> (Vec<Arc<Source>>, Vec<Arc<Source>>) {
    let key = ProxiabilityKey {
        type_name: merged_type.type_name.clone(),
        origins: names(origins),
        candidates: names(candidates),
        requested: fingerprint(requested),
    };

    let cached = context.caches.proxiability.lock().get(&key).cloned();
    let (proxiable_names, non_proxiable_names) = match cached {
        Some(partition) => partition,
        None => {
            let mut proxiable = Vec::new();
            let mut non_proxiable = Vec::new();
            for candidate in candidates {
                if is_proxiable(merged_type, origins, candidate, requested) {
                    proxiable.push(candidate.name.clone());
                } else {
                    non_proxiable.push(candidate.name.clone());
                }
            }
            let partition = (proxiable, non_proxiable);
            context
                .caches
                .proxiability
                .lock()
                .insert(key, partition.clone());
            partition
        }
    };

    let find = |name: &String| {
        candidates
            .iter()
            .find(|source| &source.name == name)
            .cloned()
    };
    (
        proxiable_names.iter().filter_map(find).collect(),
        non_proxiable_names.iter().filter_map(find).collect(),
    )
}

fn is_proxiable(
    merged_type: &MergedTypeInfo,
    origins: &[Arc<Source>],
    candidate: &Arc<Source>,
    requested: &RequestedFields,
) -> bool {
    if let Some(selection_set) = merged_type.selection_sets.get(&candidate.name) {
        if !sources_contain_selection_set(origins, &merged_type.type_name, selection_set) {
            return false;
        }
    }

    let by_field = match merged_type.field_selection_sets.get(&candidate.name) {
        Some(by_field) => by_field,
        None => return true,
    };

    let group_satisfied = |group: &FieldGroup| {
        group.values().flatten().all(|node| {
            match by_field.get(&node.name) {
                Some(selection_set) => {
                    sources_contain_selection_set(origins, &merged_type.type_name, selection_set)
                }
                None => true,
            }
        })
    };

    group_satisfied(&requested.fields)
        && requested
            .patches
            .iter()
            .all(|patch| group_satisfied(&patch.fields))
}

type GroupAssignment = (
    IndexMap<String, (Arc<Source>, Vec<Selection>)>,
    FieldGroup,
);

/// Assign one field group to the proxiable sources.
///
/// `__typename` is never delegated. A uniquely-owned field goes to its
/// owner when the owner is proxiable this round, otherwise it is deferred
/// to a future round. A shared field prefers a source already chosen within
/// this group, falling back to its first proxiable candidate in declared
/// preference order.
fn build_delegation_map(
    group: &FieldGroup,
    proxiable: &[Arc<Source>],
    merged_type: &MergedTypeInfo,
) -> GroupAssignment {
    let mut map: IndexMap<String, (Arc<Source>, Vec<Selection>)> = IndexMap::new();
    let mut unproxiable = FieldGroup::default();

    for (key, nodes) in group {
        let field_name = nodes[0].name.as_str();
        if field_name == "__typename" {
            continue;
        }

        if let Some(owner) = merged_type.unique_fields.get(field_name) {
            if !proxiable.iter().any(|source| source.name == owner.name) {
                unproxiable.insert(key.clone(), nodes.clone());
                continue;
            }
            let entry = map
                .entry(owner.name.clone())
                .or_insert_with(|| (owner.clone(), Vec::new()));
            entry
                .1
                .extend(nodes.iter().map(|node| Selection::Field(node.clone())));
            continue;
        }

        let candidates = match merged_type.non_unique_fields.get(field_name) {
            Some(candidates) => candidates,
            None => {
                unproxiable.insert(key.clone(), nodes.clone());
                continue;
            }
        };
        let filtered: Vec<&Arc<Source>> = candidates
            .iter()
            .filter(|candidate| {
                proxiable.iter().any(|source| source.name == candidate.name)
            })
            .collect();
        if filtered.is_empty() {
            unproxiable.insert(key.clone(), nodes.clone());
            continue;
        }

        let chosen = filtered
            .iter()
            .find(|candidate| map.contains_key(&candidate.name))
            .copied()
            .unwrap_or(filtered[0]);
        let entry = map
            .entry(chosen.name.clone())
            .or_insert_with(|| ((*chosen).clone(), Vec::new()));
        entry
            .1
            .extend(nodes.iter().map(|node| Selection::Field(node.clone())));
    }

    (map, unproxiable)
}

/// Build this round's delegation plan: the immediate group's per-source
/// field lists become top-level selections, while each patch group's lists
/// are re-wrapped in an inline fragment on the merged type carrying a defer
/// directive that propagates the group's label.
fn build_delegation_plan(
    merged_type: &MergedTypeInfo,
    requested: &RequestedFields,
    proxiable: &[Arc<Source>],
    context: &Context,
) -> Arc<DelegationPlan> {
    let key = PlanKey {
        type_name: merged_type.type_name.clone(),
        proxiable: names(proxiable),
        requested: fingerprint(requested),
    };
    if let Some(plan) = context.caches.plans.lock().get(&key) {
        return plan.clone();
    }

    let (mut map, unproxiable_fields) =
        build_delegation_map(&requested.fields, proxiable, merged_type);

    let mut unproxiable = RequestedFields {
        fields: unproxiable_fields,
        patches: Vec::new(),
    };

    for patch in &requested.patches {
        let (assigned, patch_unproxiable) =
            build_delegation_map(&patch.fields, proxiable, merged_type);

        for (name, (source, selections)) in assigned {
            let fragment = Selection::InlineFragment(InlineFragment {
                type_condition: Some(merged_type.type_name.clone()),
                selections,
                skip_if: None,
                include_if: None,
                defer: Some(Defer {
                    if_condition: None,
                    label: patch.label.clone(),
                }),
            });
            map.entry(name)
                .or_insert_with(|| (source, Vec::new()))
                .1
                .push(fragment);
        }

        if !patch_unproxiable.is_empty() {
            unproxiable.patches.push(PatchGroup {
                label: patch.label.clone(),
                fields: patch_unproxiable,
            });
        }
    }

    let plan = Arc::new(DelegationPlan {
        map: map.into_values().collect(),
        unproxiable,
    });
    context.caches.plans.lock().insert(key, plan.clone());
    plan
}

/// Delegate the remaining fields of `object` to the candidate sources,
/// merging their answers into the object and recursing until nothing more
/// is proxiable.
///
/// Source calls are all issued before any is awaited, so their I/O
/// overlaps; a failing call is captured as error data rather than
/// propagated, and never aborts its siblings.
pub fn merge_fields(
    registry: Arc<SourceRegistry>,
    merged_type: Arc<MergedTypeInfo>,
    context: Arc<Context>,
    object: CompositeObject,
    requested: RequestedFields,
    origin_sources: Vec<Arc<Source>>,
    candidate_sources: Vec<Arc<Source>>,
    path: Path,
) -> BoxFuture<'static, CompositeObject> {
    let span = tracing::debug_span!("merge_fields", type_name = %merged_type.type_name);
    Box::pin(
        async move {
            if requested.is_empty() {
                return object;
            }

            let (proxiable, non_proxiable) = sort_sources_by_proxiability(
                &merged_type,
                &origin_sources,
                &candidate_sources,
                &requested,
                &context,
            );

            let plan = build_delegation_plan(&merged_type, &requested, &proxiable, &context);
            if plan.map.is_empty() {
                return object;
            }

            let calls = plan.map.iter().map(|(source, selection_set)| {
                let registry = registry.clone();
                let context = context.clone();
                let object = object.clone();
                let source = source.clone();
                let selection_set = selection_set.clone();
                let path = path.clone();
                async move {
                    let result = resolve_source(
                        &registry,
                        &context,
                        &object,
                        &source,
                        &selection_set,
                        &path,
                    )
                    .await;
                    (result, selection_set)
                }
            });
            let results = join_all(calls).await;

            object.merge_sources(&merged_type.type_name, results, &path);

            let mut origins = origin_sources;
            origins.extend(plan.map.iter().map(|(source, _)| source.clone()));

            merge_fields(
                registry,
                merged_type,
                context,
                object,
                plan.unproxiable.clone(),
                origins,
                non_proxiable,
                path,
            )
            .await
        }
        .instrument(span),
    )
}

async fn resolve_source(
    registry: &SourceRegistry,
    context: &Context,
    object: &CompositeObject,
    source: &Arc<Source>,
    selection_set: &SelectionSet,
    path: &Path,
) -> SourceResult {
    let resolver = match registry.get(&source.name) {
        Some(resolver) => resolver,
        None => {
            return SourceResult::Error(
                FetchError::ValidationUnknownSourceError {
                    service: source.name.clone(),
                }
                .to_graphql_error(Some(path.clone())),
            )
        }
    };

    let stream = match resolver
        .resolve(object, context, source, selection_set)
        .await
    {
        Ok(stream) => stream,
        Err(err) => {
            failfast_error!("fetch error from {:?}: {}", source.name, err);
            return SourceResult::Error(err.to_graphql_error(Some(path.clone())));
        }
    };

    match receive_initial(stream, source, path.len()).await {
        Err(err) => SourceResult::Error(err.to_graphql_error(Some(path.clone()))),
        Ok((initial, receiver)) => match initial.data {
            Value::Object(map) => SourceResult::Object(CompositeObject::annotate(
                map,
                initial.errors,
                source.clone(),
                receiver,
            )),
            Value::Null => SourceResult::Null(initial.errors),
            other => {
                failfast_debug!(
                    "source {:?} returned a non-object payload: {:?}",
                    source.name,
                    other
                );
                SourceResult::Null(initial.errors)
            }
        },
    }
}
